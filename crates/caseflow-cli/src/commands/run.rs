//! Run command implementation.

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use caseflow_domain::{Document, JobId};
use caseflow_extractor::{load_schema, CancellationToken, Extractor, ExtractorConfig, JobRunner};
use caseflow_llm::GeminiProvider;
use caseflow_store::SqliteStore;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Execute the run command.
pub async fn execute_run(
    args: RunArgs,
    mut config: ExtractorConfig,
    formatter: &Formatter,
) -> Result<()> {
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }

    let schema = Arc::new(load_schema(&args.schema)?);
    let llm = GeminiProvider::from_env(args.model.as_str())?.with_mime_type(args.mime_type.as_str());
    let store = SqliteStore::new(&args.db)?;
    let extractor = Arc::new(Extractor::new(llm, store, config)?);

    let job_id = match &args.job {
        Some(id) => JobId::from_string(id).map_err(CliError::InvalidInput)?,
        None => {
            let job_id = JobId::new();
            let documents = collect_documents(job_id, &args.dir)?;
            for document in &documents {
                extractor.add_document(document)?;
            }
            info!("Created job {} with {} documents", job_id, documents.len());
            job_id
        }
    };

    let names: HashMap<_, _> = extractor
        .list_documents(job_id)?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();
    if names.is_empty() {
        return Err(CliError::InvalidInput(format!("Job {} has no documents", job_id)));
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after in-flight attempts");
            on_interrupt.cancel();
        }
    });

    let report = JobRunner::new(extractor).run(job_id, schema, cancel).await?;
    println!("{}", formatter.format_job(&report, &names)?);
    Ok(())
}

/// Read every regular, non-hidden file in `dir` as a pending document.
///
/// Files are taken in name order.
pub fn collect_documents(job_id: JobId, dir: &Path) -> Result<Vec<Document>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| n.starts_with('.'));
        if path.is_file() && !hidden {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "No documents found in {}",
            dir.display()
        )));
    }

    paths
        .into_iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Document::new(job_id, name, fs::read(&path)?))
        })
        .collect()
}
