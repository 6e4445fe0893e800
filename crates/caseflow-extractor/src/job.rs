//! Job-level bookkeeping and concurrent document processing

use crate::cancel::CancellationToken;
use crate::error::ExtractorError;
use crate::extractor::Extractor;
use crate::types::DocumentOutcome;
use caseflow_domain::traits::{DocumentStore, LlmClient};
use caseflow_domain::{DocumentId, DocumentStatus, FieldSchema, Job, JobId, JobStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Debug)]
struct TrackerState {
    job: Job,
    statuses: HashMap<DocumentId, DocumentStatus>,
}

/// Shared, lock-guarded view of a job's progress
///
/// Workers report status changes here; `processed_count` and the aggregate
/// status are only ever updated under the lock.
#[derive(Debug, Clone)]
pub struct JobTracker {
    inner: Arc<Mutex<TrackerState>>,
}

impl JobTracker {
    /// Track a job over documents in their current statuses
    pub fn new<I>(job_id: JobId, documents: I) -> Self
    where
        I: IntoIterator<Item = (DocumentId, DocumentStatus)>,
    {
        let statuses: HashMap<_, _> = documents.into_iter().collect();
        let processed_count = statuses.values().filter(|s| s.is_settled()).count();
        let status = if processed_count == 0 {
            JobStatus::Pending
        } else {
            JobStatus::aggregate(statuses.values().copied())
        };

        Self {
            inner: Arc::new(Mutex::new(TrackerState {
                job: Job {
                    id: job_id,
                    processed_count,
                    total_count: statuses.len(),
                    status,
                },
                statuses,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // The state stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that a worker picked up a document
    pub fn mark_processing(&self, id: DocumentId) {
        let mut state = self.lock();
        if let Some(status) = state.statuses.get_mut(&id) {
            *status = DocumentStatus::Processing;
            state.job.status = JobStatus::Processing;
        }
    }

    /// Record a document's end-of-round status; returns the job's new status
    ///
    /// `processed_count` grows only when a document moves from unsettled to
    /// settled. Unknown documents are ignored.
    pub fn record_settled(&self, id: DocumentId, status: DocumentStatus) -> JobStatus {
        let mut state = self.lock();
        let Some(previous) = state.statuses.insert(id, status) else {
            state.statuses.remove(&id);
            return state.job.status;
        };

        if !previous.is_settled() && status.is_settled() {
            state.job.processed_count += 1;
        }
        state.job.status = JobStatus::aggregate(state.statuses.values().copied());
        state.job.status
    }

    /// Copy of the job as it stands
    pub fn snapshot(&self) -> Job {
        self.lock().job.clone()
    }

    /// The job's current aggregate status
    pub fn status(&self) -> JobStatus {
        self.lock().job.status
    }
}

/// Everything a worker needs besides the document itself
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Fields to extract
    pub schema: Arc<FieldSchema>,
    /// Job progress to report into, if any
    pub tracker: Option<JobTracker>,
    /// Checked between attempts
    pub cancel: CancellationToken,
}

impl JobContext {
    /// Context for processing documents against a schema
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self {
            schema,
            tracker: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Report progress into a job tracker
    pub fn with_tracker(mut self, tracker: JobTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Use a shared cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Final state of a job round
#[derive(Debug, Clone)]
pub struct JobReport {
    /// The job with its counters and aggregate status
    pub job: Job,
    /// Outcomes of the documents processed this round, in document order
    pub outcomes: Vec<DocumentOutcome>,
}

impl JobReport {
    /// Outcomes for documents that need another round
    pub fn needing_continuation(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes.iter().filter(|o| o.needs_continuation())
    }
}

/// Processes every document of a job concurrently
pub struct JobRunner<L, S>
where
    L: LlmClient,
    S: DocumentStore,
{
    extractor: Arc<Extractor<L, S>>,
}

impl<L, S> JobRunner<L, S>
where
    L: LlmClient + Send + Sync + 'static,
    S: DocumentStore + Send + 'static,
{
    /// Create a runner around a shared extractor
    pub fn new(extractor: Arc<Extractor<L, S>>) -> Self {
        Self { extractor }
    }

    /// The extractor documents are processed with
    pub fn extractor(&self) -> &Arc<Extractor<L, S>> {
        &self.extractor
    }

    /// Run one round over the job's documents
    ///
    /// Documents already `complete` or `error` are skipped; `pending` and
    /// `processed` ones each get their own task. Returns once every task has
    /// finished.
    pub async fn run(
        &self,
        job_id: JobId,
        schema: Arc<FieldSchema>,
        cancel: CancellationToken,
    ) -> Result<JobReport, ExtractorError> {
        let documents = self.extractor.list_documents(job_id)?;
        let tracker = JobTracker::new(
            job_id,
            documents.iter().map(|d| {
                let status = if d.status.is_terminal() {
                    d.status
                } else {
                    DocumentStatus::Pending
                };
                (d.id, status)
            }),
        );

        let order: Vec<DocumentId> = documents
            .iter()
            .filter(|d| !d.status.is_terminal())
            .map(|d| d.id)
            .collect();
        info!(
            "Job {}: processing {} of {} documents",
            job_id,
            order.len(),
            documents.len()
        );

        let mut tasks = JoinSet::new();
        for &id in &order {
            let extractor = Arc::clone(&self.extractor);
            let context = JobContext::new(Arc::clone(&schema))
                .with_tracker(tracker.clone())
                .with_cancellation(cancel.clone());
            tasks.spawn(async move { extractor.process_document(id, &context).await });
        }

        let mut outcomes = Vec::with_capacity(order.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Document worker for job {} failed: {}", job_id, e),
            }
        }
        outcomes.sort_by_key(|o| order.iter().position(|id| *id == o.document_id));

        let mut job = tracker.snapshot();
        let documents = self.extractor.list_documents(job_id)?;
        job.status = JobStatus::aggregate(documents.iter().map(|d| d.status));

        info!(
            "Job {} finished round: {} ({}/{} documents settled)",
            job_id, job.status, job.processed_count, job.total_count
        );
        Ok(JobReport { job, outcomes })
    }
}
