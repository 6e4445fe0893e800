//! Orchestration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{
        CancellationToken, ExtractionFailure, Extractor, ExtractorConfig, JobContext, JobRunner,
        JobTracker, Strategy,
    };
    use caseflow_domain::traits::LlmClient;
    use caseflow_domain::{
        DataType, Document, DocumentStatus, FieldDefinition, FieldSchema, GenerationConfig, JobId,
        JobStatus, LlmResponse,
    };
    use caseflow_llm::{LlmError, MockProvider};
    use caseflow_store::MemoryStore;
    use std::sync::Arc;

    /// Cancels the job as soon as its first call returns
    struct CancelAfterFirstCall {
        inner: MockProvider,
        cancel: CancellationToken,
    }

    impl LlmClient for CancelAfterFirstCall {
        type Error = LlmError;

        fn call(
            &self,
            prompt: &str,
            document: &[u8],
            config: &GenerationConfig,
        ) -> Result<LlmResponse, Self::Error> {
            let response = self.inner.call(prompt, document, config);
            self.cancel.cancel();
            response
        }
    }

    fn schema() -> Arc<FieldSchema> {
        Arc::new(FieldSchema::new(vec![
            FieldDefinition::new("case_number", DataType::String),
            FieldDefinition::new("age", DataType::Integer).bounded(Some(0.0), Some(120.0)),
            FieldDefinition::new("diagnosis", DataType::String),
        ]))
    }

    fn case(number: usize, age: i64, diagnosis: &str) -> String {
        format!(
            r#"{{"case_number": {{"value": "{}", "confidence": 95}}, "age": {{"value": {}, "confidence": 90}}, "diagnosis": {{"value": "{}", "confidence": 85}}}}"#,
            number, age, diagnosis
        )
    }

    fn response(cases: &[String]) -> String {
        format!("{{\"case_results\": [{}]}}", cases.join(", "))
    }

    fn first_two() -> String {
        response(&[case(1, 45, "sarcoidosis"), case(2, 12, "asthma")])
    }

    fn setup(
        llm: &MockProvider,
        config: ExtractorConfig,
    ) -> (Extractor<MockProvider, MemoryStore>, Document) {
        let extractor = Extractor::new(llm.clone(), MemoryStore::new(), config).unwrap();
        let document = Document::new(JobId::new(), "paper.pdf", b"%PDF-1.7".to_vec());
        extractor.add_document(&document).unwrap();
        (extractor, document)
    }

    #[tokio::test]
    async fn test_complete_in_one_attempt() {
        let llm = MockProvider::default();
        llm.push_text(first_two());
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Complete);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.attempts_used, 1);
        assert!(outcome.failure.is_none());
        assert!(outcome.message.is_none());
        assert_eq!(outcome.attempts[0].strategy, Some(Strategy::DirectScan));

        let stored = extractor.get_document(document.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Complete);
        assert_eq!(stored.last_successful_record_index, 2);

        let attempts = extractor.list_attempts(document.id).unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].attempt_index, 1);
        assert_eq!(attempts[0].cursor, 0);
        assert!(!attempts[0].is_truncated);
    }

    #[tokio::test]
    async fn test_truncated_response_is_continued() {
        let llm = MockProvider::default();
        llm.push_truncated(first_two());
        llm.push_text(response(&[case(3, 70, "gout")]));
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Complete);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.attempts_used, 2);

        let prompts = llm.prompts();
        assert!(!prompts[0].contains("CONTINUATION REQUEST"));
        assert!(prompts[1].contains("CONTINUATION REQUEST"));
        assert!(prompts[1].contains("start with case number 3"));
        // the previous response is quoted back for reference
        assert!(prompts[1].contains("asthma"));

        let attempts = extractor.list_attempts(document.id).unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].is_truncated);
        assert_eq!(attempts[1].cursor, 2);
    }

    #[tokio::test]
    async fn test_continuation_drops_repeated_records() {
        let llm = MockProvider::default();
        llm.push_truncated(first_two());
        // the model repeats case 2 under a new number before moving on
        llm.push_text(response(&[case(3, 12, "asthma"), case(4, 70, "gout")]));
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Complete);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.attempts[1].duplicate_count, 1);
        assert_eq!(outcome.attempts[1].accepted_count, 1);
        assert_eq!(
            outcome.records[2].text_of("case_number").as_deref(),
            Some("4")
        );
    }

    #[tokio::test]
    async fn test_textual_truncation_signal_triggers_continuation() {
        let llm = MockProvider::default();
        let fenced = format!(
            "```json\n{}\n```\nI apologize, reached limit",
            response(&[
                r#"{"case_number": {"value": "1", "confidence": 95}, "age": {"value": 45, "confidence": 90}, "diagnosis": {"value": "sarcoidosis", "confidence": 85}}"#.to_string(),
                r#"{"case_number": {"value": "2", "confidence": 95}, "age": {"value": 12, "confidence": 90}, "diagnosis": {"value": "asthma", "confidence": 85}}"#.to_string(),
            ])
        );
        llm.push_text(fenced);
        llm.push_text(r#"{"case_results": []}"#);
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert!(outcome.attempts[0].is_truncated);
        assert_eq!(outcome.attempts_used, 2);
        assert_eq!(outcome.status, DocumentStatus::Complete);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn test_identifier_only_records_are_continued() {
        let llm = MockProvider::default();
        llm.push_text(
            "```json\n{\"case_results\":[{\"case_number\":{\"value\":\"1\",\"confidence\":95}},{\"case_number\":{\"value\":\"2\",\"confidence\":95}}]}\n```\nI apologize, reached limit",
        );
        llm.push_text(r#"{"case_results": []}"#);
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(Arc::new(FieldSchema::default())))
            .await;

        assert!(outcome.attempts[0].is_truncated);
        assert_eq!(outcome.attempts[0].accepted_count, 2);
        assert_eq!(outcome.attempts[0].sparse_count, 0);
        assert_eq!(outcome.attempts_used, 2);
        assert_eq!(outcome.status, DocumentStatus::Complete);
        assert_eq!(outcome.records.len(), 2);
        assert!(llm.prompts()[1].contains("start with case number 3"));
    }

    #[tokio::test]
    async fn test_zero_progress_truncation_stops_early() {
        let llm = MockProvider::default();
        for _ in 0..3 {
            llm.push_truncated(first_two());
        }
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Error);
        assert_eq!(outcome.attempts_used, 2);
        assert_eq!(
            outcome.failure,
            Some(ExtractionFailure::StuckTruncation { attempt: 2 })
        );
        assert_eq!(llm.remaining(), 1);
        // records committed by the first attempt are kept
        assert_eq!(outcome.records.len(), 2);

        let stored = extractor.get_document(document.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Error);
        assert!(stored.error.is_some());
    }

    #[tokio::test]
    async fn test_budget_exhausted_then_resumed() {
        let llm = MockProvider::default();
        llm.push_truncated(response(&[case(1, 45, "sarcoidosis")]));
        llm.push_truncated(response(&[case(2, 12, "asthma")]));
        let config = ExtractorConfig {
            max_attempts: 2,
            ..ExtractorConfig::default()
        };
        let (extractor, document) = setup(&llm, config);
        let context = JobContext::new(schema());

        let outcome = extractor.process_document(document.id, &context).await;
        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert!(outcome.needs_continuation());
        assert_eq!(
            outcome.failure,
            Some(ExtractionFailure::RetryBudgetExhausted { attempts: 2 })
        );
        assert_eq!(
            extractor.get_document(document.id).unwrap().last_successful_record_index,
            2
        );

        llm.reset_call_count();
        llm.push_text(response(&[case(3, 70, "gout")]));
        let resumed = extractor.process_document(document.id, &context).await;

        assert_eq!(resumed.status, DocumentStatus::Complete);
        assert_eq!(resumed.attempts_used, 1);
        assert_eq!(resumed.records.len(), 3);
        assert_eq!(resumed.attempts[0].attempt_index, 3);

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("start with case number 3"));
        assert!(prompt.contains("asthma"));

        let indices: Vec<u32> = extractor
            .list_attempts(document.id)
            .unwrap()
            .iter()
            .map(|a| a.attempt_index)
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let llm = MockProvider::default();
        llm.push_error("connection reset");
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Error);
        assert!(matches!(
            &outcome.failure,
            Some(ExtractionFailure::Transport(message)) if message.contains("connection reset")
        ));
        assert!(outcome.message.unwrap().contains("connection reset"));

        let attempts = extractor.list_attempts(document.id).unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].error.is_some());
        assert!(attempts[0].parsed.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_complete_response() {
        let llm = MockProvider::default();
        llm.push_text("I could not find any cases in this document.");
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Error);
        assert_eq!(outcome.failure, Some(ExtractionFailure::Parse));

        let attempts = extractor.list_attempts(document.id).unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].parsed.is_none());
        assert!(attempts[0].raw_text.contains("could not find"));
    }

    #[tokio::test]
    async fn test_missing_records_key_is_a_parse_failure() {
        let llm = MockProvider::default();
        llm.push_text(r#"{"results": []}"#);
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.failure, Some(ExtractionFailure::Parse));
    }

    #[tokio::test]
    async fn test_unparseable_truncated_response() {
        let llm = MockProvider::default();
        llm.push_truncated("Let me start with the first case");
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Error);
        assert_eq!(
            outcome.failure,
            Some(ExtractionFailure::StuckTruncation { attempt: 1 })
        );
    }

    #[tokio::test]
    async fn test_invalid_records_are_rejected() {
        let llm = MockProvider::default();
        llm.push_text(response(&[
            case(1, 45, "sarcoidosis"),
            r#"{"case_number": {"value": "2", "confidence": 95}, "age": {"value": 30, "confidence": 90}}"#
                .to_string(),
            case(3, 150, "gout"),
        ]));
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Complete);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.rejected().count(), 2);
        assert_eq!(outcome.attempts[0].parsed_count, 3);
    }

    #[tokio::test]
    async fn test_cited_records_are_excluded() {
        let llm = MockProvider::default();
        llm.push_text(response(&[
            case(1, 45, "sarcoidosis"),
            case(2, 60, "sarcoidosis reported by Smith et al., 2019"),
        ]));
        let (extractor, document) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(document.id, &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.records.len(), 1);
        let filtering = outcome.filtering();
        assert_eq!(filtering.original_count, 2);
        assert_eq!(filtering.filtered_count, 1);
        assert_eq!(filtering.excluded_count, 1);
    }

    #[tokio::test]
    async fn test_sparse_records_are_pruned() {
        let llm = MockProvider::default();
        llm.push_text(response(&[
            case(1, 45, "sarcoidosis"),
            r#"{"case_number": {"value": "2", "confidence": 95}}"#.to_string(),
        ]));
        let config = ExtractorConfig {
            min_record_fields: 2,
            ..ExtractorConfig::default()
        };
        let (extractor, document) = setup(&llm, config);

        let outcome = extractor
            .process_document(document.id, &JobContext::new(Arc::new(FieldSchema::default())))
            .await;

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.attempts[0].sparse_count, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let llm = MockProvider::default();
        let (extractor, document) = setup(&llm, ExtractorConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = extractor
            .process_document(
                document.id,
                &JobContext::new(schema()).with_cancellation(cancel),
            )
            .await;

        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert_eq!(outcome.failure, Some(ExtractionFailure::Cancelled { attempts: 0 }));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_between_attempts_keeps_progress() {
        let mock = MockProvider::default();
        mock.push_truncated(first_two());
        mock.push_text(response(&[case(3, 70, "gout")]));
        let cancel = CancellationToken::new();
        let llm = CancelAfterFirstCall {
            inner: mock.clone(),
            cancel: cancel.clone(),
        };
        let extractor = Extractor::new(llm, MemoryStore::new(), ExtractorConfig::default()).unwrap();
        let document = Document::new(JobId::new(), "paper.pdf", b"%PDF-1.7".to_vec());
        extractor.add_document(&document).unwrap();

        let outcome = extractor
            .process_document(
                document.id,
                &JobContext::new(schema()).with_cancellation(cancel),
            )
            .await;

        assert_eq!(outcome.status, DocumentStatus::Processed);
        assert_eq!(outcome.failure, Some(ExtractionFailure::Cancelled { attempts: 1 }));
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.remaining(), 1);

        let stored = extractor.get_document(document.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Processed);
        assert_eq!(stored.last_successful_record_index, 2);
        assert_eq!(stored.accumulated_records.len(), 2);
        assert_eq!(extractor.list_attempts(document.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settled_documents_are_not_reprocessed() {
        let llm = MockProvider::default();
        llm.push_text(first_two());
        let (extractor, document) = setup(&llm, ExtractorConfig::default());
        let context = JobContext::new(schema());

        extractor.process_document(document.id, &context).await;
        let again = extractor.process_document(document.id, &context).await;

        assert_eq!(again.status, DocumentStatus::Complete);
        assert_eq!(again.attempts_used, 0);
        assert_eq!(again.records.len(), 2);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let llm = MockProvider::default();
        let (extractor, _) = setup(&llm, ExtractorConfig::default());

        let outcome = extractor
            .process_document(caseflow_domain::DocumentId::new(), &JobContext::new(schema()))
            .await;

        assert_eq!(outcome.status, DocumentStatus::Error);
        assert!(matches!(outcome.failure, Some(ExtractionFailure::Storage(_))));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_outcome_reported_to_tracker() {
        let llm = MockProvider::default();
        llm.push_text(first_two());
        let (extractor, document) = setup(&llm, ExtractorConfig::default());
        let tracker = JobTracker::new(document.job_id, [(document.id, DocumentStatus::Pending)]);

        extractor
            .process_document(
                document.id,
                &JobContext::new(schema()).with_tracker(tracker.clone()),
            )
            .await;

        let job = tracker.snapshot();
        assert_eq!(job.processed_count, 1);
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_job_runner_skips_settled_documents() {
        let llm = MockProvider::new(first_two());
        let extractor =
            Arc::new(Extractor::new(llm.clone(), MemoryStore::new(), ExtractorConfig::default()).unwrap());
        let job_id = JobId::new();

        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            extractor
                .add_document(&Document::new(job_id, name, Vec::new()))
                .unwrap();
        }
        let mut failed = Document::new(job_id, "d.pdf", Vec::new());
        failed.status = DocumentStatus::Error;
        failed.error = Some("earlier failure".to_string());
        extractor.add_document(&failed).unwrap();

        let report = JobRunner::new(Arc::clone(&extractor))
            .run(job_id, schema(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == DocumentStatus::Complete));
        assert_eq!(report.job.total_count, 4);
        assert_eq!(report.job.processed_count, 4);
        assert_eq!(report.job.status, JobStatus::CompletedWithErrors);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_job_runner_reports_pending_continuation() {
        let llm = MockProvider::default();
        llm.push_truncated(first_two());
        llm.push_truncated(first_two());
        let config = ExtractorConfig {
            max_attempts: 1,
            ..ExtractorConfig::default()
        };
        let extractor = Arc::new(Extractor::new(llm, MemoryStore::new(), config).unwrap());
        let job_id = JobId::new();
        for name in ["a.pdf", "b.pdf"] {
            extractor
                .add_document(&Document::new(job_id, name, Vec::new()))
                .unwrap();
        }

        let report = JobRunner::new(extractor)
            .run(job_id, schema(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.job.status, JobStatus::PendingContinuation);
        assert_eq!(report.needing_continuation().count(), 2);
    }

    #[tokio::test]
    async fn test_job_runner_empty_job() {
        let extractor = Arc::new(
            Extractor::new(MockProvider::default(), MemoryStore::new(), ExtractorConfig::default())
                .unwrap(),
        );
        let report = JobRunner::new(extractor)
            .run(JobId::new(), schema(), CancellationToken::new())
            .await
            .unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.job.total_count, 0);
    }
}
