//! Job module - a batch of documents and its aggregate status

use crate::{DocumentStatus, JobId};

/// Aggregate status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// No document has started
    Pending,
    /// At least one document is still being worked on
    Processing,
    /// Every document completed
    Completed,
    /// Some documents failed, none need continuation
    CompletedWithErrors,
    /// Some documents need continuation, none failed
    PendingContinuation,
    /// Both failures and documents needing continuation
    PendingContinuationWithErrors,
    /// Every document failed
    Failed,
}

impl JobStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::CompletedWithErrors => "completed_with_errors",
            JobStatus::PendingContinuation => "pending_continuation",
            JobStatus::PendingContinuationWithErrors => "pending_continuation_with_errors",
            JobStatus::Failed => "failed",
        }
    }

    /// Fold document statuses into a job status
    ///
    /// Only meaningful once every document has settled for the round; while
    /// any document is pending or processing the job reports `Processing`.
    ///
    /// # Examples
    ///
    /// ```
    /// use caseflow_domain::{DocumentStatus, JobStatus};
    ///
    /// let status = JobStatus::aggregate([DocumentStatus::Complete, DocumentStatus::Processed]);
    /// assert_eq!(status, JobStatus::PendingContinuation);
    /// ```
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = DocumentStatus>,
    {
        let mut total = 0usize;
        let mut errors = 0usize;
        let mut continuation = 0usize;

        for status in statuses {
            total += 1;
            match status {
                DocumentStatus::Pending | DocumentStatus::Processing => return JobStatus::Processing,
                DocumentStatus::Error => errors += 1,
                DocumentStatus::Processed => continuation += 1,
                DocumentStatus::Complete => {}
            }
        }

        match (errors, continuation) {
            (e, _) if total > 0 && e == total => JobStatus::Failed,
            (0, 0) => JobStatus::Completed,
            (0, _) => JobStatus::PendingContinuation,
            (_, 0) => JobStatus::CompletedWithErrors,
            _ => JobStatus::PendingContinuationWithErrors,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch of documents processed together
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Unique identifier
    pub id: JobId,

    /// Documents that finished their first round
    pub processed_count: usize,

    /// Documents in the job
    pub total_count: usize,

    /// Aggregate status
    pub status: JobStatus,
}

impl Job {
    /// Create a pending job over `total_count` documents
    pub fn new(total_count: usize) -> Self {
        Self {
            id: JobId::new(),
            processed_count: 0,
            total_count,
            status: JobStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DocumentStatus::*;

    #[test]
    fn test_all_complete() {
        assert_eq!(JobStatus::aggregate([Complete, Complete]), JobStatus::Completed);
    }

    #[test]
    fn test_errors_without_continuation() {
        assert_eq!(JobStatus::aggregate([Complete, Error]), JobStatus::CompletedWithErrors);
    }

    #[test]
    fn test_continuation_without_errors() {
        assert_eq!(JobStatus::aggregate([Processed, Complete]), JobStatus::PendingContinuation);
    }

    #[test]
    fn test_mixed_errors_and_continuation() {
        assert_eq!(
            JobStatus::aggregate([Processed, Error, Complete]),
            JobStatus::PendingContinuationWithErrors
        );
    }

    #[test]
    fn test_all_failed() {
        assert_eq!(JobStatus::aggregate([Error, Error]), JobStatus::Failed);
    }

    #[test]
    fn test_unsettled_documents() {
        assert_eq!(JobStatus::aggregate([Complete, Processing]), JobStatus::Processing);
        assert_eq!(JobStatus::aggregate([Pending]), JobStatus::Processing);
    }

    #[test]
    fn test_empty_job_is_completed() {
        assert_eq!(JobStatus::aggregate(std::iter::empty()), JobStatus::Completed);
    }
}
