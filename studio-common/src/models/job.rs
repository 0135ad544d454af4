//! Asynchronous rendering job
//!
//! A job is created when a generation call defers its result. Only the job
//! poller mutates it: the progress estimator while the job is processing,
//! and the terminal transition when the remote reports completion or failure.

use serde::{Deserialize, Serialize};

/// Message stored on a job the remote reported as failed
pub const JOB_FAILED_MESSAGE: &str = "Asset rendering failed on the generation service";

/// Upper bound for the simulated progress estimate
pub const PROGRESS_ESTIMATE_CEILING: f64 = 90.0;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Known to the client but not yet tracked
    Pending,
    /// Being polled
    Processing,
    /// Remote finished, result URL available
    Complete,
    /// Remote reported failure
    Failed,
}

impl JobStatus {
    /// COMPLETE and FAILED never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// One outstanding asynchronous rendering request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Server-assigned opaque id
    pub id: String,
    pub status: JobStatus,
    /// Client-estimated percentage (0-100)
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Next value of the simulated progress curve
///
/// Fast at first, then slower, and never past the ceiling: the true
/// completion time is unknown until the remote says so.
pub fn estimate_next_progress(progress: f64) -> f64 {
    let next = if progress < 30.0 {
        progress + 4.0
    } else if progress < 60.0 {
        progress + 1.5
    } else if progress < PROGRESS_ESTIMATE_CEILING {
        progress + 0.2
    } else {
        progress
    };
    next.min(PROGRESS_ESTIMATE_CEILING).max(progress)
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            result_url: None,
            error: None,
        }
    }

    /// Begin tracking: PENDING → PROCESSING with progress reset
    pub fn start(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Processing;
            self.progress = 0.0;
        }
    }

    /// Advance the progress estimate; no effect outside PROCESSING
    pub fn advance_estimate(&mut self) -> f64 {
        if self.status == JobStatus::Processing {
            self.progress = estimate_next_progress(self.progress);
        }
        self.progress
    }

    /// Terminal success. Returns false if the job was already terminal.
    pub fn complete(&mut self, result_url: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Complete;
        self.progress = 100.0;
        self.result_url = Some(result_url.into());
        true
    }

    /// Terminal failure. Returns false if the job was already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.progress = 100.0;
        self.error = Some(error.into());
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_follows_three_speed_curve() {
        assert_eq!(estimate_next_progress(0.0), 4.0);
        assert_eq!(estimate_next_progress(28.0), 32.0);
        assert_eq!(estimate_next_progress(30.0), 31.5);
        assert!((estimate_next_progress(60.0) - 60.2).abs() < 1e-9);
        assert_eq!(estimate_next_progress(89.9), PROGRESS_ESTIMATE_CEILING);
        assert_eq!(estimate_next_progress(90.0), 90.0);
    }

    #[test]
    fn estimate_is_monotonic_and_capped() {
        let mut progress = 0.0;
        for _ in 0..1000 {
            let next = estimate_next_progress(progress);
            assert!(next >= progress);
            assert!(next <= PROGRESS_ESTIMATE_CEILING);
            progress = next;
        }
        assert_eq!(progress, PROGRESS_ESTIMATE_CEILING);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut job = Job::new("job_1");
        job.start();
        assert_eq!(job.status, JobStatus::Processing);
        job.advance_estimate();
        assert_eq!(job.progress, 4.0);

        assert!(job.complete("https://x/a.mp4"));
        assert_eq!(job.progress, 100.0);
        assert!(!job.fail("late failure"));
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.result_url.as_deref(), Some("https://x/a.mp4"));

        job.advance_estimate();
        assert_eq!(job.progress, 100.0);
    }

    #[test]
    fn failure_sets_full_progress_and_message() {
        let mut job = Job::new("job_2");
        job.start();
        assert!(job.fail(JOB_FAILED_MESSAGE));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 100.0);
        assert!(job.result_url.is_none());
    }
}
