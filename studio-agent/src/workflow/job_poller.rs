//! Adaptive-interval poller for one asynchronous rendering job
//!
//! Each tracked job gets its own task that exclusively owns the job state and
//! publishes it through a `watch` channel. Poll cadence is fast for the first
//! seconds after tracking starts and slows down afterwards. Transport errors
//! never reach the caller: the poller logs them and tries again later.
//!
//! Dropping or cancelling the [`JobHandle`] stops the task. A poll request
//! already in flight is allowed to finish, but its result is discarded.

use std::sync::Arc;
use std::time::Duration;
use studio_common::config::PollingConfig;
use studio_common::models::{Job, JOB_FAILED_MESSAGE};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::{CreativeService, RemoteJobState};

/// Called once with the media URL when the job completes
pub type CompletionCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// Message stored when the remote reports completion without media
pub const MISSING_MEDIA_MESSAGE: &str = "Job completed without a media URL";

/// Poll cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    pub fast_interval: Duration,
    pub slow_interval: Duration,
    /// Elapsed time up to which the fast interval applies (inclusive)
    pub fast_window: Duration,
    /// Delay after a failed poll request
    pub error_retry: Duration,
}

impl From<&PollingConfig> for PollingPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            fast_interval: Duration::from_millis(config.fast_interval_ms),
            slow_interval: Duration::from_millis(config.slow_interval_ms),
            fast_window: Duration::from_millis(config.fast_window_ms),
            error_retry: Duration::from_millis(config.error_retry_ms),
        }
    }
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl PollingPolicy {
    /// Delay before the next poll given time elapsed since tracking began
    pub fn interval_for(&self, elapsed: Duration) -> Duration {
        if elapsed <= self.fast_window {
            self.fast_interval
        } else {
            self.slow_interval
        }
    }
}

#[derive(Clone)]
pub struct JobPoller {
    service: Arc<dyn CreativeService>,
    policy: PollingPolicy,
}

impl JobPoller {
    pub fn new(service: Arc<dyn CreativeService>, policy: PollingPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> PollingPolicy {
        self.policy
    }

    /// Start polling `job_id`; the first poll is issued immediately
    ///
    /// Must be called from within a tokio runtime.
    pub fn track_job(
        &self,
        job_id: impl Into<String>,
        on_complete: Option<CompletionCallback>,
    ) -> JobHandle {
        let job_id = job_id.into();
        let mut job = Job::new(job_id.clone());
        job.start();

        let (tx, rx) = watch::channel(job);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_poller(
            self.service.clone(),
            self.policy,
            job_id.clone(),
            tx,
            cancel.clone(),
            on_complete,
        ));

        JobHandle {
            job_id,
            state: rx,
            cancel,
            task,
        }
    }
}

/// Observer side of a tracked job
///
/// Dropping the handle cancels polling.
#[derive(Debug)]
pub struct JobHandle {
    job_id: String,
    state: watch::Receiver<Job>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current job state
    pub fn snapshot(&self) -> Job {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the polling task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the job is terminal, polling stops, or the handle is cancelled
    pub async fn wait(&self) -> Job {
        let mut rx = self.state.clone();
        loop {
            {
                let job = rx.borrow_and_update();
                if job.is_terminal() {
                    return job.clone();
                }
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return rx.borrow().clone();
                    }
                }
                _ = self.cancel.cancelled() => {
                    return rx.borrow().clone();
                }
            }
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_poller(
    service: Arc<dyn CreativeService>,
    policy: PollingPolicy,
    job_id: String,
    tx: watch::Sender<Job>,
    cancel: CancellationToken,
    mut on_complete: Option<CompletionCallback>,
) {
    let started = Instant::now();
    let mut delay = Duration::ZERO;
    let mut polls: u32 = 0;

    info!(job_id = %job_id, service = service.service_name(), "Tracking job");

    loop {
        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(job_id = %job_id, "Job polling cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            debug!(job_id = %job_id, "Job polling cancelled");
            return;
        }

        polls += 1;
        let response = service.poll_job(&job_id).await;

        if cancel.is_cancelled() {
            debug!(job_id = %job_id, polls, "Discarding poll result after cancellation");
            return;
        }

        let poll = match response {
            Ok(poll) => poll,
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    polls,
                    retry_ms = policy.error_retry.as_millis() as u64,
                    error = %e,
                    "Job poll failed, will retry"
                );
                delay = policy.error_retry;
                continue;
            }
        };

        match poll.status {
            RemoteJobState::Complete => {
                let Some(url) = poll.media_url else {
                    warn!(job_id = %job_id, "Remote reported completion without media");
                    tx.send_modify(|job| {
                        job.fail(MISSING_MEDIA_MESSAGE);
                    });
                    return;
                };

                let mut completed = false;
                tx.send_modify(|job| completed = job.complete(url.clone()));
                info!(
                    job_id = %job_id,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job complete"
                );
                if completed {
                    if let Some(callback) = on_complete.take() {
                        callback(url);
                    }
                }
                return;
            }
            RemoteJobState::Failed => {
                warn!(job_id = %job_id, polls, "Remote reported job failure");
                tx.send_modify(|job| {
                    job.fail(JOB_FAILED_MESSAGE);
                });
                return;
            }
            RemoteJobState::Pending | RemoteJobState::Processing => {
                tx.send_modify(|job| {
                    job.advance_estimate();
                });
                delay = policy.interval_for(started.elapsed());
                debug!(
                    job_id = %job_id,
                    polls,
                    progress = tx.borrow().progress,
                    next_poll_ms = delay.as_millis() as u64,
                    "Job still processing"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::contract::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use studio_common::models::{CreativeConcept, Evaluation, JobStatus};
    use studio_common::{Error, Result};

    /// Serves scripted poll responses and records when each poll happened
    struct ScriptedPolls {
        responses: Mutex<VecDeque<Result<JobPollResponse>>>,
        poll_times: Mutex<Vec<Instant>>,
        latency: Duration,
    }

    impl ScriptedPolls {
        fn new(responses: Vec<Result<JobPollResponse>>) -> Arc<Self> {
            Self::with_latency(responses, Duration::ZERO)
        }

        fn with_latency(responses: Vec<Result<JobPollResponse>>, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                poll_times: Mutex::new(Vec::new()),
                latency,
            })
        }

        fn gaps_ms(&self) -> Vec<u64> {
            let times = self.poll_times.lock().unwrap();
            times
                .windows(2)
                .map(|w| (w[1] - w[0]).as_millis() as u64)
                .collect()
        }
    }

    fn processing() -> Result<JobPollResponse> {
        Ok(JobPollResponse {
            status: RemoteJobState::Processing,
            media_url: None,
        })
    }

    fn complete(url: &str) -> Result<JobPollResponse> {
        Ok(JobPollResponse {
            status: RemoteJobState::Complete,
            media_url: Some(url.to_string()),
        })
    }

    #[async_trait]
    impl CreativeService for ScriptedPolls {
        fn service_name(&self) -> &'static str {
            "scripted"
        }
        async fn classify(&self, _: &str) -> Result<TriageVerdict> {
            unimplemented!()
        }
        async fn delegate_compliance(&self, _: &ComplianceRequest) -> Result<ComplianceVerdict> {
            unimplemented!()
        }
        async fn retrieve_guidelines(&self, _: &str, _: GuidelineSource) -> Result<GuidelineResponse> {
            unimplemented!()
        }
        async fn synthesize_concepts(&self, _: &SynthesisRequest) -> Result<SynthesisResponse> {
            unimplemented!()
        }
        async fn evaluate_concept(&self, _: &EvaluationRequest) -> Result<Evaluation> {
            unimplemented!()
        }
        async fn generate_image(&self, _: &ImageRequest) -> Result<GenerationResponse> {
            unimplemented!()
        }
        async fn generate_video(&self, _: &VideoRequest) -> Result<GenerationResponse> {
            unimplemented!()
        }
        async fn generate_voiceover(&self, _: &VoiceoverRequest) -> Result<GenerationResponse> {
            unimplemented!()
        }
        async fn poll_job(&self, _job_id: &str) -> Result<JobPollResponse> {
            self.poll_times.lock().unwrap().push(Instant::now());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(processing)
        }
        async fn log_preference(&self, _: &CreativeConcept) -> Result<()> {
            Ok(())
        }
        async fn save_style_preference(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn interval_switches_after_fast_window() {
        let policy = PollingPolicy::default();
        assert_eq!(policy.interval_for(Duration::ZERO), Duration::from_millis(2000));
        assert_eq!(policy.interval_for(Duration::from_millis(10_000)), Duration::from_millis(2000));
        assert_eq!(policy.interval_for(Duration::from_millis(10_001)), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_cadence_backs_off_after_ten_seconds() {
        let mut script: Vec<_> = (0..8).map(|_| processing()).collect();
        script.push(complete("https://x/a.mp4"));
        let service = ScriptedPolls::new(script);
        let poller = JobPoller::new(service.clone(), PollingPolicy::default());

        let handle = poller.track_job("job_42", None);
        let job = handle.wait().await;

        assert_eq!(job.status, JobStatus::Complete);
        // Polls at 0,2,4,6,8,10,12 then 17,22
        assert_eq!(
            service.gaps_ms(),
            vec![2000, 2000, 2000, 2000, 2000, 2000, 5000, 5000]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn completion_sets_url_and_calls_back_once() {
        let service = ScriptedPolls::new(vec![processing(), processing(), complete("https://x/a.mp4")]);
        let poller = JobPoller::new(service, PollingPolicy::default());
        let calls = Arc::new(AtomicU32::new(0));
        let seen_url = Arc::new(Mutex::new(None));

        let handle = {
            let calls = calls.clone();
            let seen_url = seen_url.clone();
            poller.track_job(
                "job_42",
                Some(Box::new(move |url: String| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    *seen_url.lock().unwrap() = Some(url);
                })),
            )
        };

        let mut rx = handle.subscribe();
        let mut last_progress = 0.0;
        loop {
            let job = rx.borrow_and_update().clone();
            // Given: a job in flight. Then: progress never goes backwards
            assert!(job.progress >= last_progress);
            last_progress = job.progress;
            if job.is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }

        let job = handle.snapshot();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.result_url.as_deref(), Some("https://x/a.mp4"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen_url.lock().unwrap().as_deref(), Some("https://x/a.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_after_fixed_delay() {
        let service = ScriptedPolls::new(vec![
            Err(Error::Transport("connection reset".to_string())),
            complete("https://x/b.png"),
        ]);
        let poller = JobPoller::new(service.clone(), PollingPolicy::default());

        let job = poller.track_job("job_7", None).wait().await;

        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(service.gaps_ms(), vec![5000]);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_is_terminal_without_callback() {
        let service = ScriptedPolls::new(vec![Ok(JobPollResponse {
            status: RemoteJobState::Failed,
            media_url: None,
        })]);
        let poller = JobPoller::new(service, PollingPolicy::default());
        let calls = Arc::new(AtomicU32::new(0));

        let handle = {
            let calls = calls.clone();
            poller.track_job(
                "job_9",
                Some(Box::new(move |_: String| {
                    calls.fetch_add(1, Ordering::SeqCst);
                })),
            )
        };
        let job = handle.wait().await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.error.as_deref(), Some(JOB_FAILED_MESSAGE));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_without_media_fails_the_job() {
        let service = ScriptedPolls::new(vec![Ok(JobPollResponse {
            status: RemoteJobState::Complete,
            media_url: None,
        })]);
        let poller = JobPoller::new(service, PollingPolicy::default());

        let job = poller.track_job("job_3", None).wait().await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(MISSING_MEDIA_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_in_flight_result() {
        // Given: a poll that takes one second and would complete the job
        let service =
            ScriptedPolls::with_latency(vec![complete("https://x/late.mp4")], Duration::from_secs(1));
        let poller = JobPoller::new(service, PollingPolicy::default());
        let calls = Arc::new(AtomicU32::new(0));

        let handle = {
            let calls = calls.clone();
            poller.track_job(
                "job_late",
                Some(Box::new(move |_: String| {
                    calls.fetch_add(1, Ordering::SeqCst);
                })),
            )
        };

        // When: the observer is torn down while the request is in flight
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        // Then: the late result is not applied
        let job = handle.snapshot();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.result_url.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_polling() {
        let service = ScriptedPolls::new(Vec::new());
        let poller = JobPoller::new(service.clone(), PollingPolicy::default());

        let handle = poller.track_job("job_forever", None);
        tokio::time::sleep(Duration::from_millis(4500)).await;
        drop(handle);
        let polls_at_drop = service.poll_times.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(service.poll_times.lock().unwrap().len(), polls_at_drop);
        assert_eq!(polls_at_drop, 3);
    }
}
