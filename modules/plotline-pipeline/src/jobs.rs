use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use plotline_common::Config;
use starscape_client::{
    classify_status, Endpoint, JobOutcome, JobToken, QueryRequest, StatusCheck, Submission,
};

use crate::traits::AnalyticsApi;

/// How long and how often to poll a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    /// Treat a job as finished once this many child items are present and the
    /// vendor has not sent a `complete` flag.
    pub early_complete_min: Option<usize>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
            early_complete_min: None,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
            early_complete_min: config.early_complete_min,
        }
    }
}

/// Submits analyses and polls them to a terminal outcome at a fixed interval.
pub struct JobRunner<'a> {
    api: &'a dyn AnalyticsApi,
    policy: PollPolicy,
}

impl<'a> JobRunner<'a> {
    pub fn new(api: &'a dyn AnalyticsApi, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub async fn submit(
        &self,
        endpoint: Endpoint,
        request: &QueryRequest,
    ) -> starscape_client::Result<Submission> {
        self.api.submit(endpoint, request).await
    }

    /// Poll `token` until the job fails, completes, or the timeout elapses.
    ///
    /// A timeout is not an error: the last payload comes back as
    /// [`JobOutcome::TimedOut`]. HTTP failures while polling are.
    pub async fn poll(
        &self,
        endpoint: Endpoint,
        token: JobToken,
    ) -> starscape_client::Result<JobOutcome> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            let payload = self.api.job_status(&token).await?;
            attempts += 1;

            match classify_status(&payload, endpoint.child_key(), self.policy.early_complete_min) {
                StatusCheck::Failed(message) => {
                    warn!(%endpoint, %token, error = message.as_str(), "AI failed to generate output");
                    return Ok(JobOutcome::AiFailure(message));
                }
                StatusCheck::Complete => {
                    info!(%endpoint, %token, attempts, "Job complete");
                    return Ok(JobOutcome::Complete(payload));
                }
                StatusCheck::Pending => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.policy.timeout {
                warn!(
                    %endpoint,
                    %token,
                    attempts,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Polling timed out, continuing with partial payload"
                );
                return Ok(JobOutcome::TimedOut(payload));
            }

            let wait = self.policy.interval.min(self.policy.timeout - elapsed);
            debug!(
                %endpoint,
                %token,
                elapsed_secs = elapsed.as_secs_f64(),
                retry_in_secs = wait.as_secs_f64(),
                "Job still processing"
            );
            sleep(wait).await;
        }
    }

    /// Submit and poll in one step. Returns the submission summary with the outcome.
    pub async fn run(
        &self,
        endpoint: Endpoint,
        request: &QueryRequest,
    ) -> starscape_client::Result<(Submission, JobOutcome)> {
        let submission = self.submit(endpoint, request).await?;
        let outcome = self.poll(endpoint, submission.token.clone()).await?;
        Ok((submission, outcome))
    }
}
