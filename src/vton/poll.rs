use super::{GenerationMode, JobId, VtonError};
use crate::config::PollingSettings;
use crate::gateway::{GatewayRequest, Upstream};
use serde::Deserialize;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn for_mode(settings: &PollingSettings, mode: GenerationMode) -> Self {
        Self::new(settings.interval(), settings.max_attempts.for_mode(mode))
    }
}

/// Classification of one check.
#[derive(Debug)]
pub enum PollStep<T> {
    Pending,
    Ready(T),
    Failed(String),
}

#[derive(Debug)]
pub enum PollError<E> {
    Failed { status: String },
    Exhausted { attempts: u32 },
    Check(E),
}

/// Bounded fixed-interval retry. `check` runs at most `max_attempts` times,
/// strictly one after another, with `interval` slept between consecutive
/// checks. Terminal steps and check errors end the loop at once.
pub async fn poll_until<T, E, F, Fut>(policy: PollPolicy, mut check: F) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStep<T>, E>>,
{
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            sleep(policy.interval).await;
        }
        match check(attempt).await.map_err(PollError::Check)? {
            PollStep::Ready(value) => return Ok(value),
            PollStep::Failed(status) => return Err(PollError::Failed { status }),
            PollStep::Pending => {}
        }
    }
    Err(PollError::Exhausted {
        attempts: policy.max_attempts,
    })
}

#[derive(Deserialize)]
struct StatusRecord {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct ResultRecord {
    #[serde(default)]
    images: Vec<ResultImage>,
}

#[derive(Deserialize)]
struct ResultImage {
    url: Option<String>,
}

#[derive(Clone)]
pub struct Poller {
    upstream: Arc<dyn Upstream>,
    model_path: String,
}

impl Poller {
    pub fn new(upstream: Arc<dyn Upstream>, model_path: impl Into<String>) -> Self {
        Self {
            upstream,
            model_path: model_path.into().trim_matches('/').to_string(),
        }
    }

    /// Wait for `job` to finish and return the first output image URL.
    pub async fn poll(&self, job: &JobId, policy: PollPolicy) -> Result<String, VtonError> {
        let record_path = format!(
            "/{}/requests/{}",
            self.model_path,
            urlencoding::encode(job.as_str())
        );
        let status_path = format!("{record_path}/status");
        let status_path = status_path.as_str();
        let this = self;

        let outcome = poll_until(policy, move |attempt| {
            this.check_status(status_path, job, attempt)
        })
        .await;

        match outcome {
            Ok(()) => {
                info!(target = "vton.poll", job_id = %job, "generation completed");
                self.fetch_result(&record_path).await
            }
            Err(PollError::Failed { status }) => {
                warn!(
                    target = "vton.poll",
                    job_id = %job,
                    status = status.as_str(),
                    "generation failed"
                );
                Err(VtonError::GenerationFailed {
                    job_id: job.to_string(),
                    status,
                })
            }
            Err(PollError::Exhausted { attempts }) => {
                warn!(target = "vton.poll", job_id = %job, attempts, "poll budget exhausted");
                Err(VtonError::Timeout {
                    job_id: job.to_string(),
                    attempts,
                })
            }
            Err(PollError::Check(err)) => Err(err),
        }
    }

    async fn check_status(
        &self,
        path: &str,
        job: &JobId,
        attempt: u32,
    ) -> Result<PollStep<()>, VtonError> {
        let response = self.upstream.forward(GatewayRequest::fal_status(path)).await;
        if !response.is_success() {
            return Err(VtonError::Transport {
                status: response.status,
                body: response.body,
            });
        }
        let record: StatusRecord = response
            .parse_json()
            .map_err(|err| VtonError::InvalidResponse(format!("status record: {err}")))?;

        crate::metrics::poll_attempt(job.as_str(), attempt, &record.status);
        debug!(
            target = "vton.poll",
            job_id = %job,
            attempt,
            status = record.status.as_str(),
            "status checked"
        );

        Ok(match record.status.as_str() {
            "COMPLETED" => PollStep::Ready(()),
            "FAILED" | "ERROR" => PollStep::Failed(record.status),
            _ => PollStep::Pending,
        })
    }

    async fn fetch_result(&self, path: &str) -> Result<String, VtonError> {
        let response = self.upstream.forward(GatewayRequest::fal_status(path)).await;
        if !response.is_success() {
            return Err(VtonError::Transport {
                status: response.status,
                body: response.body,
            });
        }
        let record: ResultRecord = response
            .parse_json()
            .map_err(|err| VtonError::InvalidResponse(format!("result record: {err}")))?;
        record
            .images
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .ok_or_else(|| VtonError::InvalidResponse("result record has no image url".into()))
    }
}
