use super::VtonError;
use crate::config::GenerationSettings;
use crate::gateway::{GatewayRequest, Upstream};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::info;

/// Body of a generation job, as sent through `fal_submit`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub image_urls: Vec<String>,
    pub prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
}

impl SubmitRequest {
    pub fn new(prompt: String, image_urls: Vec<String>, settings: &GenerationSettings) -> Self {
        Self {
            image_urls,
            prompt,
            aspect_ratio: settings.aspect_ratio.clone(),
            resolution: settings.resolution.clone(),
        }
    }
}

/// Provider-assigned job identifier. Opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
struct SubmitAck {
    request_id: Option<String>,
}

#[derive(Clone)]
pub struct JobSubmitter {
    upstream: Arc<dyn Upstream>,
}

impl JobSubmitter {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// One submission, no retry.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<JobId, VtonError> {
        let payload = serde_json::to_value(request)
            .map_err(|err| VtonError::InvalidResponse(err.to_string()))?;
        let response = self.upstream.forward(GatewayRequest::fal_submit(payload)).await;
        if !response.is_success() {
            return Err(VtonError::Submission {
                status: response.status,
                body: response.body,
            });
        }

        let ack: SubmitAck = response
            .parse_json()
            .map_err(|err| VtonError::InvalidResponse(format!("submit ack: {err}")))?;
        let id = ack
            .request_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| VtonError::InvalidResponse("submit ack without request_id".into()))?;

        info!(
            target = "vton.submit",
            job_id = id.as_str(),
            images = request.image_urls.len(),
            "generation job submitted"
        );
        Ok(JobId::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayAction, GatewayResponse};
    use crate::testing::ScriptedUpstream;
    use serde_json::json;

    fn request() -> SubmitRequest {
        SubmitRequest::new(
            "prompt".into(),
            vec!["https://x/m.jpg".into(), "https://x/g.jpg".into()],
            &GenerationSettings::default(),
        )
    }

    #[tokio::test]
    async fn returns_request_id_and_sends_full_payload() {
        let upstream = ScriptedUpstream::new(|_| {
            GatewayResponse::json(200, &json!({"request_id": "req-42", "status": "IN_QUEUE"}))
        });
        let submitter = JobSubmitter::new(upstream.clone());

        let job = submitter.submit(&request()).await.expect("job id");

        assert_eq!(job.as_str(), "req-42");
        let calls = upstream.calls_for(GatewayAction::FalSubmit);
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].payload,
            Some(json!({
                "image_urls": ["https://x/m.jpg", "https://x/g.jpg"],
                "prompt": "prompt",
                "aspect_ratio": "9:16",
                "resolution": "2K"
            }))
        );
    }

    #[tokio::test]
    async fn non_success_is_submission_error_with_body() {
        let upstream = ScriptedUpstream::new(|_| {
            GatewayResponse::raw(422, "application/json", "{\"detail\":\"bad image\"}")
        });
        let submitter = JobSubmitter::new(upstream);

        match submitter.submit(&request()).await {
            Err(VtonError::Submission { status, body }) => {
                assert_eq!(status, 422);
                assert!(body.contains("bad image"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ack_without_id_is_invalid() {
        let upstream =
            ScriptedUpstream::new(|_| GatewayResponse::json(200, &json!({"status": "IN_QUEUE"})));
        let submitter = JobSubmitter::new(upstream);
        let err = submitter.submit(&request()).await.expect_err("missing id");
        assert!(matches!(err, VtonError::InvalidResponse(_)));
    }
}
