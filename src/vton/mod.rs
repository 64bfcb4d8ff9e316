//! Virtual try-on pipeline: vision analysis, job submission, polling and the
//! four generation modes that compose them.

pub mod modes;
pub mod poll;
pub mod prompts;
pub mod submit;
pub mod vision;

use thiserror::Error;

pub use modes::{
    GenerationInput, GenerationMode, GenerationOutcome, ModeOrchestrator, PairRunner,
    ProductContext,
};
pub use poll::{PollPolicy, Poller};
pub use submit::{JobId, JobSubmitter, SubmitRequest};
pub use vision::{AnalysisTask, RefusalPolicy, VisionAnalyzer};

/// Failure of one pair's processing attempt. Every variant aborts the pair
/// only; the drain loop records it and moves on.
#[derive(Debug, Error)]
pub enum VtonError {
    #[error("upstream returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },
    #[error("job submission rejected with HTTP {status}: {body}")]
    Submission { status: u16, body: String },
    #[error("generation job {job_id} ended with status {status}")]
    GenerationFailed { job_id: String, status: String },
    #[error("generation job {job_id} not finished after {attempts} status checks")]
    Timeout { job_id: String, attempts: u32 },
    #[error("unexpected upstream response: {0}")]
    InvalidResponse(String),
    #[error("{mode} mode requires a model image")]
    MissingModelImage { mode: GenerationMode },
}

impl VtonError {
    pub fn code(&self) -> &'static str {
        match self {
            VtonError::Transport { .. } => "transport_error",
            VtonError::Submission { .. } => "submission_error",
            VtonError::GenerationFailed { .. } => "generation_failed",
            VtonError::Timeout { .. } => "timeout",
            VtonError::InvalidResponse(_) => "invalid_response",
            VtonError::MissingModelImage { .. } => "missing_model_image",
        }
    }
}
