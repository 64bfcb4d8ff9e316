pub mod vision;

pub use vision::{ChatCompletionRequest, LlmError, VisionClient};
