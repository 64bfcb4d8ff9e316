use super::{ProductContext, prompts};
use crate::config::VisionSettings;
use crate::gateway::Upstream;
use crate::llm::{ChatCompletionRequest, LlmError, VisionClient};
use std::sync::Arc;
use tracing::{info, warn};

/// What the analyzer is asked to describe.
#[derive(Debug, Clone)]
pub enum AnalysisTask<'a> {
    Model,
    Garment {
        fabric_hint: Option<&'a str>,
    },
    GhostGarment {
        context: &'a ProductContext,
        fabric_hint: Option<&'a str>,
    },
}

impl AnalysisTask<'_> {
    pub fn prompt(&self) -> String {
        match self {
            AnalysisTask::Model => prompts::MODEL_ANALYSIS.to_string(),
            AnalysisTask::Garment { fabric_hint } => prompts::garment_analysis(*fabric_hint),
            AnalysisTask::GhostGarment {
                context,
                fabric_hint,
            } => prompts::ghost_analysis(context, *fabric_hint),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisTask::Model => "model",
            AnalysisTask::Garment { .. } => "garment",
            AnalysisTask::GhostGarment { .. } => "ghost_garment",
        }
    }
}

/// Case-sensitive substring heuristic for "the model declined".
#[derive(Debug, Clone)]
pub struct RefusalPolicy {
    phrases: Vec<String>,
}

impl RefusalPolicy {
    pub fn new(phrases: Vec<String>) -> Self {
        Self { phrases }
    }

    pub fn is_refusal(&self, text: &str) -> bool {
        self.phrases
            .iter()
            .any(|phrase| !phrase.is_empty() && text.contains(phrase.as_str()))
    }
}

// Why one candidate was passed over. Never leaves this module.
#[derive(Debug)]
enum Rejection {
    Transport(LlmError),
    Refusal,
    Empty,
}

impl Rejection {
    fn reason(&self) -> String {
        match self {
            Rejection::Transport(err) => err.to_string(),
            Rejection::Refusal => "refusal".into(),
            Rejection::Empty => "empty completion".into(),
        }
    }
}

#[derive(Clone)]
pub struct VisionAnalyzer {
    client: VisionClient,
    models: Vec<String>,
    refusal: RefusalPolicy,
    fallback: String,
    max_tokens: u32,
}

impl VisionAnalyzer {
    pub fn new(upstream: Arc<dyn Upstream>, settings: &VisionSettings) -> Self {
        Self {
            client: VisionClient::new(upstream),
            models: settings.models.clone(),
            refusal: RefusalPolicy::new(settings.refusal_phrases.clone()),
            fallback: settings.fallback_description.clone(),
            max_tokens: settings.max_tokens,
        }
    }

    /// Try each candidate model in order and return the first usable
    /// description. When every candidate is rejected the generic fallback is
    /// returned instead of an error.
    pub async fn analyze(&self, image_url: &str, task: &AnalysisTask<'_>) -> String {
        let prompt = task.prompt();
        for model in &self.models {
            match self.attempt(model, &prompt, image_url).await {
                Ok(text) => {
                    info!(
                        target = "vton.vision",
                        task = task.label(),
                        model = model.as_str(),
                        "analysis accepted"
                    );
                    return text;
                }
                Err(rejection) => {
                    warn!(
                        target = "vton.vision",
                        task = task.label(),
                        model = model.as_str(),
                        reason = %rejection.reason(),
                        "analysis candidate rejected"
                    );
                }
            }
        }
        warn!(
            target = "vton.vision",
            task = task.label(),
            candidates = self.models.len(),
            "all candidates rejected; using fallback description"
        );
        self.fallback.clone()
    }

    async fn attempt(
        &self,
        model: &str,
        prompt: &str,
        image_url: &str,
    ) -> Result<String, Rejection> {
        let request =
            ChatCompletionRequest::single_image(model, prompt, image_url, self.max_tokens);
        let text = match self.client.complete(&request).await {
            Ok(text) => text,
            Err(LlmError::MissingText) => return Err(Rejection::Empty),
            Err(err) => return Err(Rejection::Transport(err)),
        };
        if text.is_empty() {
            return Err(Rejection::Empty);
        }
        if self.refusal.is_refusal(&text) {
            return Err(Rejection::Refusal);
        }
        Ok(text)
    }
}
