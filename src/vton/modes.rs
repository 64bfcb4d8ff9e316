use super::{
    AnalysisTask, JobSubmitter, PollPolicy, Poller, SubmitRequest, VisionAnalyzer, VtonError,
    prompts,
};
use crate::config::{GenerationSettings, PollingSettings, VtonSettings};
use crate::gateway::Upstream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    #[default]
    Regular,
    Ghost,
    Fabric,
    SizeChart,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Regular => "regular",
            GenerationMode::Ghost => "ghost",
            GenerationMode::Fabric => "fabric",
            GenerationMode::SizeChart => "sizechart",
        }
    }

    /// Only regular try-on composites onto a model photo.
    pub fn requires_model(&self) -> bool {
        matches!(self, GenerationMode::Regular)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductContext {
    pub title: String,
    pub category: String,
}

impl ProductContext {
    pub fn new(title: Option<&str>, category: Option<&str>) -> Self {
        let or_default = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or("Product")
                .to_string()
        };
        Self {
            title: or_default(title),
            category: or_default(category),
        }
    }
}

/// Everything one pair needs to be generated.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub mode: GenerationMode,
    pub model_url: Option<String>,
    pub garment_url: String,
    pub fabric_hint: Option<String>,
    pub context: ProductContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub job_id: String,
    pub result_url: String,
    pub mode: GenerationMode,
}

/// Seam between the drain loop and whatever produces images.
#[async_trait]
pub trait PairRunner: Send + Sync {
    async fn run(&self, input: &GenerationInput) -> Result<GenerationOutcome, VtonError>;
}

#[derive(Clone)]
pub struct ModeOrchestrator {
    analyzer: VisionAnalyzer,
    submitter: JobSubmitter,
    poller: Poller,
    generation: GenerationSettings,
    polling: PollingSettings,
}

impl ModeOrchestrator {
    pub fn new(upstream: Arc<dyn Upstream>, settings: &VtonSettings) -> Self {
        Self {
            analyzer: VisionAnalyzer::new(upstream.clone(), &settings.vision),
            submitter: JobSubmitter::new(upstream.clone()),
            poller: Poller::new(upstream, settings.generation.model_path.clone()),
            generation: settings.generation.clone(),
            polling: settings.polling.clone(),
        }
    }

    pub fn analyzer(&self) -> &VisionAnalyzer {
        &self.analyzer
    }

    /// Try-on: both analyses run concurrently, then `[model, garment]` is
    /// submitted.
    pub async fn regular(
        &self,
        model_url: &str,
        garment_url: &str,
        fabric_hint: Option<&str>,
        context: &ProductContext,
    ) -> Result<GenerationOutcome, VtonError> {
        let started = Instant::now();
        let model_task = AnalysisTask::Model;
        let garment_task = AnalysisTask::Garment { fabric_hint };
        let (model_description, garment_description) = tokio::join!(
            self.analyzer.analyze(model_url, &model_task),
            self.analyzer.analyze(garment_url, &garment_task),
        );
        crate::metrics::stage_elapsed("analyze_regular", started.elapsed().as_millis());

        let prompt = prompts::regular_tryon(&model_description, &garment_description, context);
        self.submit_and_poll(
            GenerationMode::Regular,
            prompt,
            vec![model_url.to_string(), garment_url.to_string()],
        )
        .await
    }

    pub async fn ghost(
        &self,
        garment_url: &str,
        fabric_hint: Option<&str>,
        context: &ProductContext,
    ) -> Result<GenerationOutcome, VtonError> {
        let started = Instant::now();
        let description = self
            .analyzer
            .analyze(
                garment_url,
                &AnalysisTask::GhostGarment {
                    context,
                    fabric_hint,
                },
            )
            .await;
        crate::metrics::stage_elapsed("analyze_ghost", started.elapsed().as_millis());

        let prompt = prompts::ghost_mannequin(&description);
        self.submit_and_poll(GenerationMode::Ghost, prompt, vec![garment_url.to_string()])
            .await
    }

    pub async fn fabric(
        &self,
        garment_url: &str,
        fabric_hint: Option<&str>,
    ) -> Result<GenerationOutcome, VtonError> {
        let prompt = prompts::fabric_macro(fabric_hint);
        self.submit_and_poll(GenerationMode::Fabric, prompt, vec![garment_url.to_string()])
            .await
    }

    pub async fn size_chart(&self, chart_url: &str) -> Result<GenerationOutcome, VtonError> {
        self.submit_and_poll(
            GenerationMode::SizeChart,
            prompts::SIZE_CHART_TR.to_string(),
            vec![chart_url.to_string()],
        )
        .await
    }

    async fn submit_and_poll(
        &self,
        mode: GenerationMode,
        prompt: String,
        image_urls: Vec<String>,
    ) -> Result<GenerationOutcome, VtonError> {
        let request = SubmitRequest::new(prompt, image_urls, &self.generation);
        let job = self.submitter.submit(&request).await?;

        let started = Instant::now();
        let result_url = self
            .poller
            .poll(&job, PollPolicy::for_mode(&self.polling, mode))
            .await?;
        crate::metrics::stage_elapsed("poll", started.elapsed().as_millis());

        info!(
            target = "vton.modes",
            mode = mode.as_str(),
            job_id = %job,
            result_url = result_url.as_str(),
            "generation finished"
        );
        Ok(GenerationOutcome {
            job_id: job.to_string(),
            result_url,
            mode,
        })
    }
}

#[async_trait]
impl PairRunner for ModeOrchestrator {
    async fn run(&self, input: &GenerationInput) -> Result<GenerationOutcome, VtonError> {
        let hint = input.fabric_hint.as_deref();
        match input.mode {
            GenerationMode::Regular => {
                let model_url = input
                    .model_url
                    .as_deref()
                    .ok_or(VtonError::MissingModelImage { mode: input.mode })?;
                self.regular(model_url, &input.garment_url, hint, &input.context)
                    .await
            }
            GenerationMode::Ghost => self.ghost(&input.garment_url, hint, &input.context).await,
            GenerationMode::Fabric => self.fabric(&input.garment_url, hint).await,
            GenerationMode::SizeChart => self.size_chart(&input.garment_url).await,
        }
    }
}
