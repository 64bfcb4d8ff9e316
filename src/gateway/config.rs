use crate::config::GenerationSettings;
use once_cell::sync::Lazy;
use std::env;

pub static OPENAI_BASE_URL: Lazy<String> = Lazy::new(|| {
    env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string())
});

pub static FAL_QUEUE_URL: Lazy<String> =
    Lazy::new(|| env::var("FAL_QUEUE_URL").unwrap_or_else(|_| "https://queue.fal.run".to_string()));

/// Server-held credentials. Loaded once; never mutated and never echoed back.
#[derive(Clone, Default)]
pub struct GatewaySecrets {
    pub store_domain: Option<String>,
    pub store_access_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub fal_api_key: Option<String>,
    pub sheets_webhook_url: Option<String>,
}

impl GatewaySecrets {
    pub fn from_env() -> Self {
        Self {
            store_domain: non_empty_env("SHOPIFY_STORE_DOMAIN"),
            store_access_token: non_empty_env("SHOPIFY_ACCESS_TOKEN"),
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            fal_api_key: non_empty_env("FAL_AI_KEY"),
            sheets_webhook_url: non_empty_env("GOOGLE_SHEETS_WEBHOOK_URL"),
        }
    }

    /// Names of secrets that are not configured, for the startup log.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("SHOPIFY_STORE_DOMAIN", self.store_domain.is_none()),
            ("SHOPIFY_ACCESS_TOKEN", self.store_access_token.is_none()),
            ("OPENAI_API_KEY", self.openai_api_key.is_none()),
            ("FAL_AI_KEY", self.fal_api_key.is_none()),
            ("GOOGLE_SHEETS_WEBHOOK_URL", self.sheets_webhook_url.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

impl std::fmt::Debug for GatewaySecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySecrets")
            .field("missing", &self.missing())
            .finish()
    }
}

/// Where each upstream lives. Overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct UpstreamEndpoints {
    pub openai_base: String,
    pub fal_queue_base: String,
    pub fal_model_path: String,
    pub storefront_scheme: String,
}

impl UpstreamEndpoints {
    /// Hosts come from the environment; the generation model path comes from
    /// the loaded pipeline settings, the same value the poller reads.
    pub fn from_env(generation: &GenerationSettings) -> Self {
        Self {
            openai_base: OPENAI_BASE_URL.trim_end_matches('/').to_string(),
            fal_queue_base: FAL_QUEUE_URL.trim_end_matches('/').to_string(),
            fal_model_path: generation.model_path.trim_matches('/').to_string(),
            storefront_scheme: "https".to_string(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
