//! Stateless router in front of every third-party call.
//!
//! The gateway attaches server-held secrets, forwards the call and relays the
//! upstream status and body untouched. Local problems (missing secret, missing
//! field, unreachable host) become synthesized error responses; nothing here
//! retries.

pub mod config;
mod fal;
mod fetch;
mod openai;
mod sheets;

use crate::config::GenerationSettings;
use crate::http::build_client;
use crate::shopify::{self, StoreCredentials};
use async_trait::async_trait;
use axum::{
    http::{HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};

pub use config::{GatewaySecrets, UpstreamEndpoints};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayAction {
    WpScrape,
    OpenaiVision,
    FalSubmit,
    FalStatus,
    CreateProduct,
    GetImages,
    UploadImage,
    DeleteImage,
    GoogleSheetsLog,
    ImageProxy,
}

impl GatewayAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayAction::WpScrape => "wp_scrape",
            GatewayAction::OpenaiVision => "openai_vision",
            GatewayAction::FalSubmit => "fal_submit",
            GatewayAction::FalStatus => "fal_status",
            GatewayAction::CreateProduct => "create_product",
            GatewayAction::GetImages => "get_images",
            GatewayAction::UploadImage => "upload_image",
            GatewayAction::DeleteImage => "delete_image",
            GatewayAction::GoogleSheetsLog => "google_sheets_log",
            GatewayAction::ImageProxy => "image_proxy",
        }
    }
}

/// Storefront ids arrive as numbers from the storefront and as strings from
/// hand-written clients; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(u64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(value) => write!(f, "{value}"),
            EntityId::Text(value) => f.write_str(value),
        }
    }
}

/// Tagged request accepted by `POST /proxy`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// Absent means an image upload, matching the legacy proxy contract.
    #[serde(default)]
    pub action: Option<GatewayAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wp_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_data: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default)]
    pub replace_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl GatewayRequest {
    pub fn new(action: GatewayAction) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn vision(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::new(GatewayAction::OpenaiVision)
        }
    }

    pub fn fal_submit(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::new(GatewayAction::FalSubmit)
        }
    }

    pub fn fal_status(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(GatewayAction::FalStatus)
        }
    }

    pub fn create_product(product: Value) -> Self {
        Self {
            product: Some(product),
            ..Self::new(GatewayAction::CreateProduct)
        }
    }

    pub fn sheets_row(row: Vec<Value>) -> Self {
        Self {
            row_data: Some(row),
            ..Self::new(GatewayAction::GoogleSheetsLog)
        }
    }

    pub fn action(&self) -> GatewayAction {
        self.action.unwrap_or(GatewayAction::UploadImage)
    }
}

/// Upstream answer (or a synthesized failure), relayed as-is to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl GatewayResponse {
    pub fn raw(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::raw(status, "application/json", body.to_string())
    }

    pub fn error(status: u16, message: impl fmt::Display) -> Self {
        Self::json(status, &json!({ "error": message.to_string() }))
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        for (name, value) in self.headers {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        response
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Configuration(&'static str),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
    #[error("upstream timed out: {0}")]
    Timeout(String),
}

impl GatewayError {
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Configuration(_) | GatewayError::Unreachable(_) => 500,
            GatewayError::MissingField(_) | GatewayError::InvalidUrl(_) => 400,
            GatewayError::Timeout(_) => 504,
        }
    }

    pub fn into_response(self) -> GatewayResponse {
        GatewayResponse::error(self.status(), &self)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else {
            GatewayError::Unreachable(err.to_string())
        }
    }
}

/// Seam between the pipeline and the outside world.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, request: GatewayRequest) -> GatewayResponse;
}

#[derive(Clone)]
pub struct Gateway {
    http: Client,
    secrets: Arc<GatewaySecrets>,
    endpoints: Arc<UpstreamEndpoints>,
}

impl Gateway {
    pub fn new(secrets: GatewaySecrets, endpoints: UpstreamEndpoints) -> Self {
        Self {
            http: build_client(),
            secrets: Arc::new(secrets),
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn from_env(generation: &GenerationSettings) -> Self {
        let secrets = GatewaySecrets::from_env();
        let missing = secrets.missing();
        if !missing.is_empty() {
            warn!(target = "vton.gateway", ?missing, "gateway secrets not configured");
        }
        Self::new(secrets, UpstreamEndpoints::from_env(generation))
    }

    pub async fn dispatch(&self, request: GatewayRequest) -> GatewayResponse {
        let action = request.action();
        crate::metrics::inc_gateway_action(action.as_str());
        match self.route(action, request).await {
            Ok(response) => {
                info!(
                    target = "vton.gateway",
                    action = action.as_str(),
                    status = response.status,
                    "gateway relayed"
                );
                response
            }
            Err(err) => {
                warn!(
                    target = "vton.gateway",
                    action = action.as_str(),
                    error = %err,
                    "gateway failure"
                );
                err.into_response()
            }
        }
    }

    async fn route(
        &self,
        action: GatewayAction,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        match action {
            GatewayAction::WpScrape => {
                let url = required(request.wp_url, "wp_url")?;
                fetch::scrape_page(&self.http, &url).await
            }
            GatewayAction::ImageProxy => {
                let url = required(request.image_url, "image_url")?;
                fetch::proxy_image(&self.http, &url).await
            }
            GatewayAction::OpenaiVision => {
                let key = non_empty(request.api_key)
                    .or_else(|| self.secrets.openai_api_key.clone())
                    .ok_or(GatewayError::Configuration(
                        "OpenAI API key not configured in environment",
                    ))?;
                let payload = required(request.payload, "payload")?;
                openai::chat_completions(&self.http, &self.endpoints.openai_base, &key, &payload)
                    .await
            }
            GatewayAction::FalSubmit => {
                let key = self.fal_key()?;
                let payload = required(request.payload, "payload")?;
                let url = format!(
                    "{}/{}/edit",
                    self.endpoints.fal_queue_base, self.endpoints.fal_model_path
                );
                fal::submit(&self.http, &url, key, &payload).await
            }
            GatewayAction::FalStatus => {
                let key = self.fal_key()?;
                let path = required(request.path, "path")?;
                let url = format!(
                    "{}/{}",
                    self.endpoints.fal_queue_base,
                    path.trim_start_matches('/')
                );
                fal::status(&self.http, &url, key).await
            }
            GatewayAction::CreateProduct => {
                let store = self.store_credentials(&request)?;
                let product = required(request.product, "product")?;
                shopify::products::create_product(&self.http, &store, &product).await
            }
            GatewayAction::GetImages => {
                let store = self.store_credentials(&request)?;
                let product_id = required(request.product_id, "product_id")?;
                shopify::images::list_images(&self.http, &store, &product_id).await
            }
            GatewayAction::UploadImage => {
                let store = self.store_credentials(&request)?;
                let product_id = required(request.product_id, "product_id")?;
                let image_url = required(request.image_url, "image_url")?;
                if request.replace_mode
                    && let Some(old) = &request.old_image_id
                {
                    shopify::images::delete_image(&self.http, &store, &product_id, old)
                        .await
                        .ok();
                }
                shopify::images::upload_image(
                    &self.http,
                    &store,
                    &product_id,
                    &image_url,
                    request.position,
                )
                .await
            }
            GatewayAction::DeleteImage => {
                let store = self.store_credentials(&request)?;
                let product_id = required(request.product_id, "product_id")?;
                let image_id = required(request.image_id.or(request.old_image_id), "image_id")?;
                shopify::images::delete_image(&self.http, &store, &product_id, &image_id).await
            }
            GatewayAction::GoogleSheetsLog => {
                let webhook = self.secrets.sheets_webhook_url.as_deref().ok_or(
                    GatewayError::Configuration(
                        "Google Sheets webhook URL not configured in environment",
                    ),
                )?;
                let row = required(request.row_data, "row_data")?;
                sheets::append_row(&self.http, webhook, &row).await
            }
        }
    }

    fn fal_key(&self) -> Result<&str, GatewayError> {
        self.secrets
            .fal_api_key
            .as_deref()
            .ok_or(GatewayError::Configuration(
                "FAL AI key not configured in environment",
            ))
    }

    /// Explicit request credentials win; the environment is the fallback.
    fn store_credentials(
        &self,
        request: &GatewayRequest,
    ) -> Result<StoreCredentials, GatewayError> {
        let domain = non_empty(request.store_domain.clone())
            .or_else(|| self.secrets.store_domain.clone());
        let token = non_empty(request.access_token.clone())
            .or_else(|| self.secrets.store_access_token.clone());
        match (domain, token) {
            (Some(domain), Some(token)) => Ok(StoreCredentials {
                scheme: self.endpoints.storefront_scheme.clone(),
                domain,
                token,
            }),
            _ => Err(GatewayError::Configuration(
                "Missing store credentials (server-side env vars not set)",
            )),
        }
    }
}

#[async_trait]
impl Upstream for Gateway {
    async fn forward(&self, request: GatewayRequest) -> GatewayResponse {
        self.dispatch(request).await
    }
}

/// Read status, content type and body of an upstream response without
/// interpreting them.
pub(crate) async fn relay(response: reqwest::Response) -> Result<GatewayResponse, GatewayError> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();
    let body = response.text().await?;
    Ok(GatewayResponse::raw(status, content_type, body))
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, GatewayError> {
    value.ok_or(GatewayError::MissingField(field))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
