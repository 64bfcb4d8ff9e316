use crate::listing::{ListingCopy, pricing::PriceOption};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CopyRequest {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct CopyResponse {
    #[serde(flatten)]
    pub copy: ListingCopy,
    pub title_chars: usize,
    pub title_too_long: bool,
}

#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub source_price: f64,
    pub options: Vec<PriceOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_price: Option<f64>,
}

/// Explicit image order for publishing; absent means pair results followed by
/// the scraped images.
#[derive(Debug, Default, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub images: Option<Vec<String>>,
}
