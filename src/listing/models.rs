use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Source product as scraped from the origin storefront. Read-only once set.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScrapedProduct {
    pub title: String,
    /// Source-currency price.
    pub price: f64,
    pub product_code: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<SizeStock>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SizeStock {
    pub size: String,
    #[serde(default)]
    pub stock: i64,
}

/// Operator-editable listing fields accumulated over a session.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ListingDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub multiplier: Option<f64>,
    pub custom_price: Option<f64>,
}

/// Partial update of a [`ListingDraft`]; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub custom_price: Option<f64>,
}

impl ListingDraft {
    pub fn apply(&mut self, patch: ListingPatch) {
        if let Some(title) = patch.title {
            self.title = Some(title.trim().to_string()).filter(|t| !t.is_empty());
        }
        if let Some(description) = patch.description {
            self.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(multiplier) = patch.multiplier {
            self.multiplier = Some(multiplier);
        }
        if let Some(custom) = patch.custom_price {
            self.custom_price = (custom > 0.0).then_some(custom);
        }
    }
}
