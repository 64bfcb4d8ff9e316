use super::models::ScrapedProduct;
use crate::config::ListingSettings;
use crate::shopify::{NewProduct, NewVariant, ProductImage, ProductOption};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("listing title is empty")]
    MissingTitle,
    #[error("no images selected for the listing")]
    MissingImages,
    #[error("price must be positive, got {0}")]
    InvalidPrice(f64),
}

/// Copy-edited fields that go into the storefront product.
#[derive(Debug, Clone, Copy)]
pub struct ListingContent<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub images: &'a [String],
}

pub fn variant_sku(prefix: &str, product_code: &str, size: &str) -> String {
    format!("{prefix}-{product_code}-{size}")
}

pub fn build_product_payload(
    product: &ScrapedProduct,
    content: ListingContent<'_>,
    settings: &ListingSettings,
) -> Result<NewProduct, TransformError> {
    let title = content.title.trim();
    if title.is_empty() {
        return Err(TransformError::MissingTitle);
    }
    if content.images.is_empty() {
        return Err(TransformError::MissingImages);
    }
    if content.price.is_nan() || content.price <= 0.0 {
        return Err(TransformError::InvalidPrice(content.price));
    }

    let price = format!("{:.2}", content.price);
    let variants = product
        .sizes
        .iter()
        .map(|entry| NewVariant {
            sku: variant_sku(&settings.sku_prefix, &product.product_code, &entry.size),
            price: price.clone(),
            inventory_quantity: entry.stock,
            inventory_management: "shopify".into(),
            inventory_policy: "deny".into(),
            option1: entry.size.clone(),
        })
        .collect();

    Ok(NewProduct {
        title: title.to_string(),
        body_html: content.description.replace('\n', "<br>"),
        vendor: settings.vendor.clone(),
        product_type: settings.product_type.clone(),
        images: content
            .images
            .iter()
            .map(|src| ProductImage { src: src.clone() })
            .collect(),
        variants,
        options: vec![ProductOption {
            name: "Size".into(),
            values: product.sizes.iter().map(|s| s.size.clone()).collect(),
        }],
    })
}

/// One spreadsheet row per variant: `[title, sku, stock]`.
pub fn sheet_rows(title: &str, product: &ScrapedProduct, sku_prefix: &str) -> Vec<Vec<Value>> {
    product
        .sizes
        .iter()
        .map(|entry| {
            vec![
                json!(title),
                json!(variant_sku(sku_prefix, &product.product_code, &entry.size)),
                json!(entry.stock),
            ]
        })
        .collect()
}
