use super::StoreCredentials;
use super::config::ACCESS_TOKEN_HEADER;
use crate::gateway::{GatewayError, GatewayResponse};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub body_html: String,
    pub vendor: String,
    pub product_type: String,
    pub images: Vec<ProductImage>,
    pub variants: Vec<NewVariant>,
    pub options: Vec<ProductOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductImage {
    pub src: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewVariant {
    pub sku: String,
    pub price: String,
    pub inventory_quantity: i64,
    pub inventory_management: String,
    pub inventory_policy: String,
    pub option1: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductOption {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedProduct {
    product: CreatedProductBody,
}

#[derive(Debug, Deserialize)]
struct CreatedProductBody {
    id: u64,
}

pub async fn create_product(
    http: &Client,
    store: &StoreCredentials,
    product: &Value,
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .post(store.admin_url("products.json"))
        .header(ACCESS_TOKEN_HEADER, &store.token)
        .json(&json!({ "product": product }))
        .send()
        .await?;

    let status = response.status().as_u16();
    let body = response.text().await?;

    if status == 201
        && let Ok(created) = serde_json::from_str::<CreatedProduct>(&body)
    {
        let id = created.product.id;
        info!(target = "vton.gateway", product_id = id, "storefront product created");
        return Ok(GatewayResponse::json(
            201,
            &json!({
                "success": true,
                "product_id": id,
                "product_url": format!("https://{}/admin/products/{id}", store.domain),
            }),
        ));
    }

    warn!(target = "vton.gateway", status, "storefront rejected product");
    let details = serde_json::from_str::<Value>(&body).unwrap_or_else(|_| json!({ "raw": body }));
    Ok(GatewayResponse::json(
        status,
        &json!({
            "error": true,
            "statusCode": status,
            "shopify_error": details,
            "sent_payload": product,
        }),
    ))
}
