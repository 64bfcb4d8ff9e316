use super::StoreCredentials;
use super::config::ACCESS_TOKEN_HEADER;
use crate::gateway::{EntityId, GatewayError, GatewayResponse, relay};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct UploadedImage {
    image: UploadedImageBody,
}

#[derive(Debug, Deserialize)]
struct UploadedImageBody {
    id: u64,
    #[serde(default)]
    position: Option<u32>,
    #[serde(default)]
    src: Option<String>,
}

pub async fn list_images(
    http: &Client,
    store: &StoreCredentials,
    product_id: &EntityId,
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .get(store.admin_url(&format!("products/{product_id}/images.json")))
        .header(ACCESS_TOKEN_HEADER, &store.token)
        .send()
        .await?;
    relay(response).await
}

pub async fn upload_image(
    http: &Client,
    store: &StoreCredentials,
    product_id: &EntityId,
    image_url: &str,
    position: Option<u32>,
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .post(store.admin_url(&format!("products/{product_id}/images.json")))
        .header(ACCESS_TOKEN_HEADER, &store.token)
        .json(&json!({ "image": { "src": image_url, "position": position } }))
        .send()
        .await?;
    let relayed = relay(response).await?;
    if !relayed.is_success() {
        return Ok(relayed);
    }
    match relayed.parse_json::<UploadedImage>() {
        Ok(uploaded) => Ok(GatewayResponse::json(
            200,
            &json!({
                "success": true,
                "image_id": uploaded.image.id,
                "position": uploaded.image.position,
                "src": uploaded.image.src,
            }),
        )),
        Err(_) => Ok(relayed),
    }
}

pub async fn delete_image(
    http: &Client,
    store: &StoreCredentials,
    product_id: &EntityId,
    image_id: &EntityId,
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .delete(store.admin_url(&format!(
            "products/{product_id}/images/{image_id}.json"
        )))
        .header(ACCESS_TOKEN_HEADER, &store.token)
        .send()
        .await?;
    debug!(
        target = "vton.gateway",
        %product_id,
        %image_id,
        status = response.status().as_u16(),
        "storefront image deleted"
    );
    relay(response).await
}
