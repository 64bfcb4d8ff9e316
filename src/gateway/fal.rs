use super::{GatewayError, GatewayResponse, relay};
use reqwest::Client;
use serde_json::Value;

fn authorization(key: &str) -> String {
    format!("Key {key}")
}

pub(super) async fn submit(
    http: &Client,
    url: &str,
    key: &str,
    payload: &Value,
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .post(url)
        .header(reqwest::header::AUTHORIZATION, authorization(key))
        .json(payload)
        .send()
        .await?;
    relay(response).await
}

pub(super) async fn status(
    http: &Client,
    url: &str,
    key: &str,
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .get(url)
        .header(reqwest::header::AUTHORIZATION, authorization(key))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .send()
        .await?;
    relay(response).await
}
