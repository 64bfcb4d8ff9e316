use super::{GatewayError, GatewayResponse, relay};
use reqwest::Client;
use serde_json::Value;

pub(super) async fn chat_completions(
    http: &Client,
    base: &str,
    api_key: &str,
    payload: &Value,
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .post(format!("{base}/v1/chat/completions"))
        .bearer_auth(api_key)
        .json(payload)
        .send()
        .await?;
    relay(response).await
}
