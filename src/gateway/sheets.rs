use super::{GatewayError, GatewayResponse};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

/// Apps Script webhooks answer with redirects or opaque bodies, so any answer
/// at all counts as logged. Only a transport failure is an error.
pub(super) async fn append_row(
    http: &Client,
    webhook: &str,
    row: &[Value],
) -> Result<GatewayResponse, GatewayError> {
    let response = http
        .post(webhook)
        .json(&json!({ "data": row }))
        .send()
        .await?;
    debug!(
        target = "vton.gateway",
        upstream_status = response.status().as_u16(),
        "sheets webhook answered"
    );
    Ok(GatewayResponse::json(
        200,
        &json!({ "success": true, "message": "Logged to Sheets" }),
    ))
}
