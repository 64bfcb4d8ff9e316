use super::{GatewayError, GatewayResponse};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Client, Url};
use std::time::Duration;

const SCRAPE_TIMEOUT: Duration = Duration::from_secs(8);
const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

fn parse_http_url(raw: &str) -> Result<Url, GatewayError> {
    let url = Url::parse(raw.trim()).map_err(|err| GatewayError::InvalidUrl(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GatewayError::InvalidUrl(format!("unsupported scheme `{other}`"))),
    }
}

/// Fetch raw page markup. Redirects are followed by the client.
pub(super) async fn scrape_page(
    http: &Client,
    raw_url: &str,
) -> Result<GatewayResponse, GatewayError> {
    let url = parse_http_url(raw_url)?;
    let response = http
        .get(url)
        .timeout(SCRAPE_TIMEOUT)
        .header(reqwest::header::USER_AGENT, BROWSER_AGENT)
        .header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header(
            reqwest::header::ACCEPT_LANGUAGE,
            "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7",
        )
        .send()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                GatewayError::Timeout(
                    "page took too long to respond (>8s); try again or use a different URL".into(),
                )
            } else {
                GatewayError::Unreachable(err.to_string())
            }
        })?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(GatewayResponse::raw(status, "text/html", body).with_header("cache-control", "no-cache"))
}

/// Fetch an image and hand it back base64-encoded for display-layer use.
pub(super) async fn proxy_image(
    http: &Client,
    raw_url: &str,
) -> Result<GatewayResponse, GatewayError> {
    let url = parse_http_url(raw_url)?;
    let response = http
        .get(url)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
        .send()
        .await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Ok(GatewayResponse::error(status.as_u16(), "Failed to fetch image"));
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let bytes = response.bytes().await?;
    Ok(GatewayResponse::raw(200, content_type, BASE64.encode(&bytes))
        .with_header("x-body-encoding", "base64")
        .with_header("cache-control", "public, max-age=31536000"))
}
