use super::models::{ListingDraft, ScrapedProduct};
use super::pricing;
use super::transform::{ListingContent, TransformError, build_product_payload, sheet_rows};
use crate::config::ListingSettings;
use crate::gateway::{GatewayRequest, Upstream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no price chosen: pick a multiplier or enter a custom price")]
    MissingPrice,
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("storefront rejected the product with HTTP {status}")]
    Rejected { status: u16, body: Value },
    #[error("unexpected storefront response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishResponse {
    pub product_id: u64,
    pub product_url: String,
    pub price: f64,
    pub variants: usize,
    pub sheet_rows_logged: usize,
    pub sheet_rows_failed: usize,
}

#[derive(Deserialize)]
struct CreatedAck {
    product_id: u64,
    product_url: String,
}

/// Create the storefront product, then log one spreadsheet row per variant.
/// Spreadsheet failures are counted, never fatal.
pub async fn publish(
    upstream: &dyn Upstream,
    product: &ScrapedProduct,
    draft: &ListingDraft,
    images: &[String],
    settings: &ListingSettings,
) -> Result<PublishResponse, PublishError> {
    let started = Instant::now();
    let price = pricing::final_price(product.price, draft).ok_or(PublishError::MissingPrice)?;
    let title = draft.title.as_deref().unwrap_or_default();
    let payload = build_product_payload(
        product,
        ListingContent {
            title,
            description: draft.description.as_deref().unwrap_or_default(),
            price,
            images,
        },
        settings,
    )?;
    let variants = payload.variants.len();

    let product_value = serde_json::to_value(&payload)
        .map_err(|err| PublishError::InvalidResponse(err.to_string()))?;
    let response = upstream
        .forward(GatewayRequest::create_product(product_value))
        .await;
    if !response.is_success() {
        let body = response
            .parse_json::<Value>()
            .unwrap_or(Value::String(response.body.clone()));
        warn!(target = "vton.publish", status = response.status, "product creation rejected");
        return Err(PublishError::Rejected {
            status: response.status,
            body,
        });
    }
    let created: CreatedAck = response
        .parse_json()
        .map_err(|err| PublishError::InvalidResponse(err.to_string()))?;
    info!(
        target = "vton.publish",
        product_id = created.product_id,
        variants,
        "storefront product created"
    );

    let mut logged = 0;
    let mut failed = 0;
    for row in sheet_rows(&payload.title, product, &settings.sku_prefix) {
        let response = upstream.forward(GatewayRequest::sheets_row(row)).await;
        if response.is_success() {
            logged += 1;
        } else {
            failed += 1;
            warn!(
                target = "vton.publish",
                status = response.status,
                "spreadsheet row not logged"
            );
        }
    }
    crate::metrics::stage_elapsed("publish", started.elapsed().as_millis());

    Ok(PublishResponse {
        product_id: created.product_id,
        product_url: created.product_url,
        price,
        variants,
        sheet_rows_logged: logged,
        sheet_rows_failed: failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayAction, GatewayResponse};
    use crate::listing::models::SizeStock;
    use crate::testing::ScriptedUpstream;
    use serde_json::json;

    fn product() -> ScrapedProduct {
        ScrapedProduct {
            title: "raw".into(),
            price: 640.0,
            product_code: "GML7".into(),
            images: vec!["https://src/1.jpg".into()],
            sizes: vec![
                SizeStock {
                    size: "S".into(),
                    stock: 2,
                },
                SizeStock {
                    size: "M".into(),
                    stock: 5,
                },
            ],
        }
    }

    fn draft() -> ListingDraft {
        ListingDraft {
            title: Some("Saten Gömlek".into()),
            description: Some("Akşam için.".into()),
            multiplier: Some(2.5),
            custom_price: None,
        }
    }

    fn created() -> GatewayResponse {
        GatewayResponse::json(
            201,
            &json!({
                "success": true,
                "product_id": 77,
                "product_url": "https://store/admin/products/77"
            }),
        )
    }

    #[tokio::test]
    async fn creates_product_then_logs_each_variant() {
        let upstream = ScriptedUpstream::new(|request| match request.action() {
            GatewayAction::CreateProduct => created(),
            _ => GatewayResponse::json(200, &json!({"success": true})),
        });
        let images = vec!["https://cdn/out.png".to_string()];

        let response = publish(
            upstream.as_ref(),
            &product(),
            &draft(),
            &images,
            &ListingSettings::default(),
        )
        .await
        .expect("published");

        assert_eq!(response.product_id, 77);
        assert_eq!(response.price, 2500.0);
        assert_eq!(response.sheet_rows_logged, 2);
        let created = upstream.calls_for(GatewayAction::CreateProduct);
        let sent = created[0].product.as_ref().expect("product");
        assert_eq!(sent["variants"][1]["sku"], "PFT-GML7-M");
        assert_eq!(sent["variants"][1]["price"], "2500.00");
        let rows = upstream.calls_for(GatewayAction::GoogleSheetsLog);
        assert_eq!(
            rows[0].row_data,
            Some(vec![json!("Saten Gömlek"), json!("PFT-GML7-S"), json!(2)])
        );
    }

    #[tokio::test]
    async fn spreadsheet_failures_are_not_fatal() {
        let upstream = ScriptedUpstream::new(|request| match request.action() {
            GatewayAction::CreateProduct => created(),
            _ => GatewayResponse::error(500, "webhook not configured"),
        });

        let response = publish(
            upstream.as_ref(),
            &product(),
            &draft(),
            &["https://cdn/out.png".to_string()],
            &ListingSettings::default(),
        )
        .await
        .expect("published");

        assert_eq!(response.sheet_rows_logged, 0);
        assert_eq!(response.sheet_rows_failed, 2);
    }

    #[tokio::test]
    async fn rejection_carries_storefront_body() {
        let upstream = ScriptedUpstream::new(|_| {
            GatewayResponse::json(
                422,
                &json!({"error": true, "shopify_error": {"title": ["blank"]}}),
            )
        });

        let err = publish(
            upstream.as_ref(),
            &product(),
            &draft(),
            &["https://cdn/out.png".to_string()],
            &ListingSettings::default(),
        )
        .await
        .expect_err("rejected");

        match err {
            PublishError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body["shopify_error"]["title"][0], "blank");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(upstream.calls_for(GatewayAction::GoogleSheetsLog).is_empty());
    }

    #[tokio::test]
    async fn missing_price_stops_before_any_call() {
        let upstream = ScriptedUpstream::new(|_| created());
        let mut draft = draft();
        draft.multiplier = None;

        let err = publish(
            upstream.as_ref(),
            &product(),
            &draft,
            &["https://cdn/out.png".to_string()],
            &ListingSettings::default(),
        )
        .await
        .expect_err("no price");

        assert!(matches!(err, PublishError::MissingPrice));
        assert!(upstream.calls().is_empty());
    }
}
