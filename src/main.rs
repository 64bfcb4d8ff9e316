mod config;
mod gateway;
mod http;
mod idempotency;
mod jobs;
mod listing;
mod llm;
mod metrics;
mod models;
mod session;
mod shopify;
#[cfg(test)]
mod testing;
mod vton;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use config::VtonSettings;
use gateway::{Gateway, GatewayRequest, Upstream};
use idempotency::IdempotencyStore;
use jobs::{DrainQueue, JobInfo};
use listing::{
    CopyError, ListingDraft, ListingPatch, PublishError, PublishResponse, ScrapedProduct,
    copy::MAX_TITLE_CHARS, pricing,
};
use llm::VisionClient;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{
    ApiError, CopyRequest, CopyResponse, EnqueueResponse, PricingResponse, PublishRequest,
};
use serde_json::json;
use session::{NewPair, Pair, PairError, PairId, Session, SessionStore, SharedSession};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;
use vton::ModeOrchestrator;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "vton.api", "server crashed: {err:#}");
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = Arc::new(VtonSettings::load()?);
    let upstream: Arc<dyn Upstream> = Arc::new(Gateway::from_env(&settings.generation));
    let orchestrator = Arc::new(ModeOrchestrator::new(upstream.clone(), &settings));
    let (drains, _worker) = DrainQueue::spawn(orchestrator);
    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(target = "vton.api", error = %err, "prometheus recorder unavailable");
            None
        }
    };

    let state = AppState {
        upstream,
        sessions: SessionStore::default(),
        drains,
        idempotency: IdempotencyStore::from_env(),
        settings,
        prometheus,
    };
    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "vton.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    upstream: Arc<dyn Upstream>,
    sessions: SessionStore,
    drains: DrainQueue,
    idempotency: IdempotencyStore,
    settings: Arc<VtonSettings>,
    prometheus: Option<PrometheusHandle>,
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let sessions = Router::new()
        .route("/{id}", get(get_session).delete(reset_session))
        .route("/{id}/product", put(set_product))
        .route("/{id}/pairs", post(add_pair))
        .route("/{id}/pairs/{pair_id}", delete(remove_pair))
        .route("/{id}/drain", post(enqueue_drain))
        .route("/{id}/copy", post(generate_copy))
        .route("/{id}/listing", put(update_listing))
        .route("/{id}/pricing", get(get_pricing))
        .route("/{id}/publish", post(publish_listing));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/proxy", post(proxy))
        .route("/sessions", post(create_session))
        .nest("/sessions", sessions)
        .route("/jobs/{id}", get(get_job_status))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()))
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "vton-api-rs",
    }))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    let body = state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// Relay one tagged request to its third party.
///
/// - Method: `POST`
/// - Path: `/proxy`
/// - Body: `GatewayRequest`; `action` defaults to `upload_image`
/// - Response: the upstream status and body, untouched
async fn proxy(
    State(state): State<AppState>,
    payload: Result<Json<GatewayRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    crate::metrics::inc_requests("/proxy");
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    Ok(state.upstream.forward(request).await.into_response())
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<Session>) {
    crate::metrics::inc_requests("/sessions");
    let shared = state.sessions.create().await;
    let snapshot = shared.lock().await.clone();
    info!(target = "vton.api", session_id = %snapshot.id, "session created");
    (StatusCode::CREATED, Json(snapshot))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}");
    let shared = lookup(&state, id).await?;
    let snapshot = shared.lock().await.clone();
    Ok(Json(snapshot))
}

/// Clear product, pairs and listing draft. Refused while a drain for the
/// session is queued or running.
async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}");
    let shared = lookup(&state, id).await?;
    let mut session = shared.lock().await;
    if state.drains.is_active(id).await {
        return Err(AppError::Conflict(
            "a drain is queued or running for this session".into(),
        ));
    }
    session.reset();
    info!(target = "vton.api", session_id = %id, "session reset");
    Ok(Json(session.clone()))
}

async fn set_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(product): Json<ScrapedProduct>,
) -> Result<Json<Session>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}/product");
    if product.title.trim().is_empty() {
        return Err(AppError::BadRequest("product title is empty".into()));
    }
    if !product.price.is_finite() || product.price < 0.0 {
        return Err(AppError::BadRequest(format!(
            "invalid source price {}",
            product.price
        )));
    }
    let shared = lookup(&state, id).await?;
    let mut session = shared.lock().await;
    session.product = Some(product);
    Ok(Json(session.clone()))
}

async fn add_pair(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(new): Json<NewPair>,
) -> Result<(StatusCode, Json<Pair>), AppError> {
    crate::metrics::inc_requests("/sessions/{id}/pairs");
    let shared = lookup(&state, id).await?;
    let mut session = shared.lock().await;
    let pair = session.pairs.add(new)?.clone();
    info!(
        target = "vton.api",
        session_id = %id,
        pair_id = pair.id,
        mode = pair.mode.as_str(),
        "pair queued"
    );
    Ok((StatusCode::CREATED, Json(pair)))
}

async fn remove_pair(
    State(state): State<AppState>,
    Path((id, pair_id)): Path<(Uuid, PairId)>,
) -> Result<Json<Pair>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}/pairs/{pair_id}");
    let shared = lookup(&state, id).await?;
    let removed = shared.lock().await.pairs.remove(pair_id)?;
    Ok(Json(removed))
}

/// Queue a drain of every unfinished pair in the session.
///
/// - Method: `POST`
/// - Path: `/sessions/{id}/drain`
/// - Response: `{ job_id }`; poll `GET /jobs/{job_id}` for the summary
async fn enqueue_drain(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnqueueResponse>), AppError> {
    crate::metrics::inc_requests("/sessions/{id}/drain");
    let shared = lookup(&state, id).await?;
    let job_id = state
        .drains
        .enqueue(id, shared)
        .await
        .map_err(AppError::Queue)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_id: job_id.to_string(),
        }),
    ))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobInfo>, AppError> {
    crate::metrics::inc_requests("/jobs/{id}");
    let Ok(uuid) = Uuid::parse_str(&id) else {
        return Err(AppError::BadRequest("invalid_job_id".into()));
    };
    state
        .drains
        .get(uuid)
        .await
        .map(Json)
        .ok_or(AppError::NotFound(format!("job {id}")))
}

/// Generate an SEO title and description from one product image and store
/// them on the listing draft.
async fn generate_copy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CopyRequest>,
) -> Result<Json<CopyResponse>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}/copy");
    let image_url = request.image_url.trim();
    if image_url.is_empty() {
        return Err(AppError::BadRequest("image_url is required".into()));
    }
    let shared = lookup(&state, id).await?;
    let raw_title = {
        let session = shared.lock().await;
        session
            .product_title()
            .map(str::to_string)
            .ok_or(AppError::BadRequest("set the scraped product first".into()))?
    };

    let client = VisionClient::new(state.upstream.clone());
    let copy = listing::generate_copy(
        &client,
        &state.settings.listing.copy_model,
        state.settings.vision.max_tokens,
        image_url,
        &raw_title,
    )
    .await?;

    shared.lock().await.listing.apply(ListingPatch {
        title: Some(copy.seo_title.clone()),
        description: Some(copy.seo_description.clone()),
        ..ListingPatch::default()
    });
    let title_chars = copy.seo_title.chars().count();
    Ok(Json(CopyResponse {
        copy,
        title_chars,
        title_too_long: title_chars > MAX_TITLE_CHARS,
    }))
}

async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ListingPatch>,
) -> Result<Json<ListingDraft>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}/listing");
    if let Some(multiplier) = patch.multiplier
        && !pricing::is_offered(multiplier)
    {
        return Err(AppError::BadRequest(format!(
            "multiplier {multiplier} is not offered; pick one of {:?}",
            pricing::MULTIPLIERS
        )));
    }
    let shared = lookup(&state, id).await?;
    let mut session = shared.lock().await;
    session.listing.apply(patch);
    Ok(Json(session.listing.clone()))
}

async fn get_pricing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PricingResponse>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}/pricing");
    let shared = lookup(&state, id).await?;
    let session = shared.lock().await;
    let source_price = session
        .product
        .as_ref()
        .map(|p| p.price)
        .ok_or(AppError::BadRequest("set the scraped product first".into()))?;
    Ok(Json(PricingResponse {
        source_price,
        options: pricing::options(source_price),
        final_price: pricing::final_price(source_price, &session.listing),
    }))
}

/// Create the storefront product and log its variants.
///
/// - Method: `POST`
/// - Path: `/sessions/{id}/publish`
/// - Body (optional): `{ images }` in listing order
/// - Header (optional): `Idempotency-Key` replays an earlier result
async fn publish_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<PublishRequest>>,
) -> Result<Json<PublishResponse>, AppError> {
    crate::metrics::inc_requests("/sessions/{id}/publish");
    let key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if let Some(key) = &key
        && let Some(existing) = state.idempotency.get(key).await
    {
        info!(target = "vton.publish", "publish replayed from idempotency key");
        return Ok(Json(existing));
    }

    let shared = lookup(&state, id).await?;
    let (product, draft, images) = {
        let session = shared.lock().await;
        let product = session
            .product
            .clone()
            .ok_or(AppError::BadRequest("set the scraped product first".into()))?;
        let images = body
            .and_then(|Json(request)| request.images)
            .unwrap_or_else(|| session.default_listing_images());
        (product, session.listing.clone(), images)
    };

    let response = listing::publish(
        state.upstream.as_ref(),
        &product,
        &draft,
        &images,
        &state.settings.listing,
    )
    .await?;
    if let Some(key) = key {
        state.idempotency.put(key, &response).await;
    }
    Ok(Json(response))
}

async fn lookup(state: &AppState, id: Uuid) -> Result<SharedSession, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(AppError::NotFound(format!("session {id}")))
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Pair(#[from] PairError),
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("{}", .0.error)]
    Queue(ApiError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Pair(PairError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Pair(PairError::Processing(_)) => StatusCode::CONFLICT,
            AppError::Pair(_) => StatusCode::BAD_REQUEST,
            AppError::Copy(_) => StatusCode::BAD_GATEWAY,
            AppError::Publish(PublishError::MissingPrice | PublishError::Transform(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Publish(_) => StatusCode::BAD_GATEWAY,
            AppError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) | AppError::Pair(PairError::Processing(_)) => "conflict",
            AppError::Pair(PairError::NotFound(_)) => "not_found",
            AppError::Pair(_) => "invalid_pair",
            AppError::Copy(_) => "copy_failed",
            AppError::Publish(PublishError::MissingPrice | PublishError::Transform(_)) => {
                "invalid_listing"
            }
            AppError::Publish(_) => "publish_failed",
            AppError::Queue(_) => "queue_unavailable",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(target = "vton.api", status = status.as_u16(), error = %self, "request failed");
        }
        let detail = match &self {
            AppError::Queue(err) => err.detail.clone(),
            AppError::Publish(PublishError::Rejected { body, .. }) => {
                Some(format!("{self}: {body}"))
            }
            other => Some(other.to_string()),
        };
        let payload = ApiError {
            error: self.code().to_string(),
            detail,
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
