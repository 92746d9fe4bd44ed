use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::header,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analyzer::{self, MSG_INVALID_BODY};
use crate::api::models::{AnalyzeRequest, HealthResponse, RateLimitStatus};
use crate::api::response;
use crate::error::AppError;
use crate::rate_limit::{rate_limit_middleware, status_rate_limit_middleware};
use crate::AppState;

const INDEX_HTML: &str = include_str!("../../templates/index.html");
const SERVICE_WORKER_JS: &str = include_str!("../../static/sw.js");

pub fn create_router(app_state: AppState) -> Router {
    // Each throttled route has its own limiter
    let analyze = Router::new()
        .route("/analyze", post(analyze_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            rate_limit_middleware,
        ));

    let status = Router::new()
        .route("/rate-limit-status", get(rate_limit_status_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            status_rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        // Served from the root so its scope covers the whole app
        .route("/sw.js", get(service_worker_handler))
        .merge(analyze)
        .merge(status)
        .nest_service("/static", ServeDir::new(&app_state.config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn service_worker_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        SERVICE_WORKER_JS,
    )
}

async fn health_handler() -> impl IntoResponse {
    response::success(HealthResponse {
        status: "healthy",
        service: "Greek News Analyzer",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn rate_limit_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let limits: Vec<String> = state
        .rate_limiter
        .rules()
        .iter()
        .map(|rule| rule.to_string())
        .collect();

    let (status, message) = if limits.is_empty() {
        ("disabled", "Rate limiting is disabled.")
    } else {
        ("active", "Rate limiting is active. Check the Retry-After header when a request is rejected.")
    };

    response::success(RateLimitStatus { status, limits, message })
}

async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!("Rejected analysis body: {}", rejection);
            return AppError::BadRequest(MSG_INVALID_BODY.to_string()).into_response();
        }
    };

    let start_time = Instant::now();

    // Overall deadline for extraction plus generation
    let result = tokio::time::timeout(
        state.config.request_timeout,
        analyzer::analyze(&state, &req),
    )
    .await;

    let elapsed = start_time.elapsed();

    match result {
        Ok(Ok(analysis)) => {
            info!(
                text_length = analysis.text_length,
                source = %analysis.source,
                "Analysis completed in {:?}",
                elapsed
            );
            response::success(analysis).into_response()
        }
        Ok(Err(err)) => {
            if let AppError::BadRequest(msg) = &err {
                info!("Analysis request rejected: {}", msg);
            }
            err.into_response()
        }
        Err(_) => {
            AppError::Internal(format!("analysis timed out after {:?}", elapsed)).into_response()
        }
    }
}
