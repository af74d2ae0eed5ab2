use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rhythmix_flow::FlowError;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::controller::SessionController;
use crate::models::{
    PredictAttributesParams, PredictAttributesResponse, SongRecommenderParams,
    SongRecommenderResponse,
};

const CORRELATION_HEADER: &str = "x-correlation-id";

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Engine errors as HTTP responses
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] FlowError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            FlowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FlowError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            FlowError::SessionBusy(_) => StatusCode::CONFLICT,
            FlowError::StepExecution { .. } | FlowError::TaskExecutionFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self.0);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub controller: SessionController,
}

pub fn build_router(app_state: AppState) -> Router {
    let model_routes = Router::new()
        .route("/version", get(version))
        .route("/predict-attributes", post(predict_attributes))
        .route("/song-recommender", post(song_recommender));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/model", model_routes)
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tags every request with a correlation ID and runs it inside a span carrying it
async fn correlation_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = header.clone() {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn predict_attributes(
    State(state): State<AppState>,
    Query(params): Query<PredictAttributesParams>,
) -> ApiResult<PredictAttributesResponse> {
    info!(prompt = %params.prompt, "Predicting song attributes");

    let created = state.controller.create_session(&params.prompt).await?;
    Ok(Json(PredictAttributesResponse {
        session_id: created.session_id,
        data: created.paused_state,
    }))
}

async fn song_recommender(
    State(state): State<AppState>,
    Query(params): Query<SongRecommenderParams>,
    body: Bytes,
) -> ApiResult<SongRecommenderResponse> {
    info!(session_id = %params.session_id, "Resuming song recommendation");

    // An absent body means "no changes"
    let correction = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| FlowError::Validation(format!("request body is not JSON: {}", e)))?
    };

    let completed = state
        .controller
        .resume_session(&params.session_id, correction)
        .await?;
    Ok(Json(SongRecommenderResponse {
        similar_songs: completed.similar_songs,
        attributes: completed.final_attributes,
        llm_response: completed.llm_response,
    }))
}
