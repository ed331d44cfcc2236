use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use viva_core::error::CoreError;
use viva_core::followup::FollowUpRequest;
use viva_core::model::{Category, Difficulty};
use viva_core::service::{InterviewService, SubmitOutcome};
use viva_core::store::MemoryStore;

pub struct AppState {
    pub service: InterviewService<MemoryStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/interview/generate", post(generate))
        .route("/api/interview/followup", post(followup))
        .route("/api/interview/submit", post(submit))
        .route("/api/interview/{id}", get(get_session))
        .route("/api/interview/{id}/answer", post(record_answer))
        .with_state(state)
}

/// Maps the core taxonomy onto HTTP statuses. Only generation failures
/// and missing sessions surface as failures; everything else degraded to
/// a safe default before reaching this boundary.
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
            CoreError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidAnswer => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = %status, "request failed: {:#}", self.0);
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    user_id: String,
    role: String,
    difficulty: Difficulty,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    resume_text: Option<String>,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let generated = state
        .service
        .generate(
            &request.user_id,
            &request.role,
            request.difficulty,
            request.category.unwrap_or(Category::Technical),
            request.resume_text.as_deref(),
        )
        .await?;
    Ok(Json(generated))
}

async fn followup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FollowUpRequest>,
) -> impl IntoResponse {
    // Infallible by contract: a non-decision comes back as a 200 with
    // followUp: null.
    Json(state.service.followup(&request).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    user_id: String,
    session_id: Uuid,
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Response, ApiError> {
    let outcome = state
        .service
        .submit(&request.user_id, request.session_id)
        .await?;
    let response = match outcome {
        SubmitOutcome::Graded(feedback) => (StatusCode::OK, Json(feedback)).into_response(),
        SubmitOutcome::Processing => (
            StatusCode::ACCEPTED,
            Json(json!({"message": "processing"})),
        )
            .into_response(),
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    index: usize,
    answer: String,
}

async fn record_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .record_answer(id, request.index, &request.answer)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_session(id).await?))
}
