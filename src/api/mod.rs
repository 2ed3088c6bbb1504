use axum::Json;
use axum::extract::Query;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::services::auth_service;
use crate::state::AppState;

#[derive(Deserialize)]
struct PlanListParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct PlanIdParams {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

#[derive(Serialize)]
struct AuthResponse {
    message: String,
    user: UserSummary,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth", post(auth))
        .route("/chat", post(chat))
        .route(
            "/study-plans",
            get(list_plans)
                .post(create_plan)
                .put(update_plan)
                .delete(delete_plan),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn auth(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let mode = req.mode.clone();
    match mode.as_str() {
        "signup" => {
            let user = auth_service::signup(&state.db, req).await?;
            Ok(Json(AuthResponse {
                message: "User created successfully".to_string(),
                user,
            }))
        }
        "login" => {
            let user = auth_service::login(&state.db, req).await?;
            Ok(Json(AuthResponse {
                message: "Login successful".to_string(),
                user,
            }))
        }
        other => Err(AppError::BadRequest(format!("Unknown auth mode: {}", other))),
    }
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.message.is_empty() {
        return Err(AppError::BadRequest("No message provided".to_string()));
    }

    // Checked before any network call so a missing key fails fast.
    let gemini = state
        .gemini
        .as_ref()
        .ok_or_else(|| AppError::Upstream("Gemini API key is not configured".to_string()))?;

    let response = gemini.generate(&req.message).await?;
    Ok(Json(ChatResponse { response }))
}

async fn list_plans(
    State(state): State<AppState>,
    Query(params): Query<PlanListParams>,
) -> Result<Json<Vec<StudyPlan>>, AppError> {
    let user_id = params
        .user_id
        .ok_or_else(|| AppError::BadRequest("User ID is required".to_string()))?;
    let plans = repository::fetch_plans_for_user(&state.db, &user_id).await?;
    Ok(Json(plans))
}

async fn create_plan(
    State(state): State<AppState>,
    Json(req): Json<NewPlanRequest>,
) -> Result<(StatusCode, Json<StudyPlan>), AppError> {
    let plan = repository::insert_plan(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn update_plan(
    State(state): State<AppState>,
    Query(params): Query<PlanIdParams>,
    Json(req): Json<UpdatePlanRequest>,
) -> Result<Json<StudyPlan>, AppError> {
    let id = params
        .id
        .ok_or_else(|| AppError::BadRequest("Study plan ID is required".to_string()))?;
    let plan = repository::update_plan(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(plan))
}

async fn delete_plan(
    State(state): State<AppState>,
    Query(params): Query<PlanIdParams>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = params
        .id
        .ok_or_else(|| AppError::BadRequest("Study plan ID is required".to_string()))?;
    let deleted = repository::delete_plan(&state.db, &id).await?;
    if deleted {
        Ok(Json(MessageResponse {
            message: "Study plan deleted successfully".to_string(),
        }))
    } else {
        Err(AppError::NotFound)
    }
}
