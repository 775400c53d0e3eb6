// src/handlers/stock.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{ManagerUp, RequireRole},
    },
    models::retail::{CreateStockEntryPayload, OpenSessionPayload},
};

// ---
// Sessões de estoque
// ---

pub async fn list_sessions(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = app_state.stock_repo.list_sessions().await?;
    Ok((StatusCode::OK, Json(sessions)))
}

pub async fn get_session(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .stock_repo
        .find_session(id)
        .await?
        .ok_or(AppError::NotFound("Sessão"))?;
    Ok((StatusCode::OK, Json(session)))
}

pub async fn open_session(
    State(app_state): State<AppState>,
    AuthenticatedUser(current): AuthenticatedUser,
    _guard: RequireRole<ManagerUp>,
    Json(payload): Json<OpenSessionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let session = app_state
        .stock_service
        .open_session(payload.session_date, current.user.id, payload.notes.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn close_session(
    State(app_state): State<AppState>,
    AuthenticatedUser(current): AuthenticatedUser,
    _guard: RequireRole<ManagerUp>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .stock_service
        .close_session(id, current.user.id)
        .await?;
    Ok((StatusCode::OK, Json(session)))
}

// ---
// Lançamentos
// ---

pub async fn list_entries(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .stock_repo
        .find_session(session_id)
        .await?
        .ok_or(AppError::NotFound("Sessão"))?;

    let entries = app_state.stock_repo.list_entries(session_id).await?;
    Ok((StatusCode::OK, Json(entries)))
}

pub async fn create_entry(
    State(app_state): State<AppState>,
    AuthenticatedUser(current): AuthenticatedUser,
    Json(payload): Json<CreateStockEntryPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let entry = app_state
        .stock_service
        .create_entry(payload, current.user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// Disponibilidade corrente de um produto na sessão.
pub async fn available_stock(
    State(app_state): State<AppState>,
    Path((session_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let available = app_state
        .stock_service
        .available_stock(session_id, product_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "sessionId": session_id,
            "productId": product_id,
            "available": available,
        })),
    ))
}
