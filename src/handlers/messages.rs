// src/handlers/messages.rs

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
        rbac::{AdminOnly, ManagerUp, RequireRole},
    },
    models::messaging::{CreateMessagePayload, DeliveryReportPayload, UpsertSmsConfigPayload},
};

pub async fn list_messages(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let messages = app_state.message_repo.list_messages().await?;
    Ok((StatusCode::OK, Json(messages)))
}

pub async fn get_message(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state
        .message_repo
        .find_message(id)
        .await?
        .ok_or(AppError::NotFound("Mensagem"))?;
    let recipients = app_state.message_repo.recipients_of(id).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": message,
            "recipients": recipients,
        })),
    ))
}

pub async fn create_message(
    State(app_state): State<AppState>,
    AuthenticatedUser(current): AuthenticatedUser,
    Json(payload): Json<CreateMessagePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let message = app_state
        .message_service
        .create_message(payload, current.user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn send_message(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.message_service.send_message(id).await?;
    Ok((StatusCode::OK, Json(message)))
}

pub async fn resend_message(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.message_service.resend_message(id).await?;
    Ok((StatusCode::OK, Json(message)))
}

pub async fn cancel_message(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let message = app_state.message_service.cancel_message(id).await?;
    Ok((StatusCode::OK, Json(message)))
}

// Callback chamado pelo provedor; autenticado como as demais rotas.
pub async fn delivery_report(
    State(app_state): State<AppState>,
    Json(payload): Json<DeliveryReportPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .message_service
        .apply_delivery_report(&payload.provider_message_id, payload.delivered)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Configuração do provedor de SMS
// ---

pub async fn get_sms_config(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
) -> Result<impl IntoResponse, AppError> {
    let config = app_state
        .message_repo
        .active_provider_config()
        .await?
        .ok_or(AppError::NotFound("Configuração de SMS"))?;
    Ok((StatusCode::OK, Json(config)))
}

pub async fn upsert_sms_config(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<UpsertSmsConfigPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let config = app_state
        .message_repo
        .upsert_provider_config(
            &payload.provider,
            &payload.api_url,
            &payload.api_key,
            payload.sender_id.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn sms_balance(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerUp>,
) -> Result<impl IntoResponse, AppError> {
    let balance = app_state.sms_gateway.balance().await?;
    Ok((StatusCode::OK, Json(balance)))
}
