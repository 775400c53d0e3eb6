// src/handlers/sales.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{AnyStaff, RequireRole},
    },
    models::retail::{CreatePaymentPayload, CreateSalePayload},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSalesQuery {
    pub session_id: Option<Uuid>,
}

pub async fn list_sales(
    State(app_state): State<AppState>,
    Query(query): Query<ListSalesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sales = app_state.sale_repo.list_sales(query.session_id).await?;
    Ok((StatusCode::OK, Json(sales)))
}

pub async fn get_sale(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.sale_service.sale_with_items(id).await?;
    Ok((StatusCode::OK, Json(sale)))
}

pub async fn create_sale(
    State(app_state): State<AppState>,
    AuthenticatedUser(current): AuthenticatedUser,
    _guard: RequireRole<AnyStaff>,
    Json(payload): Json<CreateSalePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let sale = app_state
        .sale_service
        .create_sale(payload, current.user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn record_payment(
    State(app_state): State<AppState>,
    AuthenticatedUser(current): AuthenticatedUser,
    _guard: RequireRole<AnyStaff>,
    Path(sale_id): Path<Uuid>,
    Json(payload): Json<CreatePaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let payment = app_state
        .sale_service
        .record_payment(sale_id, payload, current.user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(app_state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payment = app_state
        .sale_repo
        .find_payment_by_sale(sale_id)
        .await?
        .ok_or(AppError::NotFound("Pagamento"))?;
    Ok((StatusCode::OK, Json(payment)))
}
