// src/handlers/catalog.rs

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
    middleware::rbac::{ManagerUp, RequireRole},
    models::retail::{
        CreateCustomerPayload, CreateProductPayload, CreateSupplierPayload, CustomerType,
        UpdateProductPayload,
    },
};

// ---
// Produtos
// ---

pub async fn list_products(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let products = app_state.catalog_repo.list_products().await?;
    Ok((StatusCode::OK, Json(products)))
}

pub async fn create_product(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerUp>,
    Json(payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let product = app_state
        .catalog_repo
        .create_product(&payload.name, &payload.unit, payload.default_price)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerUp>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let product = app_state
        .catalog_repo
        .update_product(
            id,
            payload.name.as_deref(),
            payload.unit.as_deref(),
            payload.default_price,
            payload.is_active,
        )
        .await?
        .ok_or(AppError::NotFound("Produto"))?;
    Ok((StatusCode::OK, Json(product)))
}

// ---
// Fornecedores
// ---

pub async fn list_suppliers(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let suppliers = app_state.catalog_repo.list_suppliers().await?;
    Ok((StatusCode::OK, Json(suppliers)))
}

pub async fn create_supplier(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerUp>,
    Json(payload): Json<CreateSupplierPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let supplier = app_state
        .catalog_repo
        .create_supplier(&payload.name, payload.phone.as_deref(), payload.email.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

// ---
// Clientes
// ---

pub async fn list_customers(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let customers = app_state.customer_repo.list_customers().await?;
    Ok((StatusCode::OK, Json(customers)))
}

pub async fn create_customer(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateCustomerPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    // Cliente de crédito sem limite não faz sentido.
    if payload.customer_type == CustomerType::Credit && payload.credit_limit.is_none() {
        return Err(AppError::rule(
            "Cliente de crédito exige um limite de crédito.",
        ));
    }

    let customer = app_state
        .customer_repo
        .create_customer(
            &payload.name,
            payload.phone.as_deref(),
            payload.customer_type,
            payload.credit_limit,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn customer_balance(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let customer = app_state
        .customer_repo
        .find_customer(id)
        .await?
        .ok_or(AppError::NotFound("Cliente"))?;

    let mut conn = app_state.db_pool.acquire().await?;
    let balance = app_state
        .customer_repo
        .outstanding_balance(&mut *conn, id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "customerId": customer.id,
            "creditLimit": customer.credit_limit,
            "outstandingBalance": balance,
        })),
    ))
}
