// src/handlers/reports.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    services::stock_service::available_from_sums,
};

#[derive(Debug, Deserialize)]
pub struct SalesReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// Vendas por dia no intervalo, com quebra por método de pagamento.
pub async fn sales_report(
    State(app_state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.from > query.to {
        return Err(AppError::rule("O intervalo do relatório está invertido."));
    }

    let rows = app_state.report_repo.daily_sales(query.from, query.to).await?;
    Ok((StatusCode::OK, Json(rows)))
}

// Resumo da sessão: por produto, os termos da fórmula de disponibilidade,
// mais os totais de venda.
pub async fn session_report(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state
        .stock_repo
        .find_session(session_id)
        .await?
        .ok_or(AppError::NotFound("Sessão"))?;

    let products = app_state.report_repo.session_products(session_id).await?;
    let (sales_count, sales_total) =
        app_state.report_repo.session_sales_total(session_id).await?;

    let product_rows: Vec<_> = products
        .into_iter()
        .map(|row| {
            let sums = crate::db::stock_repo::StockSums {
                opening: row.opening,
                incoming: row.incoming,
                wastage: row.wastage,
                sold: row.sold,
            };
            serde_json::json!({
                "productId": row.product_id,
                "productName": row.product_name,
                "opening": row.opening,
                "incoming": row.incoming,
                "wastage": row.wastage,
                "sold": row.sold,
                "available": available_from_sums(&sums),
            })
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "session": session,
            "products": product_rows,
            "salesCount": sales_count,
            "salesTotal": sales_total,
        })),
    ))
}

pub async fn dashboard(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();

    let (today_count, today_total) = app_state.report_repo.today_sales(today).await?;
    let counts = app_state.report_repo.dashboard_counts().await?;
    let outstanding_credit = app_state.report_repo.outstanding_credit_total().await?;
    let has_open_session = app_state.report_repo.has_open_session(today).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "today": {
                "salesCount": today_count,
                "salesTotal": today_total,
                "hasOpenSession": has_open_session,
            },
            "counts": counts,
            "outstandingCredit": outstanding_credit,
        })),
    ))
}
