// src/db/report_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use serde::Serialize;
use uuid::Uuid;

use crate::common::error::AppError;

// Linha do relatório de vendas por dia.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesRow {
    pub day: NaiveDate,
    pub sales_count: i64,
    pub total: Decimal,
    pub cash_total: Decimal,
    pub mpesa_total: Decimal,
    pub credit_total: Decimal,
}

// Linha do relatório de sessão: somatórios de um produto movimentado.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SessionProductRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub opening: Decimal,
    pub incoming: Decimal,
    pub wastage: Decimal,
    pub sold: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub products: i64,
    pub contacts: i64,
    pub customers: i64,
    pub pending_messages: i64,
    pub scheduled_messages: i64,
}

#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn daily_sales(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySalesRow>, AppError> {
        let rows = sqlx::query_as::<_, DailySalesRow>(
            r#"
            SELECT
                (sold_at AT TIME ZONE 'UTC')::date AS day,
                COUNT(*) AS sales_count,
                COALESCE(SUM(total_amount), 0) AS total,
                COALESCE(SUM(total_amount) FILTER (WHERE payment_method = 'CASH'), 0) AS cash_total,
                COALESCE(SUM(total_amount) FILTER (WHERE payment_method = 'MPESA'), 0) AS mpesa_total,
                COALESCE(SUM(total_amount) FILTER (WHERE payment_method = 'CREDIT'), 0) AS credit_total
            FROM sales
            WHERE (sold_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // Todos os produtos movimentados na sessão, por lançamento ou por venda.
    pub async fn session_products(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<SessionProductRow>, AppError> {
        let rows = sqlx::query_as::<_, SessionProductRow>(
            r#"
            SELECT
                p.id AS product_id,
                p.name AS product_name,
                COALESCE(SUM(se.quantity) FILTER (WHERE se.entry_type = 'OPENING'), 0) AS opening,
                COALESCE(SUM(se.quantity) FILTER (WHERE se.entry_type = 'INCOMING'), 0) AS incoming,
                COALESCE(SUM(se.quantity) FILTER (WHERE se.entry_type = 'WASTAGE'), 0) AS wastage,
                COALESCE((
                    SELECT SUM(si.quantity)
                    FROM sale_items si
                    JOIN sales s ON s.id = si.sale_id
                    WHERE s.session_id = $1 AND si.product_id = p.id
                ), 0) AS sold
            FROM products p
            JOIN stock_entries se ON se.product_id = p.id AND se.session_id = $1
            GROUP BY p.id, p.name
            ORDER BY p.name ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn session_sales_total(&self, session_id: Uuid) -> Result<(i64, Decimal), AppError> {
        let totals: (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_amount), 0) FROM sales WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    pub async fn today_sales(&self, day: NaiveDate) -> Result<(i64, Decimal), AppError> {
        let totals: (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(total_amount), 0)
            FROM sales
            WHERE (sold_at AT TIME ZONE 'UTC')::date = $1
            "#,
        )
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    pub async fn dashboard_counts(&self) -> Result<DashboardCounts, AppError> {
        let counts = sqlx::query_as::<_, DashboardCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products WHERE is_active) AS products,
                (SELECT COUNT(*) FROM contacts) AS contacts,
                (SELECT COUNT(*) FROM customers) AS customers,
                (SELECT COUNT(*) FROM messages WHERE status = 'PENDING') AS pending_messages,
                (SELECT COUNT(*) FROM messages WHERE status = 'SCHEDULED') AS scheduled_messages
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    // Crédito em aberto: total das vendas a crédito ainda PENDING.
    pub async fn outstanding_credit_total(&self) -> Result<Decimal, AppError> {
        let (total,): (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_amount), 0)
            FROM sales
            WHERE payment_method = 'CREDIT' AND payment_status = 'PENDING'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    pub async fn has_open_session(&self, day: NaiveDate) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM stock_sessions WHERE session_date = $1 AND status = 'OPEN')",
        )
        .bind(day)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
