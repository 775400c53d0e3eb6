// src/db/stock_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::retail::{StockEntry, StockEntryType, StockSession},
};

// Somatórios por produto/sessão, termos da fórmula de disponibilidade.
#[derive(Debug, Clone, Copy)]
pub struct StockSums {
    pub opening: Decimal,
    pub incoming: Decimal,
    pub wastage: Decimal,
    pub sold: Decimal,
}

#[derive(Clone)]
pub struct StockRepository {
    pool: PgPool,
}

impl StockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Sessões
    // ---

    pub async fn find_session(&self, id: Uuid) -> Result<Option<StockSession>, AppError> {
        let session =
            sqlx::query_as::<_, StockSession>("SELECT * FROM stock_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    pub async fn list_sessions(&self) -> Result<Vec<StockSession>, AppError> {
        let sessions = sqlx::query_as::<_, StockSession>(
            "SELECT * FROM stock_sessions ORDER BY session_date DESC, opened_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    pub async fn find_open_session_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<StockSession>, AppError> {
        let session = sqlx::query_as::<_, StockSession>(
            "SELECT * FROM stock_sessions WHERE session_date = $1 AND status = 'OPEN'",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn open_session(
        &self,
        date: NaiveDate,
        opened_by: Uuid,
        notes: Option<&str>,
    ) -> Result<StockSession, AppError> {
        sqlx::query_as::<_, StockSession>(
            r#"
            INSERT INTO stock_sessions (session_date, opened_by, notes)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(date)
        .bind(opened_by)
        .bind(notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // O índice parcial garante uma única sessão OPEN por data mesmo
            // sob criação concorrente.
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::rule(format!(
                        "Já existe uma sessão aberta para a data {}.",
                        date
                    ));
                }
            }
            e.into()
        })
    }

    pub async fn close_session(
        &self,
        id: Uuid,
        closed_by: Uuid,
    ) -> Result<StockSession, AppError> {
        let session = sqlx::query_as::<_, StockSession>(
            r#"
            UPDATE stock_sessions
            SET status = 'CLOSED', closed_by = $2, closed_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(closed_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    // Vendas não-crédito ainda PENDING na sessão: bloqueiam o fechamento.
    pub async fn count_blocking_sales(&self, session_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM sales
            WHERE session_id = $1
              AND payment_method <> 'CREDIT'
              AND payment_status = 'PENDING'
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ---
    // Lançamentos
    // ---

    pub async fn create_entry(
        &self,
        session_id: Uuid,
        product_id: Uuid,
        supplier_id: Option<Uuid>,
        entry_type: StockEntryType,
        quantity: Decimal,
        unit: &str,
        notes: Option<&str>,
        recorded_by: Uuid,
    ) -> Result<StockEntry, AppError> {
        let entry = sqlx::query_as::<_, StockEntry>(
            r#"
            INSERT INTO stock_entries
                (session_id, product_id, supplier_id, entry_type, quantity, unit, notes, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(product_id)
        .bind(supplier_id)
        .bind(entry_type)
        .bind(quantity)
        .bind(unit)
        .bind(notes)
        .bind(recorded_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    pub async fn list_entries(&self, session_id: Uuid) -> Result<Vec<StockEntry>, AppError> {
        let entries = sqlx::query_as::<_, StockEntry>(
            "SELECT * FROM stock_entries WHERE session_id = $1 ORDER BY recorded_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    // Somatórios de um produto na sessão. Recebe a conexão para que a
    // checagem de estoque da venda enxergue os itens já gravados na própria
    // transação.
    pub async fn stock_sums(
        &self,
        conn: &mut PgConnection,
        session_id: Uuid,
        product_id: Uuid,
    ) -> Result<StockSums, AppError> {
        let (opening, incoming, wastage): (Decimal, Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(quantity) FILTER (WHERE entry_type = 'OPENING'), 0),
                COALESCE(SUM(quantity) FILTER (WHERE entry_type = 'INCOMING'), 0),
                COALESCE(SUM(quantity) FILTER (WHERE entry_type = 'WASTAGE'), 0)
            FROM stock_entries
            WHERE session_id = $1 AND product_id = $2
            "#,
        )
        .bind(session_id)
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        let (sold,): (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(si.quantity), 0)
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            WHERE s.session_id = $1 AND si.product_id = $2
            "#,
        )
        .bind(session_id)
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(StockSums {
            opening,
            incoming,
            wastage,
            sold,
        })
    }
}
