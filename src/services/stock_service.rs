// src/services/stock_service.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{stock_repo::StockSums, CatalogRepository, StockRepository},
    models::retail::{
        CreateStockEntryPayload, SessionStatus, StockEntry, StockSession,
    },
};

// disponível = abertura + entradas − vendido − perdas. Lançamentos CLOSING
// são registro de contagem final e não entram na fórmula.
pub fn available_from_sums(sums: &StockSums) -> Decimal {
    sums.opening + sums.incoming - sums.sold - sums.wastage
}

// Fechamento: sessão fechada não reabre, e vendas não-crédito ainda PENDING
// seguram a sessão aberta.
pub fn validate_session_close(
    status: SessionStatus,
    blocking_sales: i64,
) -> Result<(), String> {
    if status == SessionStatus::Closed {
        return Err("A sessão já está fechada.".to_string());
    }
    if blocking_sales > 0 {
        return Err(format!(
            "A sessão possui {} venda(s) não-crédito com pagamento pendente.",
            blocking_sales
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct StockService {
    stock_repo: StockRepository,
    catalog_repo: CatalogRepository,
    pool: PgPool,
}

impl StockService {
    pub fn new(stock_repo: StockRepository, catalog_repo: CatalogRepository, pool: PgPool) -> Self {
        Self {
            stock_repo,
            catalog_repo,
            pool,
        }
    }

    pub async fn open_session(
        &self,
        date: NaiveDate,
        opened_by: Uuid,
        notes: Option<&str>,
    ) -> Result<StockSession, AppError> {
        // Checagem amigável antes do INSERT; o índice parcial único cobre a
        // corrida entre a leitura e a escrita.
        if self
            .stock_repo
            .find_open_session_for_date(date)
            .await?
            .is_some()
        {
            return Err(AppError::rule(format!(
                "Já existe uma sessão aberta para a data {}.",
                date
            )));
        }

        let session = self.stock_repo.open_session(date, opened_by, notes).await?;
        tracing::info!("📦 Sessão de estoque {} aberta para {}.", session.id, date);
        Ok(session)
    }

    // Fechamento é terminal. Vendas a crédito podem atravessar o fechamento
    // em aberto; as demais precisam estar pagas.
    pub async fn close_session(
        &self,
        session_id: Uuid,
        closed_by: Uuid,
    ) -> Result<StockSession, AppError> {
        let session = self
            .stock_repo
            .find_session(session_id)
            .await?
            .ok_or(AppError::NotFound("Sessão"))?;

        let blocking = self.stock_repo.count_blocking_sales(session_id).await?;
        validate_session_close(session.status, blocking).map_err(AppError::BusinessRule)?;

        let closed = self.stock_repo.close_session(session_id, closed_by).await?;
        tracing::info!("📦 Sessão de estoque {} fechada.", session_id);
        Ok(closed)
    }

    pub async fn create_entry(
        &self,
        payload: CreateStockEntryPayload,
        recorded_by: Uuid,
    ) -> Result<StockEntry, AppError> {
        let session = self
            .stock_repo
            .find_session(payload.session_id)
            .await?
            .ok_or(AppError::NotFound("Sessão"))?;

        if session.status != SessionStatus::Open {
            return Err(AppError::rule(
                "Lançamentos de estoque só são permitidos em sessão aberta.",
            ));
        }

        let product = self
            .catalog_repo
            .find_product(payload.product_id)
            .await?
            .ok_or(AppError::NotFound("Produto"))?;

        if let Some(supplier_id) = payload.supplier_id {
            self.catalog_repo
                .find_supplier(supplier_id)
                .await?
                .ok_or(AppError::NotFound("Fornecedor"))?;
        }

        self.stock_repo
            .create_entry(
                payload.session_id,
                payload.product_id,
                payload.supplier_id,
                payload.entry_type,
                payload.quantity,
                &product.unit,
                payload.notes.as_deref(),
                recorded_by,
            )
            .await
    }

    pub async fn available_stock(
        &self,
        session_id: Uuid,
        product_id: Uuid,
    ) -> Result<Decimal, AppError> {
        self.stock_repo
            .find_session(session_id)
            .await?
            .ok_or(AppError::NotFound("Sessão"))?;

        let mut conn = self.pool.acquire().await?;
        let sums = self
            .stock_repo
            .stock_sums(&mut *conn, session_id, product_id)
            .await?;
        Ok(available_from_sums(&sums))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn dec(v: f64) -> Decimal {
        Decimal::from_f64(v).unwrap()
    }

    #[test]
    fn availability_follows_opening_incoming_sold_wastage() {
        let sums = StockSums {
            opening: dec(50.0),
            incoming: dec(20.0),
            wastage: dec(5.0),
            sold: dec(30.0),
        };
        assert_eq!(available_from_sums(&sums), dec(35.0));
    }

    // Cenário do caderno: sessão abre com 50kg de carne, vende 10kg,
    // registra 5kg de perda.
    #[test]
    fn beef_session_scenario() {
        let mut sums = StockSums {
            opening: dec(50.0),
            incoming: Decimal::ZERO,
            wastage: Decimal::ZERO,
            sold: Decimal::ZERO,
        };
        assert_eq!(available_from_sums(&sums), dec(50.0));

        sums.sold = dec(10.0);
        assert_eq!(available_from_sums(&sums), dec(40.0));

        sums.wastage = dec(5.0);
        assert_eq!(available_from_sums(&sums), dec(35.0));
    }

    #[test]
    fn pending_non_credit_sale_blocks_session_close() {
        assert!(validate_session_close(SessionStatus::Open, 1).is_err());
        assert!(validate_session_close(SessionStatus::Open, 3).is_err());
        assert!(validate_session_close(SessionStatus::Open, 0).is_ok());
    }

    #[test]
    fn closed_session_cannot_be_closed_again() {
        assert!(validate_session_close(SessionStatus::Closed, 0).is_err());
    }

    #[test]
    fn availability_can_go_negative_on_overdraw() {
        // A função só soma; quem impede venda além do disponível é a
        // validação da venda.
        let sums = StockSums {
            opening: dec(5.0),
            incoming: Decimal::ZERO,
            wastage: Decimal::ZERO,
            sold: dec(8.0),
        };
        assert_eq!(available_from_sums(&sums), dec(-3.0));
    }
}
