// src/db/sale_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::retail::{PaymentMethod, PaymentStatus, Sale, SaleItem, SalePayment},
};

#[derive(Clone)]
pub struct SaleRepository {
    pool: PgPool,
}

impl SaleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Vendas
    // ---

    pub async fn find_sale(&self, id: Uuid) -> Result<Option<Sale>, AppError> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    pub async fn list_sales(&self, session_id: Option<Uuid>) -> Result<Vec<Sale>, AppError> {
        let sales = match session_id {
            Some(session_id) => {
                sqlx::query_as::<_, Sale>(
                    "SELECT * FROM sales WHERE session_id = $1 ORDER BY sold_at DESC",
                )
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Sale>("SELECT * FROM sales ORDER BY sold_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(sales)
    }

    pub async fn items_of(&self, sale_id: Uuid) -> Result<Vec<SaleItem>, AppError> {
        let items =
            sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = $1")
                .bind(sale_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    // Próximo número sequencial do dia, via contador atômico. O UPSERT com
    // RETURNING é seguro sob escritas concorrentes, ao contrário do
    // COUNT(*) + 1.
    pub async fn next_sale_seq<'e, E>(&self, executor: E, day: NaiveDate) -> Result<i32, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (seq,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO sale_counters (day, next_seq)
            VALUES ($1, 1)
            ON CONFLICT (day) DO UPDATE SET next_seq = sale_counters.next_seq + 1
            RETURNING next_seq
            "#,
        )
        .bind(day)
        .fetch_one(executor)
        .await?;
        Ok(seq)
    }

    pub async fn insert_sale<'e, E>(
        &self,
        executor: E,
        session_id: Uuid,
        sale_number: &str,
        total_amount: Decimal,
        payment_method: PaymentMethod,
        customer_id: Option<Uuid>,
        sold_by: Uuid,
    ) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (session_id, sale_number, total_amount, payment_method, customer_id, sold_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(sale_number)
        .bind(total_amount)
        .bind(payment_method)
        .bind(customer_id)
        .bind(sold_by)
        .fetch_one(executor)
        .await?;
        Ok(sale)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        sale_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
        unit_price: Decimal,
        total_price: Decimal,
    ) -> Result<SaleItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, SaleItem>(
            r#"
            INSERT INTO sale_items (sale_id, product_id, quantity, unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(sale_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(total_price)
        .fetch_one(executor)
        .await?;
        Ok(item)
    }

    pub async fn set_payment_status<'e, E>(
        &self,
        executor: E,
        sale_id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE sales SET payment_status = $2 WHERE id = $1")
            .bind(sale_id)
            .bind(status)
            .execute(executor)
            .await?;
        Ok(())
    }

    // ---
    // Pagamentos
    // ---

    pub async fn find_payment_by_sale(
        &self,
        sale_id: Uuid,
    ) -> Result<Option<SalePayment>, AppError> {
        let payment =
            sqlx::query_as::<_, SalePayment>("SELECT * FROM sale_payments WHERE sale_id = $1")
                .bind(sale_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payment)
    }

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        sale_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        mpesa_reference: Option<&str>,
        received_by: Uuid,
    ) -> Result<SalePayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, SalePayment>(
            r#"
            INSERT INTO sale_payments (sale_id, amount, method, mpesa_reference, received_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(sale_id)
        .bind(amount)
        .bind(method)
        .bind(mpesa_reference)
        .bind(received_by)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            // A constraint UNIQUE em sale_id fecha a corrida entre a checagem
            // de duplicidade e o INSERT.
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::rule("Esta venda já possui um pagamento registrado.");
                }
            }
            e.into()
        })
    }
}
