// src/db/customer_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::retail::{Customer, CustomerType},
};

#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    pub async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn create_customer(
        &self,
        name: &str,
        phone: Option<&str>,
        customer_type: CustomerType,
        credit_limit: Option<Decimal>,
    ) -> Result<Customer, AppError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, phone, customer_type, credit_limit)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(customer_type)
        .bind(credit_limit)
        .fetch_one(&self.pool)
        .await?;
        Ok(customer)
    }

    // Saldo devedor: soma do total das vendas ainda PENDING do cliente.
    // Aceita um executor para poder rodar dentro da transação da venda.
    pub async fn outstanding_balance<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (balance,): (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_amount), 0)
            FROM sales
            WHERE customer_id = $1 AND payment_status = 'PENDING'
            "#,
        )
        .bind(customer_id)
        .fetch_one(executor)
        .await?;
        Ok(balance)
    }
}
