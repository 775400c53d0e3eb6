// src/services/sale_service.rs

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CatalogRepository, CustomerRepository, SaleRepository, StockRepository},
    models::retail::{
        CreatePaymentPayload, CreateSalePayload, CustomerType, PaymentMethod, PaymentStatus,
        SalePayment, SaleWithItems, SessionStatus,
    },
    services::stock_service::available_from_sums,
};

// Tolerância para comparação de valores monetários.
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

pub fn format_sale_number(year: i32, seq: i32) -> String {
    format!("SALE-{}-{:04}", year, seq)
}

// Regras de valor do pagamento: venda comum exige o valor exato (com
// tolerância de centavo); venda a crédito aceita até o total.
pub fn validate_payment_amount(
    sale_method: PaymentMethod,
    total: Decimal,
    amount: Decimal,
) -> Result<(), String> {
    if sale_method == PaymentMethod::Credit {
        if amount > total {
            return Err(format!(
                "O valor {} excede o total da venda ({}).",
                amount, total
            ));
        }
        return Ok(());
    }

    let diff = (amount - total).abs();
    if diff > AMOUNT_TOLERANCE {
        return Err(format!(
            "O valor {} difere do total da venda ({}).",
            amount, total
        ));
    }
    Ok(())
}

// Limite de crédito: saldo em aberto + nova venda não pode passar do teto.
pub fn within_credit_limit(outstanding: Decimal, new_total: Decimal, limit: Decimal) -> bool {
    outstanding + new_total <= limit
}

// Uma venda comporta exatamente um pagamento.
pub fn validate_single_payment(has_payment: bool) -> Result<(), String> {
    if has_payment {
        return Err("Esta venda já possui um pagamento registrado.".to_string());
    }
    Ok(())
}

// Pagamento MPESA sem referência não é conciliável depois.
pub fn validate_mpesa_reference(
    method: PaymentMethod,
    reference: Option<&str>,
) -> Result<(), String> {
    if method == PaymentMethod::Mpesa && reference.map_or(true, |r| r.trim().is_empty()) {
        return Err("Pagamento MPESA exige a referência.".to_string());
    }
    Ok(())
}

// Item já resolvido, pronto para gravação.
struct ResolvedItem {
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    total_price: Decimal,
}

#[derive(Clone)]
pub struct SaleService {
    sale_repo: SaleRepository,
    stock_repo: StockRepository,
    catalog_repo: CatalogRepository,
    customer_repo: CustomerRepository,
    pool: PgPool,
}

impl SaleService {
    pub fn new(
        sale_repo: SaleRepository,
        stock_repo: StockRepository,
        catalog_repo: CatalogRepository,
        customer_repo: CustomerRepository,
        pool: PgPool,
    ) -> Self {
        Self {
            sale_repo,
            stock_repo,
            catalog_repo,
            customer_repo,
            pool,
        }
    }

    // Criação da venda: resolve e valida todos os itens e só então grava
    // venda + itens na mesma transação. Qualquer item reprovado aborta tudo,
    // sem venda parcial.
    pub async fn create_sale(
        &self,
        payload: CreateSalePayload,
        sold_by: Uuid,
    ) -> Result<SaleWithItems, AppError> {
        let session = self
            .stock_repo
            .find_session(payload.session_id)
            .await?
            .ok_or(AppError::NotFound("Sessão"))?;

        if session.status != SessionStatus::Open {
            return Err(AppError::rule("A sessão de estoque não está aberta."));
        }

        // Leituras de catálogo e cliente ANTES de abrir a transação: segurar
        // uma conexão do pool enquanto outra é adquirida para as leituras
        // esgota o pool sob vendas concorrentes.
        let mut products = Vec::with_capacity(payload.items.len());
        for item in &payload.items {
            let product = self
                .catalog_repo
                .find_product(item.product_id)
                .await?
                .ok_or(AppError::NotFound("Produto"))?;

            if !product.is_active {
                return Err(AppError::rule(format!(
                    "O produto '{}' está inativo.",
                    product.name
                )));
            }
            products.push(product);
        }

        // Venda a crédito: exige cliente do tipo CREDIT.
        let credit_customer = if payload.payment_method == PaymentMethod::Credit {
            let customer_id = payload
                .customer_id
                .ok_or_else(|| AppError::rule("Venda a crédito exige um cliente."))?;

            let customer = self
                .customer_repo
                .find_customer(customer_id)
                .await?
                .ok_or(AppError::NotFound("Cliente"))?;

            if customer.customer_type != CustomerType::Credit {
                return Err(AppError::rule(
                    "O cliente informado não é um cliente de crédito.",
                ));
            }
            Some(customer)
        } else {
            None
        };

        let mut tx = self.pool.begin().await?;

        let mut resolved: Vec<ResolvedItem> = Vec::with_capacity(payload.items.len());
        let mut total_amount = Decimal::ZERO;

        for (item, product) in payload.items.iter().zip(&products) {
            let sums = self
                .stock_repo
                .stock_sums(&mut *tx, payload.session_id, item.product_id)
                .await?;
            let available = available_from_sums(&sums);

            if item.quantity > available {
                return Err(AppError::rule(format!(
                    "Estoque insuficiente de '{}': disponível {}, pedido {}.",
                    product.name, available, item.quantity
                )));
            }

            let unit_price = item.unit_price.unwrap_or(product.default_price);
            let total_price = item.quantity * unit_price;
            total_amount += total_price;

            resolved.push(ResolvedItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price,
                total_price,
            });
        }

        // Checagem do limite dentro da transação, sobre o saldo corrente.
        if let Some(customer) = &credit_customer {
            let limit = customer.credit_limit.unwrap_or(Decimal::ZERO);
            let outstanding = self
                .customer_repo
                .outstanding_balance(&mut *tx, customer.id)
                .await?;

            if !within_credit_limit(outstanding, total_amount, limit) {
                return Err(AppError::rule(format!(
                    "Limite de crédito excedido: em aberto {}, nova venda {}, limite {}.",
                    outstanding, total_amount, limit
                )));
            }
        }

        let today = Utc::now().date_naive();
        let seq = self.sale_repo.next_sale_seq(&mut *tx, today).await?;
        let sale_number = format_sale_number(today.year(), seq);

        let sale = self
            .sale_repo
            .insert_sale(
                &mut *tx,
                payload.session_id,
                &sale_number,
                total_amount,
                payload.payment_method,
                payload.customer_id,
                sold_by,
            )
            .await?;

        let mut items = Vec::with_capacity(resolved.len());
        for item in resolved {
            let saved = self
                .sale_repo
                .insert_item(
                    &mut *tx,
                    sale.id,
                    item.product_id,
                    item.quantity,
                    item.unit_price,
                    item.total_price,
                )
                .await?;
            items.push(saved);
        }

        tx.commit().await?;

        tracing::info!("🧾 Venda {} registrada ({} itens).", sale.sale_number, items.len());
        Ok(SaleWithItems { sale, items })
    }

    // Pagamento único por venda: inserção do pagamento e virada do status na
    // mesma transação.
    pub async fn record_payment(
        &self,
        sale_id: Uuid,
        payload: CreatePaymentPayload,
        received_by: Uuid,
    ) -> Result<SalePayment, AppError> {
        let sale = self
            .sale_repo
            .find_sale(sale_id)
            .await?
            .ok_or(AppError::NotFound("Venda"))?;

        let has_payment = self.sale_repo.find_payment_by_sale(sale_id).await?.is_some();
        validate_single_payment(has_payment).map_err(AppError::BusinessRule)?;

        validate_mpesa_reference(payload.method, payload.mpesa_reference.as_deref())
            .map_err(AppError::BusinessRule)?;

        validate_payment_amount(sale.payment_method, sale.total_amount, payload.amount)
            .map_err(AppError::BusinessRule)?;

        let mut tx = self.pool.begin().await?;

        let payment = self
            .sale_repo
            .insert_payment(
                &mut *tx,
                sale_id,
                payload.amount,
                payload.method,
                payload.mpesa_reference.as_deref(),
                received_by,
            )
            .await?;

        self.sale_repo
            .set_payment_status(&mut *tx, sale_id, PaymentStatus::Paid)
            .await?;

        tx.commit().await?;

        tracing::info!("💰 Pagamento registrado para a venda {}.", sale.sale_number);
        Ok(payment)
    }

    pub async fn sale_with_items(&self, sale_id: Uuid) -> Result<SaleWithItems, AppError> {
        let sale = self
            .sale_repo
            .find_sale(sale_id)
            .await?
            .ok_or(AppError::NotFound("Venda"))?;
        let items = self.sale_repo.items_of(sale_id).await?;
        Ok(SaleWithItems { sale, items })
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
    fn sale_number_is_zero_padded() {
        assert_eq!(format_sale_number(2024, 1), "SALE-2024-0001");
        assert_eq!(format_sale_number(2024, 42), "SALE-2024-0042");
        assert_eq!(format_sale_number(2025, 12345), "SALE-2025-12345");
    }

    #[test]
    fn item_totals_accumulate_exactly() {
        // totalAmount == Σ quantidade × preço unitário, sem resíduo de
        // ponto flutuante (Decimal).
        let items = [(dec(2.5), dec(120.0)), (dec(1.0), dec(35.5)), (dec(3.0), dec(9.99))];
        let total: Decimal = items.iter().map(|(q, p)| q * p).sum();
        assert_eq!(total, dec(365.47));
    }

    #[test]
    fn cash_payment_must_match_total_within_tolerance() {
        let total = dec(150.0);
        assert!(validate_payment_amount(PaymentMethod::Cash, total, dec(150.0)).is_ok());
        assert!(validate_payment_amount(PaymentMethod::Cash, total, dec(150.01)).is_ok());
        assert!(validate_payment_amount(PaymentMethod::Cash, total, dec(149.99)).is_ok());
        assert!(validate_payment_amount(PaymentMethod::Cash, total, dec(149.90)).is_err());
        assert!(validate_payment_amount(PaymentMethod::Mpesa, total, dec(160.0)).is_err());
    }

    #[test]
    fn credit_payment_may_not_exceed_total() {
        let total = dec(200.0);
        assert!(validate_payment_amount(PaymentMethod::Credit, total, dec(200.0)).is_ok());
        assert!(validate_payment_amount(PaymentMethod::Credit, total, dec(50.0)).is_ok());
        assert!(validate_payment_amount(PaymentMethod::Credit, total, dec(200.01)).is_err());
    }

    #[test]
    fn credit_limit_counts_outstanding_balance() {
        assert!(within_credit_limit(dec(300.0), dec(200.0), dec(500.0)));
        assert!(!within_credit_limit(dec(300.0), dec(200.01), dec(500.0)));
        assert!(within_credit_limit(Decimal::ZERO, dec(500.0), dec(500.0)));
    }

    #[test]
    fn second_payment_for_a_sale_is_rejected() {
        assert!(validate_single_payment(false).is_ok());
        assert!(validate_single_payment(true).is_err());
    }

    #[test]
    fn mpesa_payment_requires_a_reference() {
        assert!(validate_mpesa_reference(PaymentMethod::Mpesa, None).is_err());
        assert!(validate_mpesa_reference(PaymentMethod::Mpesa, Some("   ")).is_err());
        assert!(validate_mpesa_reference(PaymentMethod::Mpesa, Some("QFC1234XYZ")).is_ok());
        assert!(validate_mpesa_reference(PaymentMethod::Cash, None).is_ok());
        assert!(validate_mpesa_reference(PaymentMethod::Credit, None).is_ok());
    }
}
