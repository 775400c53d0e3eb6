// src/config.rs

use std::{env, sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        CatalogRepository, ContactRepository, CustomerRepository, MessageRepository,
        ReportRepository, SaleRepository, StockRepository, UserRepository,
    },
    services::{
        auth::AuthService,
        message_service::MessageService,
        sale_service::SaleService,
        sms::{HttpSmsGateway, SmsGateway},
        stock_service::StockService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub admin_password: String,

    // Repositórios (para os CRUDs simples chamados direto dos handlers)
    pub user_repo: UserRepository,
    pub contact_repo: ContactRepository,
    pub message_repo: MessageRepository,
    pub catalog_repo: CatalogRepository,
    pub customer_repo: CustomerRepository,
    pub stock_repo: StockRepository,
    pub sale_repo: SaleRepository,
    pub report_repo: ReportRepository,

    // Serviços (regras de negócio)
    pub auth_service: AuthService,
    pub message_service: MessageService,
    pub stock_service: StockService,
    pub sale_service: SaleService,
    pub sms_gateway: Arc<dyn SmsGateway>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");
        let admin_password =
            env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let contact_repo = ContactRepository::new(db_pool.clone());
        let message_repo = MessageRepository::new(db_pool.clone());
        let catalog_repo = CatalogRepository::new(db_pool.clone());
        let customer_repo = CustomerRepository::new(db_pool.clone());
        let stock_repo = StockRepository::new(db_pool.clone());
        let sale_repo = SaleRepository::new(db_pool.clone());
        let report_repo = ReportRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo.clone(), jwt_secret);
        let sms_gateway: Arc<dyn SmsGateway> =
            Arc::new(HttpSmsGateway::new(message_repo.clone()));
        let message_service = MessageService::new(
            message_repo.clone(),
            contact_repo.clone(),
            sms_gateway.clone(),
            db_pool.clone(),
        );
        let stock_service = StockService::new(
            stock_repo.clone(),
            catalog_repo.clone(),
            db_pool.clone(),
        );
        let sale_service = SaleService::new(
            sale_repo.clone(),
            stock_repo.clone(),
            catalog_repo.clone(),
            customer_repo.clone(),
            db_pool.clone(),
        );

        Ok(Self {
            db_pool,
            admin_password,
            user_repo,
            contact_repo,
            message_repo,
            catalog_repo,
            customer_repo,
            stock_repo,
            sale_repo,
            report_repo,
            auth_service,
            message_service,
            stock_service,
            sale_service,
            sms_gateway,
        })
    }
}
