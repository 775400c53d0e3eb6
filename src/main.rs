//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;
use crate::services::scheduler::MessageScheduler;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Bootstrap: garante o admin inicial em banco vazio.
    app_state
        .auth_service
        .ensure_default_admin(&app_state.db_pool, &app_state.admin_password)
        .await
        .expect("Falha ao criar o usuário admin inicial.");

    // Dispara a varredura periódica das mensagens agendadas.
    MessageScheduler::new(
        app_state.message_repo.clone(),
        app_state.message_service.clone(),
    )
    .spawn();

    // Rotas de autenticação (públicas)
    let auth_routes = Router::new().route("/login", post(handlers::auth::login));

    // Administração de usuários e papéis
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/",
            get(handlers::auth::list_users).post(handlers::auth::create_user),
        );

    let role_routes = Router::new().route("/", get(handlers::auth::list_roles));

    // Contatos e grupos
    let contact_routes = Router::new()
        .route(
            "/",
            get(handlers::contacts::list_contacts).post(handlers::contacts::create_contact),
        )
        .route("/{id}", delete(handlers::contacts::delete_contact));

    let group_routes = Router::new()
        .route(
            "/",
            get(handlers::contacts::list_groups).post(handlers::contacts::create_group),
        )
        .route("/{id}/contacts", get(handlers::contacts::group_contacts))
        .route(
            "/{group_id}/contacts/{contact_id}",
            post(handlers::contacts::add_group_contact)
                .delete(handlers::contacts::remove_group_contact),
        );

    // Mensagens e provedor de SMS
    let message_routes = Router::new()
        .route(
            "/",
            get(handlers::messages::list_messages).post(handlers::messages::create_message),
        )
        .route("/{id}", get(handlers::messages::get_message))
        .route("/{id}/send", post(handlers::messages::send_message))
        .route("/{id}/resend", post(handlers::messages::resend_message))
        .route("/{id}/cancel", post(handlers::messages::cancel_message))
        .route("/delivery-report", post(handlers::messages::delivery_report));

    let sms_config_routes = Router::new()
        .route(
            "/",
            get(handlers::messages::get_sms_config).put(handlers::messages::upsert_sms_config),
        )
        .route("/balance", get(handlers::messages::sms_balance));

    // Catálogo e clientes
    let product_routes = Router::new()
        .route(
            "/",
            get(handlers::catalog::list_products).post(handlers::catalog::create_product),
        )
        .route("/{id}", put(handlers::catalog::update_product));

    let supplier_routes = Router::new().route(
        "/",
        get(handlers::catalog::list_suppliers).post(handlers::catalog::create_supplier),
    );

    let customer_routes = Router::new()
        .route(
            "/",
            get(handlers::catalog::list_customers).post(handlers::catalog::create_customer),
        )
        .route("/{id}/balance", get(handlers::catalog::customer_balance));

    // Sessões de estoque e lançamentos
    let session_routes = Router::new()
        .route(
            "/",
            get(handlers::stock::list_sessions).post(handlers::stock::open_session),
        )
        .route("/{id}", get(handlers::stock::get_session))
        .route("/{id}/close", post(handlers::stock::close_session))
        .route("/{id}/entries", get(handlers::stock::list_entries))
        .route("/{id}/report", get(handlers::reports::session_report))
        .route(
            "/{session_id}/stock/{product_id}",
            get(handlers::stock::available_stock),
        );

    let entry_routes = Router::new().route("/", post(handlers::stock::create_entry));

    // Vendas e pagamentos
    let sale_routes = Router::new()
        .route(
            "/",
            get(handlers::sales::list_sales).post(handlers::sales::create_sale),
        )
        .route("/{id}", get(handlers::sales::get_sale))
        .route(
            "/{id}/payment",
            get(handlers::sales::get_payment).post(handlers::sales::record_payment),
        );

    // Relatórios
    let report_routes = Router::new().route("/sales", get(handlers::reports::sales_report));

    // Tudo que não é login exige token.
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/roles", role_routes)
        .nest("/api/contacts", contact_routes)
        .nest("/api/groups", group_routes)
        .nest("/api/messages", message_routes)
        .nest("/api/sms-provider", sms_config_routes)
        .nest("/api/products", product_routes)
        .nest("/api/suppliers", supplier_routes)
        .nest("/api/customers", customer_routes)
        .nest("/api/stock-sessions", session_routes)
        .nest("/api/stock-entries", entry_routes)
        .nest("/api/sales", sale_routes)
        .nest("/api/reports", report_routes)
        .route("/api/dashboard", get(handlers::reports::dashboard))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .with_state(app_state);

    // Inicia o servidor
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
