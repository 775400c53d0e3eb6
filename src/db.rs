pub mod user_repo;
pub use user_repo::UserRepository;
pub mod contact_repo;
pub use contact_repo::ContactRepository;
pub mod message_repo;
pub use message_repo::MessageRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod customer_repo;
pub use customer_repo::CustomerRepository;
pub mod stock_repo;
pub use stock_repo::StockRepository;
pub mod sale_repo;
pub use sale_repo::SaleRepository;
pub mod report_repo;
pub use report_repo::ReportRepository;
