pub mod auth;
pub mod message_service;
pub mod sale_service;
pub mod scheduler;
pub mod sms;
pub mod stock_service;
