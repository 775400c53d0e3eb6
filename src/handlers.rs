pub mod auth;
pub mod catalog;
pub mod contacts;
pub mod messages;
pub mod reports;
pub mod sales;
pub mod stock;
