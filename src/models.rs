pub mod auth;
pub mod messaging;
pub mod retail;
