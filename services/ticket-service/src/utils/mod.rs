// /party-tickets/services/ticket-service/src/utils/mod.rs
pub mod error;
pub mod validator;
pub mod logger;
pub mod cors;
pub mod scheduler;
pub mod banner;
pub mod health;
