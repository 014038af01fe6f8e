// /party-tickets/services/ticket-service/src/middleware/mod.rs
pub mod security;
pub mod rate_limit;
