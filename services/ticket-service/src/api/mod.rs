// /party-tickets/services/ticket-service/src/api/mod.rs
pub mod handlers;
pub mod routes;
