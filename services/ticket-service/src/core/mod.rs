// /party-tickets/services/ticket-service/src/core/mod.rs

pub mod payment;
pub mod daraja;
pub mod pricing;

// Re-export untuk kemudahan akses
pub mod services {
    pub use super::payment::PaymentService;
    pub use super::daraja::{DarajaClient, DarajaConfig};
}
