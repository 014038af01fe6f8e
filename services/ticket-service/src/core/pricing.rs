// /party-tickets/services/ticket-service/src/core/pricing.rs

use crate::models::{SpaceDuration, SpaceQuote, TicketQuote};

pub const MIN_TICKETS: i32 = 1;
pub const MAX_TICKETS: i32 = 10;

/// Harga add-on space booking dalam KSh
pub const CATERING_PRICE: i64 = 200;
pub const DECORATION_PRICE: i64 = 150;
pub const TECH_SUPPORT_PRICE: i64 = 100;

/// Clamp quantity ke 1..=10
pub fn clamp_quantity(qty: i32) -> i32 {
    qty.clamp(MIN_TICKETS, MAX_TICKETS)
}

/// Total tiket, dibulatkan ke whole KSh
pub fn ticket_quote(unit_price: f64, qty: i32) -> TicketQuote {
    let unit_price = if unit_price.is_finite() { unit_price.max(0.0) } else { 0.0 };
    let qty = clamp_quantity(qty);

    TicketQuote {
        unit_price,
        qty,
        total: (unit_price * qty as f64).round() as i64,
    }
}

pub fn space_quote(
    full_day_price: f64,
    half_day_price: f64,
    duration: SpaceDuration,
    catering: bool,
    decoration: bool,
    tech_support: bool,
) -> SpaceQuote {
    let base = match duration {
        SpaceDuration::Full => full_day_price,
        SpaceDuration::Half => half_day_price,
    };
    let base_price = if base.is_finite() { base.max(0.0).round() as i64 } else { 0 };

    let additional_services = [
        (catering, CATERING_PRICE),
        (decoration, DECORATION_PRICE),
        (tech_support, TECH_SUPPORT_PRICE),
    ]
    .iter()
    .filter(|(selected, _)| *selected)
    .map(|(_, price)| price)
    .sum();

    SpaceQuote {
        duration,
        base_price,
        additional_services,
        total: base_price + additional_services,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_quote_clamps_quantity() {
        assert_eq!(ticket_quote(500.0, 0).qty, 1);
        assert_eq!(ticket_quote(500.0, 25).qty, 10);
        assert_eq!(ticket_quote(500.0, 25).total, 5000);
    }

    #[test]
    fn test_ticket_quote_rounds() {
        assert_eq!(ticket_quote(333.35, 3).total, 1000);
        assert_eq!(ticket_quote(-10.0, 2).total, 0);
    }

    #[test]
    fn test_space_quote() {
        let quote = space_quote(5000.0, 3000.0, SpaceDuration::Half, true, false, true);
        assert_eq!(quote.base_price, 3000);
        assert_eq!(quote.additional_services, 300);
        assert_eq!(quote.total, 3300);

        let quote = space_quote(5000.0, 3000.0, SpaceDuration::Full, true, true, true);
        assert_eq!(quote.total, 5450);
    }
}
