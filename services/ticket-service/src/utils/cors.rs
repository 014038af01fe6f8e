// /party-tickets/services/ticket-service/src/utils/cors.rs

use tower_http::cors::CorsLayer;
use axum::http::{header, Method, HeaderValue};
use std::env;

/// Setup CORS layer untuk ticket service
pub fn create_cors_layer() -> CorsLayer {
    match get_environment().as_str() {
        "production" => build_production_cors(),
        _ => build_development_cors(),
    }
}

/// Build CORS configuration untuk development environment
fn build_development_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_allowed_origins())
        .allow_methods(get_allowed_methods())
        .allow_headers(get_allowed_headers())
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build CORS configuration untuk production, hanya origin https
fn build_production_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_production_origins())
        .allow_methods(get_allowed_methods())
        .allow_headers(get_allowed_headers())
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(86400))
}

/// Parse origins dari environment variable
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:8080,http://localhost:3000".to_string());

    origins_str
        .split(',')
        .filter_map(|origin| {
            let trimmed = origin.trim();
            match trimmed.parse::<HeaderValue>() {
                Ok(header) => {
                    tracing::debug!("CORS origin registered: {}", trimmed);
                    Some(header)
                }
                Err(e) => {
                    tracing::warn!("Invalid origin format '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

/// Parse production origins dengan validasi lebih ketat
fn parse_production_origins() -> Vec<HeaderValue> {
    let prod_origins = env::var("PRODUCTION_ORIGINS")
        .or_else(|_| env::var("ALLOWED_ORIGINS"))
        .unwrap_or_default();

    prod_origins
        .split(',')
        .filter(|origin| origin.trim().starts_with("https://"))
        .filter_map(|origin| origin.trim().parse().ok())
        .collect()
}

/// Browser hanya butuh GET dan POST
fn get_allowed_methods() -> Vec<Method> {
    vec![Method::GET, Method::POST, Method::OPTIONS]
}

fn get_allowed_headers() -> Vec<header::HeaderName> {
    vec![
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::ACCEPT_LANGUAGE,
    ]
}

/// Ambil environment mode dari env variable
pub fn get_environment() -> String {
    env::var("ENVIRONMENT")
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_parse_origins() {
        env::set_var("ALLOWED_ORIGINS", "http://localhost:8080, http://localhost:3000");
        assert_eq!(parse_allowed_origins().len(), 2);
        env::remove_var("ALLOWED_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_production_origins_require_https() {
        env::set_var("PRODUCTION_ORIGINS", "https://tickets.example.com,http://insecure.example.com");
        assert_eq!(parse_production_origins().len(), 1);
        env::remove_var("PRODUCTION_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_environment_detection() {
        env::set_var("ENVIRONMENT", "Production");
        assert_eq!(get_environment(), "production");

        env::remove_var("ENVIRONMENT");
        assert_eq!(get_environment(), "development");
    }
}
