use once_cell::sync::Lazy;
use std::env;

pub static API_VERSION: Lazy<String> =
    Lazy::new(|| env::var("SHOPIFY_API_VERSION").unwrap_or_else(|_| "2024-01".to_string()));

pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
