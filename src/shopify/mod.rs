pub mod config;
pub mod images;
pub mod products;

pub use products::{NewProduct, NewVariant, ProductImage, ProductOption};

/// Resolved storefront credentials for one gateway call.
#[derive(Clone)]
pub struct StoreCredentials {
    pub scheme: String,
    pub domain: String,
    pub token: String,
}

impl StoreCredentials {
    pub fn admin_url(&self, path: &str) -> String {
        format!(
            "{}://{}/admin/api/{}/{}",
            self.scheme,
            self.domain,
            config::API_VERSION.as_str(),
            path.trim_start_matches('/')
        )
    }
}
