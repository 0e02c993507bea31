mod rest_api;

pub use rest_api::RestApi;

use crate::config::ApiConfig;
use crate::domain::ApiPtr;
use std::sync::Arc;

/// Creates the reqwest-backed REST collaborator.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built.
pub fn create_rest_api(config: &ApiConfig) -> anyhow::Result<ApiPtr> {
    // ---
    Ok(Arc::new(RestApi::new(config)?))
}
