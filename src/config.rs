// src/config.rs

//! Client configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the storefront
//! client. Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used. This macro is appropriate for non-critical
/// tuning parameters where fallback behavior is acceptable.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated client configuration.
///
/// This is the single source of truth for startup configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: api::ApiConfig,
    pub sync: sync::SyncConfig,
    pub session: session::SessionConfig,
    pub catalog: catalog::CatalogConfig,
    pub metrics: MetricsKind,
}

/// Which metrics backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsKind {
    Noop,
    Prometheus,
}

impl AppConfig {
    /// Loads and validates all client configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    pub fn from_env() -> Result<Self> {
        // ---
        let metrics = match std::env::var("STOREFRONT_METRICS_TYPE").as_deref() {
            Ok("prom") => MetricsKind::Prometheus,
            _ => MetricsKind::Noop,
        };

        Ok(Self {
            api: api::ApiConfig::from_env()?,
            sync: sync::SyncConfig::from_env(),
            session: session::SessionConfig::from_env(),
            catalog: catalog::CatalogConfig::from_env(),
            metrics,
        })
    }
}

// ============================================================
// REST collaborator configuration
// ============================================================

mod api {
    // ---
    use super::*;

    #[derive(Debug, Clone)]
    pub struct ApiConfig {
        /// Base URL of the storefront REST API, without trailing path.
        pub base_url: String,

        /// Per-request timeout. Defaults to 10 seconds.
        pub request_timeout: Duration,
    }

    impl ApiConfig {
        /// Builds an [`ApiConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if `STOREFRONT_API_URL` is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let base_url = required_env!("STOREFRONT_API_URL");
            let timeout_secs = optional_env_parse!("STOREFRONT_API_TIMEOUT_SEC", u64, 10);

            Ok(Self {
                base_url,
                request_timeout: Duration::from_secs(timeout_secs),
            })
        }
    }
}
pub use api::ApiConfig;

// ============================================================
// Cart sync configuration
// ============================================================

mod sync {
    // ---
    use super::*;

    #[derive(Debug, Clone)]
    pub struct SyncConfig {
        /// Quiet period after the last cart mutation before the snapshot is
        /// written remotely. Defaults to 500 milliseconds.
        pub debounce: Duration,
    }

    impl Default for SyncConfig {
        fn default() -> Self {
            Self {
                debounce: Duration::from_millis(500),
            }
        }
    }

    impl SyncConfig {
        pub fn from_env() -> Self {
            // ---
            let debounce_ms = optional_env_parse!("STOREFRONT_SYNC_DEBOUNCE_MS", u64, 500);
            Self {
                debounce: Duration::from_millis(debounce_ms),
            }
        }
    }
}
pub use sync::SyncConfig;

// ============================================================
// Session configuration
// ============================================================

mod session {
    // ---
    use super::*;

    #[derive(Debug, Clone)]
    pub struct SessionConfig {
        /// Interval of the background expiry check. Defaults to 60 seconds.
        pub check_interval: Duration,

        /// Directory holding the long-lived storage file.
        pub storage_dir: PathBuf,
    }

    impl Default for SessionConfig {
        fn default() -> Self {
            Self {
                check_interval: Duration::from_secs(60),
                storage_dir: PathBuf::from(".storefront"),
            }
        }
    }

    impl SessionConfig {
        pub fn from_env() -> Self {
            // ---
            let check_secs = optional_env_parse!("STOREFRONT_SESSION_CHECK_SEC", u64, 60).max(1);
            let storage_dir = std::env::var("STOREFRONT_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".storefront"));

            Self {
                check_interval: Duration::from_secs(check_secs),
                storage_dir,
            }
        }

        /// Path of the long-lived storage file.
        pub fn storage_file(&self) -> PathBuf {
            self.storage_dir.join("local_storage.json")
        }
    }
}
pub use session::SessionConfig;

// ============================================================
// Catalog configuration
// ============================================================

mod catalog {
    // ---
    use super::*;

    #[derive(Debug, Clone)]
    pub struct CatalogConfig {
        /// Products per page of the infinite-scroll feed. Defaults to 20.
        pub page_size: u32,
    }

    impl Default for CatalogConfig {
        fn default() -> Self {
            Self { page_size: 20 }
        }
    }

    impl CatalogConfig {
        pub fn from_env() -> Self {
            // ---
            let page_size = optional_env_parse!("STOREFRONT_PAGE_SIZE", u32, 20).max(1);
            Self { page_size }
        }
    }
}
pub use catalog::CatalogConfig;

// ============================================================
// Tests
// ============================================================
