mod http;
pub mod metrics;
mod notifier;
mod storage;

// Re-export the factory functions for easy access
pub use http::{create_rest_api, RestApi};
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use notifier::{create_channel_notifier, create_log_notifier};
pub use storage::{create_file_storage, create_memory_storage};
