// Adapters layer: concrete execution backends and session persistence.

pub mod local_backend;
pub mod remote_backend;
pub mod session_store;

use crate::config::toml_config::{BackendKind, TomlConfig};
use crate::core::ExecutionBackend;
use crate::utils::error::Result;
use local_backend::LocalBackend;
use remote_backend::RemoteBackend;
use std::sync::Arc;

/// Picks the execution backend once, at startup, from configuration.
pub fn build_backend(config: &TomlConfig) -> Result<Arc<dyn ExecutionBackend>> {
    match config.backend_kind()? {
        BackendKind::Local => {
            tracing::info!("🧮 Using local interpreter backend");
            Ok(Arc::new(LocalBackend::new(
                &config.callback,
                &config.local_engine,
            )))
        }
        BackendKind::Remote {
            runner_url,
            timeout,
        } => {
            tracing::info!("🌐 Using remote runner at {}", runner_url);
            Ok(Arc::new(RemoteBackend::new(runner_url, timeout)?))
        }
    }
}
