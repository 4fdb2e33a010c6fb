pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command, LogFormat};

pub use adapters::local_backend::LocalBackend;
pub use adapters::remote_backend::RemoteBackend;
pub use adapters::session_store::{restore_session, FileSessionStore};
pub use adapters::build_backend;
pub use config::cli::LocalStorage;
pub use config::toml_config::TomlConfig;
pub use crate::core::controller::{ControllerEvent, ControllerHandle, ExecutionController};
pub use crate::core::engine::{FilterEngine, RunReport};
pub use utils::error::{LabError, Result};
