use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("Runner request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Backend returned {outcomes} outcomes for {records} records")]
    BatchShapeMismatch { records: usize, outcomes: usize },

    #[error("Execution backend '{backend}' failed: {message}")]
    BackendError { backend: String, message: String },

    #[error("Execution controller has stopped")]
    ControllerStopped,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' is invalid: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field '{field}'")]
    MissingConfigError { field: String },
}

/// 錯誤分類，用於日誌與使用者提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Data,
    Execution,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LabError {
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendError {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) => ErrorCategory::Network,
            Self::IoError(_) => ErrorCategory::Io,
            Self::SerializationError(_) => ErrorCategory::Data,
            Self::BatchShapeMismatch { .. }
            | Self::BackendError { .. }
            | Self::ControllerStopped => ErrorCategory::Execution,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 遠端 runner 暫時無法連線，下一次編輯會再試
            Self::ApiError(_) => ErrorSeverity::Medium,
            Self::BatchShapeMismatch { .. } | Self::BackendError { .. } => ErrorSeverity::High,
            Self::ControllerStopped => ErrorSeverity::High,
            Self::SerializationError(_) => ErrorSeverity::High,
            Self::IoError(_) => ErrorSeverity::Critical,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    /// Run-level errors abort one run only; the controller keeps accepting requests.
    pub fn is_batch_level(&self) -> bool {
        matches!(
            self,
            Self::ApiError(_) | Self::BatchShapeMismatch { .. } | Self::BackendError { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ApiError(_) => "Check that the runner URL is reachable, or unset FILTERLAB_RUNNER_URL to use the local backend",
            Self::IoError(_) => "Check that the file exists and the state directory is writable",
            Self::SerializationError(_) => "Make sure the data is valid JSON",
            Self::BatchShapeMismatch { .. } => "The backend must return one result per input record; check the runner implementation",
            Self::BackendError { .. } => "Fix the filter script so it compiles and defines the entry point function",
            Self::ControllerStopped => "Restart filterlab",
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Review filterlab.toml and command line flags",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(e) => format!("Could not reach the filter runner: {}", e),
            Self::BatchShapeMismatch { records, outcomes } => format!(
                "The filter backend answered with {} results for {} records; output left unchanged",
                outcomes, records
            ),
            Self::BackendError { message, .. } => format!("The filter could not run: {}", message),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LabError>;
