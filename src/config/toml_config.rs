use crate::utils::error::{LabError, Result};
use crate::utils::validation::{
    validate_identifier, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_required_field, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that points the app at a remote runner.
pub const RUNNER_URL_ENV: &str = "FILTERLAB_RUNNER_URL";

pub const DEFAULT_CONFIG_FILE: &str = "filterlab.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub backend: BackendConfig,
    pub callback: CallbackConfig,
    pub controller: ControllerConfig,
    pub session: SessionConfig,
    pub local_engine: LocalEngineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Explicit choice; when unset a runner URL selects the remote backend.
    pub kind: Option<BackendChoice>,
    pub runner_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: None,
            runner_url: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Tag handed to the callback as its first argument.
    pub tag: String,
    pub entry_point: String,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            tag: "test".to_string(),
            entry_point: "cb_filter".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub quiet_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            quiet_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub state_dir: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_dir: ".filterlab".to_string(),
        }
    }
}

/// Interpreter limits for the local backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEngineConfig {
    /// VM instructions one callback invocation may execute.
    pub max_instructions: u64,
    pub memory_limit_mb: usize,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            max_instructions: 10_000_000,
            memory_limit_mb: 64,
        }
    }
}

/// 解析後的後端選擇
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote { runner_url: String, timeout: Duration },
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LabError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists; a missing file means defaults.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LabError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RUNNER_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| LabError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// The runner URL environment variable wins over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(RUNNER_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend.runner_url = Some(url);
            }
        }
    }

    pub fn backend_kind(&self) -> Result<BackendKind> {
        let runner_url = self
            .backend
            .runner_url
            .as_ref()
            .filter(|url| !url.trim().is_empty());

        let choice = self.backend.kind.unwrap_or(if runner_url.is_some() {
            BackendChoice::Remote
        } else {
            BackendChoice::Local
        });

        match choice {
            BackendChoice::Local => Ok(BackendKind::Local),
            BackendChoice::Remote => {
                let runner_url = validate_required_field("backend.runner_url", &runner_url)?;
                Ok(BackendKind::Remote {
                    runner_url: runner_url.to_string(),
                    timeout: Duration::from_secs(self.backend.timeout_seconds),
                })
            }
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.controller.quiet_interval_ms)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let BackendKind::Remote { runner_url, .. } = self.backend_kind()? {
            validate_url("backend.runner_url", &runner_url)?;
        }
        validate_range("backend.timeout_seconds", self.backend.timeout_seconds, 1, 600)?;

        validate_non_empty_string("callback.tag", &self.callback.tag)?;
        validate_identifier("callback.entry_point", &self.callback.entry_point)?;

        validate_positive_number(
            "controller.quiet_interval_ms",
            self.controller.quiet_interval_ms,
            1,
        )?;

        validate_path("session.state_dir", &self.session.state_dir)?;

        validate_positive_number(
            "local_engine.max_instructions",
            self.local_engine.max_instructions,
            1_000,
        )?;
        validate_range(
            "local_engine.memory_limit_mb",
            self.local_engine.memory_limit_mb,
            1,
            4096,
        )?;

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
