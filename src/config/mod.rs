pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use crate::utils::error::LabError;
#[cfg(feature = "cli")]
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "filterlab")]
#[command(about = "Try Fluent Bit style filter callbacks against JSON log records")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = toml_config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Run filters on a remote runner instead of the local interpreter
    #[arg(long)]
    pub runner_url: Option<String>,

    /// Directory holding the saved session
    #[arg(long)]
    pub state_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the filter once and print the output events
    Run {
        /// Input records file (defaults to the saved session)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Filter script file (defaults to the saved session)
        #[arg(long)]
        filter: Option<PathBuf>,
    },

    /// Re-run the filter whenever the input or filter file changes
    Watch {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        filter: PathBuf,

        /// How often the files are checked for changes
        #[arg(long, default_value = "250")]
        poll_ms: u64,

        /// Override the quiet interval from the config
        #[arg(long)]
        quiet_ms: Option<u64>,
    },

    /// Store a file as the session's input or filter
    Import {
        #[arg(long, required_unless_present = "filter", conflicts_with = "filter")]
        input: Option<PathBuf>,

        /// Treat the input file as raw log lines (only with --input)
        #[arg(long)]
        raw: bool,

        #[arg(long)]
        filter: Option<PathBuf>,
    },

    /// Write a Fluent Bit configuration embedding the filter
    Export {
        /// Filter script file (defaults to the saved session)
        #[arg(long)]
        filter: Option<PathBuf>,

        #[arg(long, default_value = "fluent-bit.conf")]
        out: PathBuf,
    },

    /// Forget the saved session
    Reset,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the config file, then layers environment and flags on top.
    pub fn resolve(&self) -> crate::utils::error::Result<TomlConfig> {
        if let Command::Import {
            input: None,
            raw: true,
            ..
        } = &self.command
        {
            return Err(LabError::ConfigValidationError {
                field: "import.raw".to_string(),
                message: "--raw only applies to --input".to_string(),
            });
        }

        let mut config = TomlConfig::from_file_or_default(&self.config)?;
        config.apply_env_overrides();

        if let Some(url) = &self.runner_url {
            config.backend.runner_url = Some(url.clone());
        }
        if let Some(state_dir) = &self.state_dir {
            config.session.state_dir = state_dir.clone();
        }
        if let Command::Watch {
            quiet_ms: Some(quiet_ms),
            ..
        } = &self.command
        {
            config.controller.quiet_interval_ms = *quiet_ms;
        }

        Ok(config)
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use crate::config::toml_config::BackendKind;

    #[test]
    fn test_flags_override_config() {
        let cli = CliConfig::parse_from([
            "filterlab",
            "--config",
            "/nonexistent/filterlab.toml",
            "--runner-url",
            "http://localhost:9000/run",
            "--state-dir",
            "/tmp/state",
            "watch",
            "--input",
            "in.log",
            "--filter",
            "filter.lua",
            "--quiet-ms",
            "300",
        ]);

        let config = cli.resolve().unwrap();

        assert!(matches!(
            config.backend_kind().unwrap(),
            BackendKind::Remote { .. }
        ));
        assert_eq!(config.session.state_dir, "/tmp/state");
        assert_eq!(config.controller.quiet_interval_ms, 300);
    }

    fn import_accepted(args: &[&str]) -> bool {
        let argv = ["filterlab", "--config", "/nonexistent/filterlab.toml", "import"]
            .iter()
            .chain(args)
            .copied();
        match CliConfig::try_parse_from(argv) {
            Ok(cli) => cli.resolve().is_ok(),
            Err(_) => false,
        }
    }

    #[test]
    fn test_import_requires_a_file() {
        assert!(!import_accepted(&[]));
        assert!(import_accepted(&["--input", "a", "--raw"]));
        assert!(import_accepted(&["--filter", "f"]));
    }

    #[test]
    fn test_raw_without_input_is_rejected() {
        assert!(!import_accepted(&["--raw", "--filter", "f"]));
        assert!(!import_accepted(&["--raw"]));

        let cli = CliConfig::parse_from([
            "filterlab",
            "--config",
            "/nonexistent/filterlab.toml",
            "import",
            "--raw",
            "--filter",
            "f",
        ]);
        assert!(matches!(
            cli.resolve(),
            Err(LabError::ConfigValidationError { .. })
        ));
    }
}
