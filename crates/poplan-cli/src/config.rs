//! Configuration file management for poplan.
//!
//! Provides a TOML-based config file at `~/.config/poplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Env var overriding the output format.
pub const OUTPUT_ENV: &str = "POPLAN_OUTPUT";
/// Env var overriding the tracing filter.
pub const LOG_ENV: &str = "POPLAN_LOG";
/// Tracing filter used when nothing else is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

// -----------------------------------------------------------------------
// Output format
// -----------------------------------------------------------------------

/// How `poplan run` prints the refined plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Error returned when an output format string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormatParseError(pub String);

impl fmt::Display for OutputFormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid output format {:?} (expected text or json)", self.0)
    }
}

impl std::error::Error for OutputFormatParseError {}

impl FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `poplan_core=debug`.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the poplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/poplan` or `~/.config/poplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("poplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("poplan")
}

/// Return the path to the poplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoplanConfig {
    pub format: OutputFormat,
    pub log_filter: String,
}

impl PoplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// A missing or unreadable config file counts as absent.
    pub fn resolve(cli_format: Option<OutputFormat>, cli_log: Option<&str>) -> Result<Self> {
        Self::resolve_from(load_config().ok(), cli_format, cli_log)
    }

    /// - Format: `cli_format` > `POPLAN_OUTPUT` env > `output.format` > text
    /// - Log filter: `cli_log` > `POPLAN_LOG` env > `RUST_LOG` env > `logging.filter` > `info`
    pub fn resolve_from(
        file_config: Option<ConfigFile>,
        cli_format: Option<OutputFormat>,
        cli_log: Option<&str>,
    ) -> Result<Self> {
        let format = if let Some(format) = cli_format {
            format
        } else if let Ok(value) = std::env::var(OUTPUT_ENV) {
            value
                .parse()
                .with_context(|| format!("{OUTPUT_ENV} env var is not a valid output format"))?
        } else if let Some(ref cfg) = file_config {
            cfg.output.format
        } else {
            OutputFormat::default()
        };

        let log_filter = if let Some(filter) = cli_log {
            filter.to_string()
        } else if let Ok(filter) = std::env::var(LOG_ENV) {
            filter
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            filter
        } else if let Some(ref cfg) = file_config {
            cfg.logging.filter.clone()
        } else {
            default_filter()
        };

        Ok(Self { format, log_filter })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
