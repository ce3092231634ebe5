//! Importer configuration.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Configuration is fixed when an importer is constructed and threaded
//! explicitly into the resolver and transform runner. Nothing is looked up
//! from globals while an import is running.
//!
//! # Environment
//!
//! [`ImporterConfig::from_env()`] reads:
//!
//! | variable | meaning |
//! |---|---|
//! | `SASS_JS_LOADER` | path to the `sass-js-loader` binary |
//! | `SASS_JS_INCLUDE_PATHS` | search roots, joined with the platform path delimiter |
//! | `SASS_JS_TIMEOUT_MS` | upper bound for one module load, in milliseconds |

use std::env::VarError;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::transform::LoaderCommand;

/// Environment variable holding the include paths.
pub const INCLUDE_PATHS_ENV_VAR: &str = "SASS_JS_INCLUDE_PATHS";

/// Environment variable holding the loader timeout in milliseconds.
pub const TIMEOUT_ENV_VAR: &str = "SASS_JS_TIMEOUT_MS";

/// Errors in importer configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The timeout setting is not a whole number of milliseconds
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
}

/// Process-wide settings shared by every import of one importer.
///
/// # Example
///
/// ```rust,ignore
/// use sass_js_importer::{ImporterConfig, legacy_js_importer};
///
/// let config = ImporterConfig::default()
///     .with_include_paths_str("styles/variables:vendor/tokens");
/// let importer = legacy_js_importer(&config);
/// ```
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Search roots tried, in order, when a module is not found next to the
    /// importing stylesheet. Only the legacy importer uses them.
    pub include_paths: Vec<PathBuf>,

    /// How to start the loader child process.
    pub loader: LoaderCommand,

    /// Upper bound for one module load. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            loader: LoaderCommand::locate(),
            timeout: None,
        }
    }
}

impl ImporterConfig {
    pub fn new(loader: LoaderCommand) -> Self {
        Self {
            include_paths: Vec::new(),
            loader,
            timeout: None,
        }
    }

    /// Build a configuration from `SASS_JS_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; the loader is located with
    /// [`LoaderCommand::locate()`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(paths) = std::env::var_os(INCLUDE_PATHS_ENV_VAR) {
            config = config.with_include_paths_str(paths);
        }

        if let Some(timeout) = timeout_from_var(std::env::var(TIMEOUT_ENV_VAR))? {
            config.timeout = Some(timeout);
        }

        Ok(config)
    }

    pub fn with_include_paths(mut self, include_paths: Vec<PathBuf>) -> Self {
        self.include_paths = include_paths;
        self
    }

    /// Set the include paths from a delimiter-joined string (`:` on Unix,
    /// `;` on Windows). Empty entries are skipped.
    pub fn with_include_paths_str(mut self, include_paths: impl AsRef<OsStr>) -> Self {
        self.include_paths = std::env::split_paths(include_paths.as_ref())
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        self
    }

    pub fn with_loader(mut self, loader: LoaderCommand) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Interpret the timeout variable. Unset means no timeout; a value that is
/// not valid Unicode is rejected like any other malformed value.
fn timeout_from_var(var: Result<String, VarError>) -> Result<Option<Duration>, ConfigError> {
    match var {
        Ok(value) => parse_timeout(&value).map(Some),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(value)) => Err(ConfigError::InvalidTimeout {
            var: TIMEOUT_ENV_VAR,
            value: value.to_string_lossy().into_owned(),
        }),
    }
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidTimeout {
            var: TIMEOUT_ENV_VAR,
            value: value.to_string(),
        })
}
