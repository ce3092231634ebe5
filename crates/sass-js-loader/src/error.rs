//! Copyright (c) 2025 Posit, PBC

use std::path::Path;

use sass_js_importer::LoaderExitCode;
use thiserror::Error;

/// A failed module load: the exit code to report and its one-line diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LoadFailure {
    pub exit_code: LoaderExitCode,
    pub message: String,
}

impl LoadFailure {
    pub fn new(exit_code: LoaderExitCode, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn invalid_path(path: &Path) -> Self {
        Self::new(
            LoaderExitCode::InvalidPath,
            format!("File path must be absolute: {}", path.display()),
        )
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(
            LoaderExitCode::FileNotFound,
            format!("File does not exist: {}", path.display()),
        )
    }

    pub fn import_failed(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::new(
            LoaderExitCode::ImportFailed,
            format!(
                "Could not import module: {} ({})",
                path.display(),
                single_line(&reason.to_string())
            ),
        )
    }

    pub fn no_default_export(path: &Path) -> Self {
        Self::new(
            LoaderExitCode::NoDefaultExport,
            format!("Imported module has no default export: {}", path.display()),
        )
    }

    pub fn serialization_failed(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::new(
            LoaderExitCode::DataSerializationFailed,
            format!(
                "Imported module data could not be serialized: {} ({})",
                path.display(),
                single_line(&reason.to_string())
            ),
        )
    }
}

/// Collapse runs of whitespace, including newlines, into single spaces.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
