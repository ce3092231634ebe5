//! Error types for JS imports.
//!
//! Copyright (c) 2025 Posit, PBC

use thiserror::Error;

use crate::exit_code::LoaderExitCode;

/// Errors reported to the host compiler for one import.
///
/// Every variant carries a human-readable diagnostic. Errors that originate
/// in the loader child process carry its stderr verbatim, so problems in the
/// imported module itself (e.g. a syntax error) stay visible to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// The module path handed to the loader was not absolute
    #[error("Invalid module path: {0}")]
    InvalidPath(String),

    /// The module file does not exist
    #[error("Module not found: {0}")]
    FileNotFound(String),

    /// Loading or evaluating the module failed
    #[error("Module import failed: {0}")]
    ImportFailed(String),

    /// The module has no default export
    #[error("Missing default export: {0}")]
    NoDefaultExport(String),

    /// The default export could not be encoded as JSON
    #[error("Data serialization failed: {0}")]
    DataSerializationFailed(String),

    /// The loader's stdout was not valid JSON
    #[error("Data parsing failed: {0}")]
    DataParsingFailed(String),

    /// The default export was not a plain object
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The module was not found in the importing directory or any include path
    #[error("{0}")]
    ResolutionNotFound(String),

    /// The bundler resolver reported an error
    #[error("Resolver failed: {0}")]
    ResolverFailed(String),

    /// The loader did not exit within the configured timeout
    #[error("Module loader timed out: {0}")]
    TimedOut(String),

    /// The loader could not be started or exited with an unexpected status
    #[error("Unknown error while importing JavaScript: {0}")]
    Unknown(String),
}

/// The kind of an [`ImportError`], without its diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportErrorKind {
    InvalidPath,
    FileNotFound,
    ImportFailed,
    NoDefaultExport,
    DataSerializationFailed,
    DataParsingFailed,
    InvalidData,
    ResolutionNotFound,
    ResolverFailed,
    TimedOut,
    Unknown,
}

impl ImportError {
    /// Build the error for a failed loader run.
    ///
    /// `LoaderExitCode::Ok` is not a failure; it maps to `Unknown` so callers
    /// never have to special-case it.
    pub fn from_loader_exit(code: LoaderExitCode, stderr: impl Into<String>) -> Self {
        let message = stderr.into();
        match code {
            LoaderExitCode::InvalidPath => ImportError::InvalidPath(message),
            LoaderExitCode::FileNotFound => ImportError::FileNotFound(message),
            LoaderExitCode::ImportFailed => ImportError::ImportFailed(message),
            LoaderExitCode::NoDefaultExport => ImportError::NoDefaultExport(message),
            LoaderExitCode::DataSerializationFailed => {
                ImportError::DataSerializationFailed(message)
            }
            LoaderExitCode::Ok => ImportError::Unknown(message),
        }
    }

    pub fn kind(&self) -> ImportErrorKind {
        match self {
            ImportError::InvalidPath(_) => ImportErrorKind::InvalidPath,
            ImportError::FileNotFound(_) => ImportErrorKind::FileNotFound,
            ImportError::ImportFailed(_) => ImportErrorKind::ImportFailed,
            ImportError::NoDefaultExport(_) => ImportErrorKind::NoDefaultExport,
            ImportError::DataSerializationFailed(_) => ImportErrorKind::DataSerializationFailed,
            ImportError::DataParsingFailed(_) => ImportErrorKind::DataParsingFailed,
            ImportError::InvalidData(_) => ImportErrorKind::InvalidData,
            ImportError::ResolutionNotFound(_) => ImportErrorKind::ResolutionNotFound,
            ImportError::ResolverFailed(_) => ImportErrorKind::ResolverFailed,
            ImportError::TimedOut(_) => ImportErrorKind::TimedOut,
            ImportError::Unknown(_) => ImportErrorKind::Unknown,
        }
    }

    /// The diagnostic message, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ImportError::InvalidPath(m)
            | ImportError::FileNotFound(m)
            | ImportError::ImportFailed(m)
            | ImportError::NoDefaultExport(m)
            | ImportError::DataSerializationFailed(m)
            | ImportError::DataParsingFailed(m)
            | ImportError::InvalidData(m)
            | ImportError::ResolutionNotFound(m)
            | ImportError::ResolverFailed(m)
            | ImportError::TimedOut(m)
            | ImportError::Unknown(m) => m,
        }
    }
}

/// SASS compilation through the grass bridge failed
#[derive(Debug, Error)]
#[error("SASS compilation failed: {message}")]
pub struct CompileError {
    pub message: String,
}

impl From<Box<grass::Error>> for CompileError {
    fn from(e: Box<grass::Error>) -> Self {
        CompileError {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_loader_exit() {
        let cases = [
            (LoaderExitCode::InvalidPath, ImportErrorKind::InvalidPath),
            (LoaderExitCode::FileNotFound, ImportErrorKind::FileNotFound),
            (LoaderExitCode::ImportFailed, ImportErrorKind::ImportFailed),
            (LoaderExitCode::NoDefaultExport, ImportErrorKind::NoDefaultExport),
            (
                LoaderExitCode::DataSerializationFailed,
                ImportErrorKind::DataSerializationFailed,
            ),
            (LoaderExitCode::Ok, ImportErrorKind::Unknown),
        ];
        for (code, kind) in cases {
            let err = ImportError::from_loader_exit(code, "stderr text");
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "stderr text");
        }
    }

    #[test]
    fn test_display_keeps_diagnostic() {
        let err = ImportError::ImportFailed("Could not import module: /a/b.js".to_string());
        assert_eq!(
            err.to_string(),
            "Module import failed: Could not import module: /a/b.js"
        );

        let err = ImportError::ResolutionNotFound("Unable to find \"x.js\"".to_string());
        assert_eq!(err.to_string(), "Unable to find \"x.js\"");
    }
}
