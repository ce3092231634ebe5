//! The `sass-js-loader` child process.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Loads one JavaScript module in an embedded V8 runtime and produces its
//! default export as JSON text. The binary prints that text on stdout; any
//! failure becomes a [`LoaderExitCode`] plus a one-line stderr diagnostic.
//!
//! Steps, each terminal:
//! 1. the path must be absolute ([`LoaderExitCode::InvalidPath`])
//! 2. the file must exist ([`LoaderExitCode::FileNotFound`])
//! 3. the module must load and evaluate ([`LoaderExitCode::ImportFailed`])
//! 4. it must have a default export ([`LoaderExitCode::NoDefaultExport`])
//! 5. `JSON.stringify` must accept the default export
//!    ([`LoaderExitCode::DataSerializationFailed`])

mod engine;
mod error;

use std::path::Path;

pub use error::LoadFailure;
pub use sass_js_importer::LoaderExitCode;

use crate::engine::ModuleEngine;

/// Load the module at `path` and return its default export as JSON text.
pub fn load_module_json(path: &Path) -> Result<String, LoadFailure> {
    if !path.is_absolute() {
        return Err(LoadFailure::invalid_path(path));
    }
    if !path.exists() {
        return Err(LoadFailure::file_not_found(path));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| LoadFailure::import_failed(path, e))?;

    runtime.block_on(async { ModuleEngine::new().load_default_export(path).await })
}
