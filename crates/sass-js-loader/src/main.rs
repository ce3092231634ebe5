//! sass-js-loader: print a JavaScript module's default export as JSON.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Usage: `sass-js-loader <absolute-module-path>`
//!
//! Exit codes and the stderr diagnostic are the contract with the parent
//! process; see `sass_js_importer::LoaderExitCode`. Logging is off unless
//! `RUST_LOG` enables it, and goes to stderr.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use sass_js_loader::{LoadFailure, LoaderExitCode, load_module_json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "off".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let path = std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_default();

    let result = load_module_json(&path).and_then(|json| {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(json.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| LoadFailure::serialization_failed(&path, e))
    });

    match result {
        Ok(()) => LoaderExitCode::Ok.into(),
        Err(failure) => {
            tracing::debug!(code = failure.exit_code.code(), "Module load failed");
            eprintln!("{}", failure.message);
            failure.exit_code.into()
        }
    }
}
