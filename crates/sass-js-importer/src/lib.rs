//! Import JavaScript data modules into SASS as variables.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! A stylesheet can `@import "variables.js"` and receive one SCSS variable per
//! key of the module's default export. This crate provides:
//! - The value serializer (JSON value → SCSS literal)
//! - The exit-code taxonomy shared with the `sass-js-loader` child process
//! - The transform runner that spawns the loader and interprets its output
//! - Resolvers (filesystem, include paths, bundler callback)
//! - Two host interface shapes: two-phase `canonicalize`/`load` and the legacy
//!   single-call importer
//! - A `grass::Fs` bridge so grass can compile stylesheets that import modules
//!
//! Module loading happens in a separate process so that the synchronous host
//! hook can block on work that is asynchronous inside the JavaScript runtime.

mod config;
mod deferred;
mod error;
mod exit_code;
mod grass_fs;
mod importer;
mod legacy;
mod resolver;
mod scss;
mod transform;

pub use config::{ConfigError, ImporterConfig};
pub use deferred::MaybeDeferred;
pub use error::{CompileError, ImportError, ImportErrorKind};
pub use exit_code::LoaderExitCode;
pub use grass_fs::{JsImportFs, compile_file};
pub use importer::{
    CanonicalizeContext, Canonicalized, ImporterResult, JsImporter, Syntax, bundler_js_importer,
    js_importer,
};
pub use legacy::{
    LegacyDone, LegacyJsImporter, LegacyResult, bundler_legacy_js_importer, legacy_js_importer,
};
pub use resolver::{
    BoxError, BundlerResolver, CallbackResolver, ExternalResolver, FsResolver,
    IncludePathsResolver, JS_EXTENSIONS, Resolution, Resolve, ResolveCallback, fs_resolve,
    include_paths_resolve, is_js_file,
};
pub use scss::{to_scss_value, to_scss_variables};
pub use transform::{LOADER_BINARY, LOADER_ENV_VAR, LoaderCommand, LoaderOutput, ModuleTransformer};
