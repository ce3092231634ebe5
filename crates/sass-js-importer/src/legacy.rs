/*
 * legacy.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The legacy single-call importer: (specifier, previous, done?) in, contents
 * out. It is the two-phase importer run back to back.
 */

use std::path::Path;
use std::sync::Arc;

use crate::config::ImporterConfig;
use crate::deferred::MaybeDeferred;
use crate::error::ImportError;
use crate::importer::{CanonicalizeContext, JsImporter, bundler_js_importer};
use crate::resolver::{BundlerResolver, ExternalResolver, IncludePathsResolver, Resolve};
use crate::transform::ModuleTransformer;

/// Outcome of one legacy import. Unlike [`crate::ImporterResult`] there is no
/// syntax tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyResult {
    /// The specifier is not a JavaScript module, or was not found
    NotApplicable,
    Contents(String),
    Error(ImportError),
}

impl LegacyResult {
    fn from_outcome(outcome: Result<Option<String>, ImportError>) -> Self {
        match outcome {
            Ok(Some(contents)) => LegacyResult::Contents(contents),
            Ok(None) => LegacyResult::NotApplicable,
            Err(e) => LegacyResult::Error(e),
        }
    }
}

/// Completion callback for asynchronous legacy imports.
pub type LegacyDone = Box<dyn FnOnce(LegacyResult) + Send>;

/// Single-call importer over a [`JsImporter`].
#[derive(Debug)]
pub struct LegacyJsImporter<R> {
    inner: Arc<JsImporter<R>>,
}

impl<R> Clone for LegacyJsImporter<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resolve + 'static> LegacyJsImporter<R> {
    pub fn new(inner: JsImporter<R>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn inner(&self) -> &JsImporter<R> {
        &self.inner
    }

    /// Import `specifier` as seen from the stylesheet at `previous`.
    ///
    /// With a synchronous resolver the result is returned directly and `done`
    /// is never called. With an asynchronous resolver this returns `None` and
    /// `done` receives the result exactly once, from a worker thread.
    pub fn import(
        &self,
        specifier: &str,
        previous: &Path,
        done: Option<LegacyDone>,
    ) -> Option<LegacyResult> {
        let context = CanonicalizeContext::from_path(previous);

        match self.inner.canonicalize(specifier, &context) {
            MaybeDeferred::Ready(canonical) => {
                Some(LegacyResult::from_outcome(load_canonical(&self.inner, canonical)))
            }
            MaybeDeferred::Deferred(canonical) => {
                let inner = Arc::clone(&self.inner);
                let specifier = specifier.to_string();
                std::thread::spawn(move || {
                    let canonical = pollster::block_on(canonical);
                    let result = LegacyResult::from_outcome(load_canonical(&inner, canonical));
                    match done {
                        Some(done) => done(result),
                        None => tracing::warn!(
                            specifier = %specifier,
                            "Asynchronous import finished without a completion callback; result dropped"
                        ),
                    }
                });
                None
            }
        }
    }
}

fn load_canonical<R: Resolve>(
    importer: &JsImporter<R>,
    canonical: Result<Option<url::Url>, ImportError>,
) -> Result<Option<String>, ImportError> {
    match canonical? {
        Some(url) => importer.load(&url).map(|result| Some(result.contents)),
        None => Ok(None),
    }
}

/// Legacy importer that searches next to the importing stylesheet, then in
/// `config.include_paths`.
pub fn legacy_js_importer(config: &ImporterConfig) -> LegacyJsImporter<IncludePathsResolver> {
    let transformer =
        ModuleTransformer::new(config.loader.clone()).with_timeout(config.timeout);
    LegacyJsImporter::new(JsImporter::new(
        IncludePathsResolver::new(config.include_paths.clone()),
        transformer,
    ))
}

/// Legacy importer for bundler integrations. Always asynchronous.
pub fn bundler_legacy_js_importer(
    config: &ImporterConfig,
    bundler: Arc<dyn BundlerResolver>,
) -> LegacyJsImporter<ExternalResolver> {
    LegacyJsImporter::new(bundler_js_importer(config, bundler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportErrorKind;
    use crate::resolver::{CallbackResolver, ResolveCallback};
    use crate::transform::LoaderCommand;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config() -> ImporterConfig {
        ImporterConfig::new(LoaderCommand::new("/nonexistent/sass-js-loader"))
    }

    #[test]
    fn test_sync_not_applicable() {
        let importer = legacy_js_importer(&config());
        let result = importer.import("colors.scss", Path::new("/any/main.scss"), None);
        assert_eq!(result, Some(LegacyResult::NotApplicable));
    }

    #[test]
    fn test_sync_resolution_error() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("main.scss");
        let foo = dir.path().join("foo");
        let importer = legacy_js_importer(&config().with_include_paths(vec![foo]));

        let Some(LegacyResult::Error(err)) = importer.import("variables.js", &main, None) else {
            panic!("expected a resolution error");
        };
        assert_eq!(err.kind(), ImportErrorKind::ResolutionNotFound);
        assert!(err.message().starts_with("Unable to find \"variables.js\""));
    }

    #[test]
    fn test_sync_never_calls_done() {
        let (tx, rx) = mpsc::channel();
        let importer = legacy_js_importer(&config());
        let done: LegacyDone = Box::new(move |result| tx.send(result).unwrap());

        let result = importer.import("colors.scss", Path::new("/any/main.scss"), Some(done));
        assert!(result.is_some());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_async_calls_done_once() {
        let bundler = CallbackResolver::new(|_: &Path, _: &str, done: ResolveCallback| {
            std::thread::spawn(move || done(Ok(None)));
        });
        let importer = bundler_legacy_js_importer(&config(), Arc::new(bundler));

        let (tx, rx) = mpsc::channel();
        let done: LegacyDone = Box::new(move |result| tx.send(result).unwrap());
        let result = importer.import("tokens.js", Path::new("/nonexistent/main.scss"), Some(done));
        assert!(result.is_none());

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            LegacyResult::NotApplicable
        );
        // the sender was consumed with the callback, so no second result can arrive
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_async_error_reaches_done() {
        let bundler = CallbackResolver::new(|_: &Path, _: &str, done: ResolveCallback| {
            done(Err("package not found".into()));
        });
        let importer = bundler_legacy_js_importer(&config(), Arc::new(bundler));

        let (tx, rx) = mpsc::channel();
        let done: LegacyDone = Box::new(move |result| tx.send(result).unwrap());
        assert!(importer
            .import("tokens.js", Path::new("/nonexistent/main.scss"), Some(done))
            .is_none());

        let LegacyResult::Error(err) = rx.recv_timeout(Duration::from_secs(5)).unwrap() else {
            panic!("expected an error result");
        };
        assert_eq!(err, ImportError::ResolverFailed("package not found".to_string()));
    }

    #[test]
    fn test_async_load_failure_reaches_done() {
        let dir = TempDir::new().unwrap();
        let main = dir.path().join("main.scss");
        fs::write(dir.path().join("tokens.js"), "export default {}").unwrap();

        let bundler = CallbackResolver::new(|_: &Path, _: &str, done: ResolveCallback| {
            done(Ok(Some(PathBuf::from("/unused.js"))));
        });
        let importer = bundler_legacy_js_importer(&config(), Arc::new(bundler));

        let (tx, rx) = mpsc::channel();
        let done: LegacyDone = Box::new(move |result| tx.send(result).unwrap());
        assert!(importer.import("tokens.js", &main, Some(done)).is_none());

        // found locally, then the (missing) loader fails to spawn
        let LegacyResult::Error(err) = rx.recv_timeout(Duration::from_secs(5)).unwrap() else {
            panic!("expected an error result");
        };
        assert_eq!(err.kind(), ImportErrorKind::Unknown);
    }
}
