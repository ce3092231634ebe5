/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Resolution of import specifiers to module files.
 *
 * Three strategies:
 * - FsResolver: next to the importing stylesheet only
 * - IncludePathsResolver: next to the stylesheet, then configured search roots
 * - ExternalResolver: next to the stylesheet, then a bundler's resolver
 *
 * Filesystem strategies answer synchronously. The bundler strategy always
 * answers with a deferred value, and the importer mirrors that.
 */

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::deferred::MaybeDeferred;
use crate::error::ImportError;

/// Extensions of the module files this importer handles.
pub const JS_EXTENSIONS: [&str; 3] = ["js", "mjs", "cjs"];

/// Error type produced by bundler resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of resolving one specifier: a module path, `None` when the
/// resolver does not handle it, or an error.
pub type Resolution = MaybeDeferred<Result<Option<PathBuf>, ImportError>>;

/// Check if the specifier names a JavaScript module (`.js`, `.mjs`, `.cjs`).
pub fn is_js_file(specifier: &str) -> bool {
    let Some((_, extension)) = specifier.rsplit_once('.') else {
        return false;
    };
    JS_EXTENSIONS.contains(&extension)
}

/// Resolve `specifier` relative to the directory of `containing`.
///
/// Returns the normalized absolute path if a file exists there.
pub fn fs_resolve(specifier: &str, containing: &Path) -> Option<PathBuf> {
    let dir = containing.parent().unwrap_or(containing);
    let candidate = absolutize(&dir.join(specifier));
    candidate.is_file().then_some(candidate)
}

/// Resolve `specifier` against each search root in order; first hit wins.
pub fn include_paths_resolve(specifier: &str, roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .map(|root| absolutize(&root.join(specifier)))
        .find(|candidate| candidate.is_file())
}

/// Make `path` absolute against the current directory and drop `.`/`..`
/// components without touching the filesystem.
fn absolutize(path: &Path) -> PathBuf {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// A strategy for turning a specifier into a module path.
pub trait Resolve: Send + Sync {
    /// Resolve `specifier` as imported from the stylesheet at `containing`.
    fn resolve(&self, specifier: &str, containing: &Path) -> Resolution;
}

/// Looks for the module next to the importing stylesheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl Resolve for FsResolver {
    fn resolve(&self, specifier: &str, containing: &Path) -> Resolution {
        MaybeDeferred::Ready(Ok(fs_resolve(specifier, containing)))
    }
}

/// Looks next to the importing stylesheet, then in each include path.
#[derive(Debug, Clone, Default)]
pub struct IncludePathsResolver {
    include_paths: Vec<PathBuf>,
}

impl IncludePathsResolver {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    fn resolve_now(&self, specifier: &str, containing: &Path) -> Result<Option<PathBuf>, ImportError> {
        if let Some(path) = fs_resolve(specifier, containing) {
            return Ok(Some(path));
        }
        if self.include_paths.is_empty() {
            return Ok(None);
        }
        if let Some(path) = include_paths_resolve(specifier, &self.include_paths) {
            tracing::debug!(specifier, path = %path.display(), "Resolved via include paths");
            return Ok(Some(path));
        }

        let dir = containing.parent().unwrap_or(containing);
        let searched: Vec<String> = std::iter::once(dir)
            .chain(self.include_paths.iter().map(PathBuf::as_path))
            .map(|p| p.display().to_string())
            .collect();
        Err(ImportError::ResolutionNotFound(format!(
            "Unable to find \"{}\" from the following path(s): {}. Check includePaths.",
            specifier,
            searched.join(", ")
        )))
    }
}

impl Resolve for IncludePathsResolver {
    fn resolve(&self, specifier: &str, containing: &Path) -> Resolution {
        MaybeDeferred::Ready(self.resolve_now(specifier, containing))
    }
}

/// A bundler's own module resolution, consumed as an opaque service.
///
/// `Ok(None)` means the bundler could not find the module either.
#[async_trait]
pub trait BundlerResolver: Send + Sync {
    async fn resolve(&self, previous: &Path, specifier: &str)
    -> Result<Option<PathBuf>, BoxError>;
}

/// Error-first completion callback handed to a [`CallbackResolver`] function.
pub type ResolveCallback = Box<dyn FnOnce(Result<Option<PathBuf>, BoxError>) + Send>;

/// Adapts a callback-style resolver `(previous, specifier, done)` into a
/// [`BundlerResolver`]. The function must call `done` exactly once, from any
/// thread.
pub struct CallbackResolver<F> {
    resolve_fn: F,
}

impl<F> CallbackResolver<F>
where
    F: Fn(&Path, &str, ResolveCallback) + Send + Sync,
{
    pub fn new(resolve_fn: F) -> Self {
        Self { resolve_fn }
    }
}

#[async_trait]
impl<F> BundlerResolver for CallbackResolver<F>
where
    F: Fn(&Path, &str, ResolveCallback) + Send + Sync,
{
    async fn resolve(
        &self,
        previous: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, BoxError> {
        let (tx, rx) = oneshot::channel();
        (self.resolve_fn)(
            previous,
            specifier,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await
            .map_err(|_| BoxError::from("bundler resolver dropped its completion callback"))?
    }
}

/// Looks next to the importing stylesheet, then asks the bundler.
#[derive(Clone)]
pub struct ExternalResolver {
    bundler: Arc<dyn BundlerResolver>,
}

impl ExternalResolver {
    pub fn new(bundler: Arc<dyn BundlerResolver>) -> Self {
        Self { bundler }
    }
}

impl std::fmt::Debug for ExternalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalResolver")
            .field("bundler", &"<BundlerResolver>")
            .finish()
    }
}

impl Resolve for ExternalResolver {
    fn resolve(&self, specifier: &str, containing: &Path) -> Resolution {
        if let Some(path) = fs_resolve(specifier, containing) {
            return MaybeDeferred::deferred(async move { Ok(Some(path)) });
        }

        let bundler = Arc::clone(&self.bundler);
        let specifier = specifier.to_string();
        let previous = containing.to_path_buf();
        MaybeDeferred::deferred(async move {
            tracing::debug!(specifier = %specifier, "Delegating resolution to bundler");
            bundler
                .resolve(&previous, &specifier)
                .await
                .map_err(|e| ImportError::ResolverFailed(e.to_string()))
        })
    }
}
