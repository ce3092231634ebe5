/*
 * importer.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * The two-phase importer: canonicalize a specifier to a file URL, then load
 * that URL as SCSS.
 *
 * canonicalize declines ("not applicable", Ok(None)) anything that is not a
 * JavaScript specifier or has no file containing location, so the host can
 * hand the import to its other importers. All other failures are errors.
 */

use std::path::Path;
use std::sync::Arc;

use url::Url;

use crate::config::ImporterConfig;
use crate::deferred::MaybeDeferred;
use crate::error::ImportError;
use crate::resolver::{BundlerResolver, ExternalResolver, FsResolver, Resolve, is_js_file};
use crate::transform::ModuleTransformer;

/// Result of [`JsImporter::canonicalize`]: ready when the resolver is
/// synchronous, deferred when it is asynchronous.
pub type Canonicalized = MaybeDeferred<Result<Option<Url>, ImportError>>;

/// Stylesheet syntax of importer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// SCSS: declarations may appear at the top level without a selector block
    Scss,
}

impl Syntax {
    pub fn as_str(self) -> &'static str {
        match self {
            Syntax::Scss => "scss",
        }
    }

    /// File extension grass uses to pick the parser.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Syntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stylesheet source produced by [`JsImporter::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterResult {
    pub contents: String,
    pub syntax: Syntax,
}

/// Information about the stylesheet containing an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalizeContext {
    /// URL of the importing stylesheet, if known
    pub containing_url: Option<Url>,
}

impl CanonicalizeContext {
    pub fn new(containing_url: Option<Url>) -> Self {
        Self { containing_url }
    }

    /// Context for an import from the stylesheet at `path`. Relative paths are
    /// taken relative to the current directory.
    pub fn from_path(path: &Path) -> Self {
        let containing_url = std::path::absolute(path)
            .ok()
            .and_then(|path| Url::from_file_path(path).ok());
        Self { containing_url }
    }

    /// Filesystem path of the importing stylesheet; `None` for non-file URLs.
    pub fn containing_path(&self) -> Option<std::path::PathBuf> {
        self.containing_url
            .as_ref()
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok())
    }
}

/// Importer turning JavaScript modules into SCSS variables.
///
/// `R` decides how specifiers are found; see [`js_importer`] and
/// [`bundler_js_importer`] for the usual configurations.
#[derive(Debug, Clone)]
pub struct JsImporter<R> {
    resolver: R,
    transformer: ModuleTransformer,
}

impl<R: Resolve> JsImporter<R> {
    pub fn new(resolver: R, transformer: ModuleTransformer) -> Self {
        Self {
            resolver,
            transformer,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Resolve `specifier` to the canonical `file:` URL of a module.
    ///
    /// `Ok(None)` means this importer does not handle the specifier.
    pub fn canonicalize(&self, specifier: &str, context: &CanonicalizeContext) -> Canonicalized {
        if !is_js_file(specifier) {
            return MaybeDeferred::Ready(Ok(None));
        }
        let Some(containing) = context.containing_path() else {
            return MaybeDeferred::Ready(Ok(None));
        };

        self.resolver
            .resolve(specifier, &containing)
            .map(|resolved| resolved.and_then(|path| path.map(to_file_url).transpose()))
    }

    /// Load the module behind a canonical URL and render it as SCSS.
    ///
    /// Blocks until the loader child process exits.
    pub fn load(&self, canonical_url: &Url) -> Result<ImporterResult, ImportError> {
        let path = if canonical_url.scheme() == "file" {
            canonical_url.to_file_path().ok()
        } else {
            None
        }
        .ok_or_else(|| {
            ImportError::InvalidPath(format!("File path must be absolute: {}", canonical_url))
        })?;

        tracing::debug!(module = %path.display(), "Loading JavaScript module");
        let contents = self.transformer.transform(&path)?;

        Ok(ImporterResult {
            contents,
            syntax: Syntax::Scss,
        })
    }
}

fn to_file_url(path: std::path::PathBuf) -> Result<Url, ImportError> {
    Url::from_file_path(&path).map_err(|()| {
        ImportError::InvalidPath(format!("File path must be absolute: {}", path.display()))
    })
}

fn transformer_for(config: &ImporterConfig) -> ModuleTransformer {
    ModuleTransformer::new(config.loader.clone()).with_timeout(config.timeout)
}

/// Importer that looks for modules next to the importing stylesheet.
pub fn js_importer(config: &ImporterConfig) -> JsImporter<FsResolver> {
    JsImporter::new(FsResolver, transformer_for(config))
}

/// Importer for bundler integrations: looks next to the importing stylesheet
/// first, then asks the bundler. Canonicalization is always deferred.
pub fn bundler_js_importer(
    config: &ImporterConfig,
    bundler: Arc<dyn BundlerResolver>,
) -> JsImporter<ExternalResolver> {
    JsImporter::new(ExternalResolver::new(bundler), transformer_for(config))
}
