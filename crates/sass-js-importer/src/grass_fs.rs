//! Lets grass compile stylesheets that `@import` JavaScript data modules.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! grass has no importer hook; imports go through its `Fs` trait, and grass
//! replaces the last extension of an import before probing for stylesheets.
//! [`JsImportFs`] therefore rewrites `@import "theme.mjs"` to
//! `@import "theme.mjs.jsmodule"` in every stylesheet it reads. grass then
//! looks for `theme.mjs.scss`, which is answered from exactly `theme.mjs`.
//!
//! Only imports naming a `.js`, `.mjs` or `.cjs` file are served. There is no
//! extension guessing, so `@import "variables"` never reaches a module.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};

use grass::{Options, OutputStyle};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{CompileError, ImportError};
use crate::importer::{CanonicalizeContext, JsImporter, Syntax};
use crate::resolver::{Resolve, is_js_file};

/// Extension appended to module imports so grass keeps the real one.
const MODULE_IMPORT_EXTENSION: &str = "jsmodule";

static IMPORT_RULE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@import\b[^;{}]*").unwrap());

// `url(...)` is matched first so plain CSS imports are left alone.
static MODULE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\([^)]*\)|"([^"\r\n]*\.[mc]?js)"|'([^'\r\n]*\.[mc]?js)'"#).unwrap()
});

/// Mark the module imports in `source` so grass looks for `<module>.scss`.
fn mark_module_imports(source: &str) -> Cow<'_, str> {
    IMPORT_RULE_RE.replace_all(source, |rule: &Captures| {
        MODULE_URL_RE
            .replace_all(&rule[0], |url: &Captures| {
                let quoted = url
                    .get(1)
                    .map(|path| ('"', path))
                    .or_else(|| url.get(2).map(|path| ('\'', path)));
                match quoted {
                    Some((quote, path)) if !is_remote(path.as_str()) => format!(
                        "{quote}{}.{}{quote}",
                        path.as_str(),
                        MODULE_IMPORT_EXTENSION
                    ),
                    _ => url[0].to_string(),
                }
            })
            .into_owned()
    })
}

fn is_remote(url: &str) -> bool {
    url.starts_with("//") || url.contains("://")
}

/// `grass::Fs` adapter serving module data as stylesheets.
///
/// Real files always come from the wrapped filesystem.
pub struct JsImportFs<'a, R> {
    inner: &'a dyn grass::Fs,
    importer: &'a JsImporter<R>,
}

impl<'a, R: Resolve> JsImportFs<'a, R> {
    pub fn new(inner: &'a dyn grass::Fs, importer: &'a JsImporter<R>) -> Self {
        Self { inner, importer }
    }

    /// The module standing behind a stylesheet candidate, if any.
    ///
    /// Only `<name>.<js extension>.scss` qualifies, and only when exactly
    /// `<name>.<js extension>` exists.
    fn module_for(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.extension() != Some(OsStr::new(Syntax::Scss.extension())) {
            return None;
        }
        let stem = candidate.file_stem()?.to_str()?;
        if stem.starts_with('_') || !is_js_file(stem) {
            return None;
        }
        let module = candidate.with_file_name(stem);
        self.inner.is_file(&module).then_some(module)
    }

    fn load_module(&self, module: &Path) -> Result<String, ImportError> {
        let module = std::path::absolute(module).map_err(|e| {
            ImportError::InvalidPath(format!("{}: {}", module.display(), e))
        })?;
        let specifier = module.to_string_lossy();
        let context = CanonicalizeContext::from_path(&module);

        let url = self
            .importer
            .canonicalize(&specifier, &context)
            .wait()?
            .ok_or_else(|| {
                ImportError::FileNotFound(format!("File does not exist: {}", module.display()))
            })?;
        Ok(self.importer.load(&url)?.contents)
    }
}

impl<R> Debug for JsImportFs<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsImportFs")
            .field("inner", &self.inner)
            .field("importer", &"<JsImporter>")
            .finish()
    }
}

impl<R: Resolve> grass::Fs for JsImportFs<'_, R> {
    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(path) || self.module_for(path).is_some()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        if self.inner.is_file(path) {
            let bytes = self.inner.read(path)?;
            return Ok(match String::from_utf8(bytes) {
                Ok(source) => mark_module_imports(&source).into_owned().into_bytes(),
                Err(e) => e.into_bytes(),
            });
        }
        match self.module_for(path) {
            Some(module) => {
                tracing::debug!(stylesheet = %path.display(), module = %module.display(), "Serving module as stylesheet");
                self.load_module(&module)
                    .map(String::into_bytes)
                    .map_err(|e| io::Error::other(e.to_string()))
            }
            None => self.inner.read(path),
        }
    }
}

/// Compile the stylesheet at `path`, resolving module imports with `importer`.
pub fn compile_file<R: Resolve>(
    path: &Path,
    importer: &JsImporter<R>,
    load_paths: &[PathBuf],
) -> Result<String, CompileError> {
    let std_fs = grass::StdFs;
    let fs = JsImportFs::new(&std_fs, importer);

    let options = Options::default()
        .fs(&fs)
        .load_paths(load_paths)
        .style(OutputStyle::Expanded);

    grass::from_path(path, &options).map_err(CompileError::from)
}
