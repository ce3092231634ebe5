/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Module loading on an embedded V8 runtime (deno_core).
 *
 * A small generated ES module does the work inside V8: it imports the target
 * (or evaluates it as CommonJS), checks for a default export and runs
 * JSON.stringify on it, then leaves a tagged outcome object on globalThis.
 * Rust reads that object back once the event loop has drained.
 *
 * CommonJS gets a minimal `require`: relative or absolute paths to .js, .cjs
 * and .json files, cached per load. Package names are not resolved.
 *
 * deno_core/V8 types MUST NOT leak out of this module.
 */

use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use deno_core::v8;
use deno_core::{
    FsModuleLoader, JsRuntime, ModuleSpecifier, PollEventLoopOptions, RuntimeOptions, op2,
};
use serde::Deserialize;

use crate::error::LoadFailure;

/// Name of the generated entry module, placed next to the target so relative
/// paths in error messages stay meaningful.
const ENTRY_MODULE_NAME: &str = "__sass_js_loader__.mjs";

/// Global the entry module writes its outcome to.
const RESULT_GLOBAL: &str = "globalThis.__sassJsLoadResult";

/// Extensions tried, in order, for a `require()` path without one.
const REQUIRE_EXTENSIONS: [&str; 3] = ["js", "cjs", "json"];

/// Entry module source. `__LOAD__` is replaced with the body of an async
/// function returning the target's module namespace.
const ENTRY_TEMPLATE: &str = r#"
const ops = globalThis.Deno.core.ops;
const commonJsCache = new Map();

const makeRequire = (from) => (specifier) => {
  const resolved = ops.op_sass_js_require_resolve(from, String(specifier));
  if (resolved === null) {
    throw new Error(`Cannot find module '${specifier}' required from ${from}`);
  }
  return loadCommonJs(resolved);
};

const loadCommonJs = (filename) => {
  const cached = commonJsCache.get(filename);
  if (cached !== undefined) {
    return cached.exports;
  }
  const source = ops.op_sass_js_read_source(filename);
  if (source === null) {
    throw new Error(`Cannot read module ${filename}`);
  }
  const module = { exports: {} };
  commonJsCache.set(filename, module);
  try {
    if (filename.endsWith(".json")) {
      module.exports = JSON.parse(source);
    } else {
      const dirname = filename.slice(
        0,
        Math.max(filename.lastIndexOf("/"), filename.lastIndexOf("\\")),
      );
      new Function("module", "exports", "require", "__filename", "__dirname", source)(
        module,
        module.exports,
        makeRequire(filename),
        filename,
        dirname,
      );
    }
  } catch (e) {
    commonJsCache.delete(filename);
    throw e;
  }
  return module.exports;
};

const isCommonJsReference = (e) =>
  e instanceof ReferenceError &&
  /^(module|exports|require|__filename|__dirname) is not defined$/.test(e.message);

const describe = (e) => {
  try {
    return e instanceof Error ? `${e.name}: ${e.message}` : String(e);
  } catch {
    return "unknown error";
  }
};
const report = (outcome) => {
  globalThis.__sassJsLoadResult = outcome;
};

let ns;
try {
  ns = await (async () => {
    __LOAD__
  })();
} catch (e) {
  ns = undefined;
  report({ status: "import-failed", error: describe(e) });
}

if (ns !== undefined) {
  if (ns === null || typeof ns !== "object" || !("default" in ns)) {
    report({ status: "no-default-export" });
  } else {
    let json;
    let error = "JSON.stringify did not produce a string";
    try {
      json = JSON.stringify(ns.default);
    } catch (e) {
      error = describe(e);
    }
    if (typeof json === "string") {
      report({ status: "ok", json });
    } else {
      report({ status: "serialization-failed", error });
    }
  }
}
"#;

/// Outcome object written by the entry module.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum EntryOutcome {
    Ok { json: String },
    ImportFailed { error: String },
    NoDefaultExport,
    SerializationFailed { error: String },
}

/// How the target module is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModuleFormat {
    /// ES module, loaded with dynamic `import()`
    EsModule,
    /// CommonJS, `module.exports` is the default export
    CommonJs,
    /// `.js` without a package `"type"`: imported as an ES module, retried as
    /// CommonJS when it trips over `module`, `exports` or `require`
    Detect,
}

impl ModuleFormat {
    pub(crate) fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("cjs") => ModuleFormat::CommonJs,
            Some("mjs") => ModuleFormat::EsModule,
            _ => match package_type(path).as_deref() {
                Some("module") => ModuleFormat::EsModule,
                Some("commonjs") => ModuleFormat::CommonJs,
                _ => ModuleFormat::Detect,
            },
        }
    }
}

/// The `"type"` field of the nearest `package.json` above `path`.
fn package_type(path: &Path) -> Option<String> {
    let manifest = path
        .ancestors()
        .skip(1)
        .map(|dir| dir.join("package.json"))
        .find(|candidate| candidate.is_file())?;
    let text = std::fs::read_to_string(&manifest).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&text).ok()?;
    manifest.get("type")?.as_str().map(str::to_string)
}

/// Resolve a `require()` specifier against the file that calls it.
fn resolve_require(from: &Path, specifier: &str) -> Option<PathBuf> {
    let is_relative = specifier.starts_with("./") || specifier.starts_with("../");
    if !is_relative && !Path::new(specifier).is_absolute() {
        return None;
    }
    let base = normalize(&from.parent()?.join(specifier));
    if base.is_file() {
        return Some(base);
    }
    REQUIRE_EXTENSIONS
        .iter()
        .map(|ext| {
            let mut candidate = base.clone().into_os_string();
            candidate.push(".");
            candidate.push(ext);
            PathBuf::from(candidate)
        })
        .find(|candidate| candidate.is_file())
}

/// Drop `.` and fold `..` so one file has one cache key.
fn normalize(path: &Path) -> PathBuf {
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

#[op2]
#[string]
fn op_sass_js_require_resolve(#[string] from: String, #[string] specifier: String) -> Option<String> {
    resolve_require(Path::new(&from), &specifier).map(|path| path.to_string_lossy().into_owned())
}

#[op2]
#[string]
fn op_sass_js_read_source(#[string] path: String) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

deno_core::extension!(
    sass_js_commonjs,
    ops = [op_sass_js_require_resolve, op_sass_js_read_source]
);

/// A V8 runtime that loads one module.
///
/// Each engine owns a fresh `JsRuntime`, so nothing a module does can leak
/// into the next load.
pub(crate) struct ModuleEngine {
    runtime: JsRuntime,
}

impl ModuleEngine {
    pub(crate) fn new() -> Self {
        let runtime = JsRuntime::new(RuntimeOptions {
            module_loader: Some(Rc::new(FsModuleLoader)),
            extensions: vec![sass_js_commonjs::init()],
            ..Default::default()
        });
        Self { runtime }
    }

    /// Load the module at `path` (absolute, existing) and return its default
    /// export as JSON text.
    pub(crate) async fn load_default_export(&mut self, path: &Path) -> Result<String, LoadFailure> {
        let target = ModuleSpecifier::from_file_path(path)
            .map_err(|()| LoadFailure::invalid_path(path))?;
        let entry = ModuleSpecifier::from_file_path(path.with_file_name(ENTRY_MODULE_NAME))
            .map_err(|()| LoadFailure::invalid_path(path))?;

        let format = ModuleFormat::for_path(path);
        tracing::debug!(module = %target, ?format, "Loading module");

        let source = entry_source(path, &target, format)?;
        self.evaluate_entry(&entry, source)
            .await
            .map_err(|reason| LoadFailure::import_failed(path, reason))?;

        match self.read_outcome().map_err(|reason| LoadFailure::import_failed(path, reason))? {
            EntryOutcome::Ok { json } => Ok(json),
            EntryOutcome::ImportFailed { error } => Err(LoadFailure::import_failed(path, error)),
            EntryOutcome::NoDefaultExport => Err(LoadFailure::no_default_export(path)),
            EntryOutcome::SerializationFailed { error } => {
                Err(LoadFailure::serialization_failed(path, error))
            }
        }
    }

    async fn evaluate_entry(&mut self, entry: &ModuleSpecifier, source: String) -> Result<(), String> {
        let module_id = self
            .runtime
            .load_main_es_module_from_code(entry, source)
            .await
            .map_err(|e| e.to_string())?;

        let evaluation = self.runtime.mod_evaluate(module_id);
        self.runtime
            .run_event_loop(PollEventLoopOptions::default())
            .await
            .map_err(|e| e.to_string())?;
        evaluation.await.map_err(|e| e.to_string())
    }

    fn read_outcome(&mut self) -> Result<EntryOutcome, String> {
        let global = self
            .runtime
            .execute_script("<outcome>", RESULT_GLOBAL.to_string())
            .map_err(|e| format!("Failed to read load outcome: {}", e))?;

        deno_core::scope!(scope, self.runtime);
        let local = v8::Local::new(scope, global);

        let value: serde_json::Value = serde_v8::from_v8(scope, local)
            .map_err(|e| format!("Failed to deserialize load outcome: {}", e))?;
        if value.is_null() {
            return Err("module loader produced no outcome".to_string());
        }
        serde_json::from_value(value).map_err(|e| format!("Unexpected load outcome: {}", e))
    }
}

/// Build the entry module for `target`.
fn entry_source(
    path: &Path,
    target: &ModuleSpecifier,
    format: ModuleFormat,
) -> Result<String, LoadFailure> {
    let url = serde_json::to_string(target.as_str())
        .map_err(|e| LoadFailure::import_failed(path, e))?;
    let filename = serde_json::to_string(&path.to_string_lossy())
        .map_err(|e| LoadFailure::import_failed(path, e))?;

    let load = match format {
        ModuleFormat::EsModule => format!("return await import({});", url),
        ModuleFormat::CommonJs => format!("return {{ default: loadCommonJs({}) }};", filename),
        ModuleFormat::Detect => format!(
            "try {{\n      return await import({url});\n    \
             }} catch (e) {{\n      \
               if (!isCommonJsReference(e)) throw e;\n      \
               return {{ default: loadCommonJs({filename}) }};\n    \
             }}"
        ),
    };
    Ok(ENTRY_TEMPLATE.replace("__LOAD__", &load))
}
