/*
 * transform.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Runs the sass-js-loader child process and turns its output into SCSS.
 *
 * The loader receives the absolute module path as its only argument. It
 * reports its outcome through the exit code (see LoaderExitCode), writes
 * the module's default export as JSON on stdout when it succeeds, and a
 * single diagnostic line on stderr when it does not.
 */

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::ImportError;
use crate::exit_code::LoaderExitCode;
use crate::scss::to_scss_variables;

/// Environment variable that may point at the loader binary.
pub const LOADER_ENV_VAR: &str = "SASS_JS_LOADER";

/// File name of the loader binary.
pub const LOADER_BINARY: &str = "sass-js-loader";

/// How often a loader with a timeout is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The loader program and the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderCommand {
    program: PathBuf,
    working_dir: Option<PathBuf>,
}

impl LoaderCommand {
    /// Run `program` from its own directory.
    ///
    /// A program given as a path is made absolute against the current
    /// directory, since the child runs from elsewhere. A bare name is left
    /// for `PATH` lookup.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let program = if program.components().count() > 1 {
            std::path::absolute(&program).unwrap_or(program)
        } else {
            program
        };
        Self {
            program,
            working_dir: None,
        }
    }

    /// Run the loader from a fixed working directory instead of its own.
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    /// Find the loader binary.
    ///
    /// Checks `SASS_JS_LOADER` first, then the directory of the current
    /// executable (and its parent, which is where cargo puts binaries next to
    /// test executables), then `PATH`. Falls back to the bare binary name, in
    /// which case spawning fails with [`ImportError::Unknown`] if it is not
    /// installed.
    pub fn locate() -> Self {
        if let Some(path) = std::env::var_os(LOADER_ENV_VAR).map(PathBuf::from) {
            if path.is_file() {
                return Self::new(path);
            }
            tracing::warn!(path = %path.display(), "{} does not name a file, ignoring", LOADER_ENV_VAR);
        }

        let binary = format!("{}{}", LOADER_BINARY, std::env::consts::EXE_SUFFIX);
        if let Ok(exe) = std::env::current_exe() {
            let sibling = exe
                .ancestors()
                .skip(1)
                .take(2)
                .map(|dir| dir.join(&binary))
                .find(|candidate| candidate.is_file());
            if let Some(path) = sibling {
                return Self::new(path);
            }
        }

        match which::which(LOADER_BINARY) {
            Ok(path) => Self::new(path),
            Err(_) => Self::new(LOADER_BINARY),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The directory the loader runs in: the configured one, or the directory
    /// containing the program. `None` for a bare program name.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref().or_else(|| {
            self.program
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
        })
    }

    fn command(&self, module_path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(module_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = self.working_dir() {
            command.current_dir(dir);
        }
        command
    }
}

/// Captured result of one loader run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl LoaderOutput {
    /// Interpret the loader's outcome and render its data as SCSS.
    pub fn into_scss(self) -> Result<String, ImportError> {
        let diagnostic = self.stderr.trim_end().to_string();

        match LoaderExitCode::from_status(self.status) {
            Some(LoaderExitCode::Ok) => {}
            Some(code) => return Err(ImportError::from_loader_exit(code, diagnostic)),
            None => {
                let status = self
                    .status
                    .map_or_else(|| "killed by signal".to_string(), |c| format!("exit {}", c));
                return Err(ImportError::Unknown(if diagnostic.is_empty() {
                    format!("module loader failed ({})", status)
                } else {
                    format!("module loader failed ({}): {}", status, diagnostic)
                }));
            }
        }

        let data: Value = serde_json::from_str(&self.stdout).map_err(|_| {
            ImportError::DataParsingFailed(format!("Failed to parse JSON data: {}", self.stdout))
        })?;

        match data {
            Value::Object(map) => Ok(to_scss_variables(&map)),
            _ => Err(ImportError::InvalidData("Data is not an object".to_string())),
        }
    }
}

/// Turns a module file into SCSS variable declarations by running the loader.
#[derive(Debug, Clone)]
pub struct ModuleTransformer {
    loader: LoaderCommand,
    timeout: Option<Duration>,
}

impl ModuleTransformer {
    pub fn new(loader: LoaderCommand) -> Self {
        Self {
            loader,
            timeout: None,
        }
    }

    /// Kill the loader and fail with [`ImportError::TimedOut`] if it runs
    /// longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn loader(&self) -> &LoaderCommand {
        &self.loader
    }

    /// Load the module at `module_path` and render its default export.
    ///
    /// Blocks the calling thread until the loader exits.
    pub fn transform(&self, module_path: &Path) -> Result<String, ImportError> {
        self.run_loader(module_path)?.into_scss()
    }

    /// Spawn the loader for `module_path` and capture its output.
    pub fn run_loader(&self, module_path: &Path) -> Result<LoaderOutput, ImportError> {
        tracing::debug!(
            loader = %self.loader.program.display(),
            module = %module_path.display(),
            "Spawning module loader"
        );

        let spawn_failed = |e: std::io::Error| {
            ImportError::Unknown(format!(
                "Failed to spawn module loader '{}': {}",
                self.loader.program.display(),
                e
            ))
        };

        let mut command = self.loader.command(module_path);

        let Some(timeout) = self.timeout else {
            let output = command.output().map_err(spawn_failed)?;
            return Ok(LoaderOutput {
                status: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        };

        let mut child = command.spawn().map_err(spawn_failed)?;
        // Drain both pipes while waiting so a chatty loader cannot block on a full pipe
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, timeout) {
            Ok(status) => status,
            Err(e) => {
                abandon(&mut child);
                return Err(spawn_failed(e));
            }
        };
        let Some(status) = status else {
            abandon(&mut child);
            tracing::warn!(module = %module_path.display(), ?timeout, "Module loader timed out");
            return Err(ImportError::TimedOut(format!(
                "Module loader did not finish within {} ms: {}",
                timeout.as_millis(),
                module_path.display()
            )));
        };

        Ok(LoaderOutput {
            status: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Kill `child` and reap it, so no loader outlives a failed transform.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Wait for `child` until `timeout` elapses. `Ok(None)` means it is still running.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ImportErrorKind;

    fn output(status: Option<i32>, stdout: &str, stderr: &str) -> LoaderOutput {
        LoaderOutput {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_success_renders_variables() {
        let scss = output(Some(0), r##"{"color":"#c33","sizes":[1,2]}"##, "")
            .into_scss()
            .unwrap();
        assert_eq!(scss, "$color: #c33;\n$sizes: (1,2,);");
    }

    #[test]
    fn test_exit_codes_map_to_errors() {
        let cases = [
            (1, ImportErrorKind::InvalidPath),
            (2, ImportErrorKind::FileNotFound),
            (3, ImportErrorKind::ImportFailed),
            (4, ImportErrorKind::NoDefaultExport),
            (5, ImportErrorKind::DataSerializationFailed),
        ];
        for (code, kind) in cases {
            let err = output(Some(code), "", "diagnostic line\n")
                .into_scss()
                .unwrap_err();
            assert_eq!(err.kind(), kind);
            assert_eq!(err.message(), "diagnostic line");
        }
    }

    #[test]
    fn test_unexpected_status_is_unknown() {
        let err = output(Some(42), "", "boom").into_scss().unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Unknown);
        assert!(err.message().contains("exit 42"));
        assert!(err.message().contains("boom"));

        let err = output(None, "", "").into_scss().unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Unknown);
        assert!(err.message().contains("killed by signal"));
    }

    #[test]
    fn test_unparseable_stdout() {
        let err = output(Some(0), "{not json", "").into_scss().unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::DataParsingFailed);
        assert_eq!(err.message(), "Failed to parse JSON data: {not json");
    }

    #[test]
    fn test_non_object_data() {
        for stdout in ["[1,2]", "\"text\"", "42", "null"] {
            let err = output(Some(0), stdout, "").into_scss().unwrap_err();
            assert_eq!(err.kind(), ImportErrorKind::InvalidData);
            assert_eq!(err.message(), "Data is not an object");
        }
    }

    #[test]
    fn test_working_dir_defaults_to_program_dir() {
        let loader = LoaderCommand::new("/opt/tools/sass-js-loader");
        assert_eq!(loader.working_dir(), Some(Path::new("/opt/tools")));

        let loader = loader.with_working_dir("/srv");
        assert_eq!(loader.working_dir(), Some(Path::new("/srv")));

        assert_eq!(LoaderCommand::new("sass-js-loader").working_dir(), None);
    }

    #[test]
    fn test_bare_program_name_is_left_for_path_lookup() {
        let loader = LoaderCommand::new("sass-js-loader");
        assert_eq!(loader.program(), Path::new("sass-js-loader"));
        assert!(LoaderCommand::new("bin/sass-js-loader").program().is_absolute());
    }

    #[test]
    fn test_spawn_failure_is_unknown() {
        let transformer =
            ModuleTransformer::new(LoaderCommand::new("/nonexistent/dir/sass-js-loader"));
        // the working directory does not exist either, so spawning fails
        let err = transformer
            .transform(Path::new("/tmp/variables.js"))
            .unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Unknown);
        assert!(err.message().contains("Failed to spawn module loader"));
    }

    #[cfg(unix)]
    pub(crate) mod with_fake_loader {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Write an executable shell script standing in for the loader.
        pub(crate) fn fake_loader(dir: &TempDir, body: &str) -> LoaderCommand {
            let path = dir.path().join("fake-loader.sh");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).unwrap();
            LoaderCommand::new(path)
        }

        #[test]
        fn test_passes_module_path_and_reads_stdout() {
            let dir = TempDir::new().unwrap();
            let loader = fake_loader(&dir, r#"printf '{"module":"%s"}' "$1""#);
            let transformer = ModuleTransformer::new(loader);

            let scss = transformer
                .transform(Path::new("/data/tokens.js"))
                .unwrap();
            assert_eq!(scss, r#"$module: "/data/tokens.js";"#);
        }

        #[test]
        fn test_runs_in_program_directory() {
            let dir = TempDir::new().unwrap();
            let loader = fake_loader(&dir, r#"printf '{"cwd":"%s"}' "$(pwd -P)""#);
            let transformer = ModuleTransformer::new(loader);

            let expected = dir.path().canonicalize().unwrap();
            let scss = transformer.transform(Path::new("/x.js")).unwrap();
            assert_eq!(scss, format!(r#"$cwd: "{}";"#, expected.display()));
        }

        #[test]
        fn test_stderr_becomes_diagnostic() {
            let dir = TempDir::new().unwrap();
            let loader = fake_loader(
                &dir,
                r#"echo "Could not import module: $1" >&2; exit 3"#,
            );
            let transformer = ModuleTransformer::new(loader);

            let err = transformer.transform(Path::new("/m/broken.js")).unwrap_err();
            assert_eq!(err, ImportError::ImportFailed("Could not import module: /m/broken.js".to_string()));
        }

        #[test]
        fn test_timeout_kills_loader() {
            let dir = TempDir::new().unwrap();
            let loader = fake_loader(&dir, "sleep 5");
            let transformer =
                ModuleTransformer::new(loader).with_timeout(Some(Duration::from_millis(100)));

            let started = Instant::now();
            let err = transformer.transform(Path::new("/slow.js")).unwrap_err();
            assert_eq!(err.kind(), ImportErrorKind::TimedOut);
            assert!(started.elapsed() < Duration::from_secs(4));
        }

        #[test]
        fn test_abandon_reaps_running_loader() {
            let dir = TempDir::new().unwrap();
            let loader = fake_loader(&dir, "sleep 5");
            let mut child = loader.command(Path::new("/slow.js")).spawn().unwrap();
            assert!(child.try_wait().unwrap().is_none());

            abandon(&mut child);
            // already reaped: the status is cached and available without blocking
            assert!(child.try_wait().unwrap().is_some());
        }

        #[test]
        fn test_relative_loader_path_is_made_absolute() {
            let dir = TempDir::new().unwrap();
            let absolute = fake_loader(&dir, r#"printf '{"ran":"%s"}' "$1""#);

            // reach the script through `..` from the current directory
            let cwd = std::env::current_dir().unwrap();
            let mut relative = PathBuf::new();
            for _ in cwd.components().skip(1) {
                relative.push("..");
            }
            relative.push(absolute.program().strip_prefix("/").unwrap());
            assert!(relative.is_relative());

            let loader = LoaderCommand::new(&relative);
            assert!(loader.program().is_absolute());

            let scss = ModuleTransformer::new(loader)
                .transform(Path::new("/data/tokens.js"))
                .unwrap();
            assert_eq!(scss, r#"$ran: "/data/tokens.js";"#);
        }

        #[test]
        fn test_fast_loader_with_timeout() {
            let dir = TempDir::new().unwrap();
            let loader = fake_loader(&dir, r#"printf '{"a":1}'"#);
            let transformer =
                ModuleTransformer::new(loader).with_timeout(Some(Duration::from_secs(10)));

            assert_eq!(transformer.transform(Path::new("/a.js")).unwrap(), "$a: 1;");
        }
    }
}
