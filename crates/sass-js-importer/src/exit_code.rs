/*
 * exit_code.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Exit codes of the sass-js-loader child process.
 *
 * The exit code is the only channel for the outcome of a module load:
 * stdout carries the JSON payload on success and stderr a single
 * diagnostic line on failure.
 */

/// Outcome of one `sass-js-loader` run, as reported through its exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderExitCode {
    /// JSON was written to stdout
    Ok = 0,
    /// The module path argument was not absolute
    InvalidPath = 1,
    /// Nothing exists at the module path
    FileNotFound = 2,
    /// Loading or evaluating the module failed
    ImportFailed = 3,
    /// The module has no default export
    NoDefaultExport = 4,
    /// The default export could not be encoded as JSON
    DataSerializationFailed = 5,
}

impl LoaderExitCode {
    /// All codes, in numeric order.
    pub const ALL: [LoaderExitCode; 6] = [
        LoaderExitCode::Ok,
        LoaderExitCode::InvalidPath,
        LoaderExitCode::FileNotFound,
        LoaderExitCode::ImportFailed,
        LoaderExitCode::NoDefaultExport,
        LoaderExitCode::DataSerializationFailed,
    ];

    /// The numeric process exit code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a process exit status code back to a loader outcome.
    ///
    /// `None` (the process was killed by a signal) and codes outside the
    /// taxonomy both yield `None`.
    pub fn from_status(status: Option<i32>) -> Option<Self> {
        let status = status?;
        Self::ALL.into_iter().find(|code| code.code() == status)
    }
}

impl From<LoaderExitCode> for std::process::ExitCode {
    fn from(code: LoaderExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
