//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Scratch directory holding config, data and input files for one `oasm` run.
pub struct Workspace {
    dir: TempDir,
}

/// Captured result of an `oasm` invocation.
#[derive(Debug)]
pub struct RunResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn stdout_json(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|err| panic!("stdout is not JSON ({err}):\n{}", self.stdout))
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `value` as pretty JSON under `name` and return its path.
    pub fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.path(name);
        let text = serde_json::to_string_pretty(value).expect("serialize fixture");
        std::fs::write(&path, text).expect("write fixture");
        path
    }

    pub fn read_json(&self, path: &Path) -> Value {
        let text = std::fs::read_to_string(path).expect("read output");
        serde_json::from_str(&text).expect("parse output")
    }

    pub fn run<I, S>(&self, args: I) -> RunResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = Command::new(env!("CARGO_BIN_EXE_oasm"))
            .args(args)
            .current_dir(self.dir.path())
            .env("RUST_LOG", "warn")
            .output()
            .expect("run oasm");
        RunResult::from_output(output)
    }
}
