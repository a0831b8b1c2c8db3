//! Typed external process invocation.
//!
//! Every tool call goes through [`Invocation`]: explicit arguments, stderr
//! captured for diagnostics, a hard timeout, and uniform mapping of exit
//! status and missing output to [`RenderError::RenderFailed`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{FailureReason, RenderError, RenderResult, Stage};

/// Number of trailing stderr lines kept as diagnostics.
const DIAGNOSTIC_LINES: usize = 40;

/// A completed, successful invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Trailing stderr lines.
    pub diagnostics: String,
    /// Wall-clock run time.
    pub elapsed: Duration,
}

/// One external tool call that must produce one output file.
#[derive(Debug, Clone)]
pub struct Invocation {
    stage: Stage,
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
    output: PathBuf,
}

impl Invocation {
    /// Creates an invocation of `program` expected to write `output`.
    pub fn new(stage: Stage, program: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            output: output.into(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the time limit.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The arguments, in order.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// The file the process must produce.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Runs the process to completion.
    ///
    /// The child is killed if it outlives the timeout or if the returned
    /// future is dropped.
    pub async fn run(&self) -> RenderResult<ProcessOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!(
            "Running {} for {}: {:?}",
            self.program.display(),
            self.stage,
            self.args
        );

        let started = Instant::now();
        let child = cmd.spawn().map_err(|source| {
            RenderError::failed(
                self.stage,
                FailureReason::SpawnFailed {
                    program: self.program.display().to_string(),
                    source,
                },
            )
        })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(self.wait_failure(source)),
            Err(_) => {
                log::warn!(
                    "{} timed out after {}s; process killed",
                    self.stage,
                    self.timeout.as_secs()
                );
                return Err(RenderError::failed(
                    self.stage,
                    FailureReason::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    },
                ));
            }
        };
        let elapsed = started.elapsed();
        let diagnostics = diagnostic_tail(&output.stderr);

        if !output.status.success() {
            log::warn!(
                "{} exited with {:?}: {}",
                self.stage,
                output.status.code(),
                diagnostics
            );
            return Err(self.failure(
                FailureReason::ExitStatus {
                    code: output.status.code(),
                },
                diagnostics,
            ));
        }

        match std::fs::metadata(&self.output) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            Ok(meta) if meta.is_file() => {
                return Err(self.failure(
                    FailureReason::OutputEmpty {
                        path: self.output.clone(),
                    },
                    diagnostics,
                ));
            }
            _ => {
                return Err(self.failure(
                    FailureReason::OutputMissing {
                        path: self.output.clone(),
                    },
                    diagnostics,
                ));
            }
        }

        Ok(ProcessOutput {
            diagnostics,
            elapsed,
        })
    }

    fn wait_failure(&self, source: std::io::Error) -> RenderError {
        log::warn!("Lost track of {} for {}: {}", self.program.display(), self.stage, source);
        self.failure(
            FailureReason::WaitFailed {
                program: self.program.display().to_string(),
                source,
            },
            String::new(),
        )
    }

    fn failure(&self, reason: FailureReason, diagnostics: String) -> RenderError {
        RenderError::RenderFailed {
            stage: self.stage,
            reason,
            diagnostics,
        }
    }
}

/// Last lines of a process's stderr, lossily decoded.
pub fn diagnostic_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}
