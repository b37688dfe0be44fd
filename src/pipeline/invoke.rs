//! External renderer invocation.
//!
//! Renderers are opaque executables that read a path or URL from their argv
//! and write the result to stdout. [`ProcessInvoker`] runs them with an
//! explicit argument vector (never through a shell), no stdin, and both
//! output pipes drained concurrently until exit.
//!
//! ## Limits
//!
//! * Each process gets `render_timeout`; on expiry it is killed and the step
//!   fails with [`ServiceError::ProcessTimeout`].
//! * A semaphore caps the number of live renderer processes at
//!   `max_concurrent_renders`; further steps wait for a permit.
//! * `kill_on_drop` ties the child to the request future, so a client
//!   disconnect terminates the render.

use crate::config::{ServiceConfig, StderrPolicy};
use crate::error::ServiceError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Longest stderr excerpt copied into logs and error details.
const STDERR_EXCERPT: usize = 2048;

/// One external process run: what to execute and with which arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
}

impl RendererInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone)]
pub struct InvocationOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn from_output(stdout: Vec<u8>, stderr: Vec<u8>, status: ExitStatus) -> Self {
        Self {
            stdout,
            stderr,
            exit_code: status.code(),
        }
    }
}

/// Runs renderer processes on behalf of the pipeline.
#[async_trait]
pub trait RendererInvoker: Send + Sync {
    /// Run one invocation to completion and apply the output policy.
    ///
    /// Returns `Ok` only when stdout is usable.
    async fn invoke(&self, invocation: &RendererInvocation) -> Result<InvocationOutput, ServiceError>;
}

/// Decides whether a finished process produced a usable result.
#[derive(Debug, Clone, Copy)]
pub struct OutputPolicy {
    pub stderr: StderrPolicy,
}

impl OutputPolicy {
    /// Log diagnostics, then accept or reject the output.
    pub fn check(
        &self,
        invocation: &RendererInvocation,
        output: InvocationOutput,
    ) -> Result<InvocationOutput, ServiceError> {
        let program = invocation.program.display();
        let stderr = excerpt(&output.stderr);

        if !output.stderr.is_empty() {
            warn!(program = %program, "Renderer stderr: {}", stderr);
        }
        if !output.success() {
            warn!(
                program = %program,
                exit_code = ?output.exit_code,
                "Renderer exited unsuccessfully"
            );
        }

        if output.stdout.is_empty() {
            return Err(ServiceError::RendererFailure {
                program: invocation.program.clone(),
                detail: format!(
                    "no output on stdout (exit code {:?}, stderr: {})",
                    output.exit_code,
                    if stderr.is_empty() { "<empty>" } else { stderr.as_str() }
                ),
            });
        }

        if self.stderr == StderrPolicy::Strict && (!output.stderr.is_empty() || !output.success())
        {
            return Err(ServiceError::RendererFailure {
                program: invocation.program.clone(),
                detail: format!(
                    "strict policy: exit code {:?}, stderr: {}",
                    output.exit_code, stderr
                ),
            });
        }

        Ok(output)
    }
}

/// Runs renderers as real child processes.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    timeout: Duration,
    permits: Arc<Semaphore>,
    policy: OutputPolicy,
}

impl ProcessInvoker {
    pub fn new(timeout: Duration, max_concurrent: usize, policy: OutputPolicy) -> Self {
        Self {
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            policy,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.render_timeout,
            config.max_concurrent_renders,
            OutputPolicy {
                stderr: config.stderr_policy,
            },
        )
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawn, drain and reap one process without applying the output policy.
    pub async fn run(&self, invocation: &RendererInvocation) -> Result<InvocationOutput, ServiceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ServiceError::Internal(format!("render semaphore closed: {e}")))?;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %invocation.program.display(),
            args = ?invocation.args,
            "Spawning renderer"
        );

        let start = Instant::now();
        let child = command.spawn().map_err(|e| ServiceError::ProcessSpawn {
            program: invocation.program.clone(),
            source: e,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ServiceError::ProcessTimeout {
                program: invocation.program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|e| ServiceError::Internal(format!("waiting for renderer: {e}")))?;

        debug!(
            program = %invocation.program.display(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Renderer finished in {}ms",
            start.elapsed().as_millis()
        );

        Ok(InvocationOutput::from_output(
            output.stdout,
            output.stderr,
            output.status,
        ))
    }
}

#[async_trait]
impl RendererInvoker for ProcessInvoker {
    async fn invoke(&self, invocation: &RendererInvocation) -> Result<InvocationOutput, ServiceError> {
        let output = self.run(invocation).await?;
        self.policy.check(invocation, output)
    }
}

fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.chars().count() > STDERR_EXCERPT {
        let cut: String = text.chars().take(STDERR_EXCERPT).collect();
        format!("{cut}\u{2026}")
    } else {
        text.to_string()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn invoker(policy: StderrPolicy) -> ProcessInvoker {
        ProcessInvoker::new(Duration::from_secs(10), 4, OutputPolicy { stderr: policy })
    }

    fn sh(script: &str) -> RendererInvocation {
        RendererInvocation::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = invoker(StderrPolicy::Tolerate)
            .invoke(&sh("printf '%%PDF-1.4 fake'"))
            .await
            .unwrap();
        assert_eq!(out.stdout, b"%PDF-1.4 fake");
        assert!(out.stderr.is_empty());
        assert_eq!(out.exit_code, Some(0));
    }

    #[tokio::test]
    async fn args_are_not_shell_interpreted() {
        let marker = tempfile::tempdir().unwrap();
        let victim = marker.path().join("victim");
        std::fs::write(&victim, b"keep me").unwrap();
        let hostile = format!("https://example.com; rm -f {}", victim.display());

        // printf echoes the argument; a shell would run the rm.
        let inv = RendererInvocation::new("printf").arg("%s").arg(&hostile);
        let out = invoker(StderrPolicy::Tolerate).invoke(&inv).await.unwrap();

        assert_eq!(out.stdout, hostile.as_bytes());
        assert!(victim.exists());
    }

    #[tokio::test]
    async fn env_overrides_reach_child() {
        let inv = sh("printf '%s|%s' \"$DISPLAY\" \"$XDG_RUNTIME_DIR\"")
            .env("DISPLAY", ":42")
            .env("XDG_RUNTIME_DIR", "/tmp/");
        let out = invoker(StderrPolicy::Tolerate).invoke(&inv).await.unwrap();
        assert_eq!(out.stdout, b":42|/tmp/");
    }

    #[tokio::test]
    async fn stderr_with_stdout_is_tolerated_by_default() {
        let out = invoker(StderrPolicy::Tolerate)
            .invoke(&sh("echo warning >&2; printf data; exit 1"))
            .await
            .unwrap();
        assert_eq!(out.stdout, b"data");
        assert_eq!(out.exit_code, Some(1));
        assert!(!out.stderr.is_empty());
    }

    #[tokio::test]
    async fn strict_policy_rejects_stderr() {
        let err = invoker(StderrPolicy::Strict)
            .invoke(&sh("echo warning >&2; printf data"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RendererFailure { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_stdout_is_renderer_failure() {
        let err = invoker(StderrPolicy::Tolerate)
            .invoke(&sh("echo 'failed to load' >&2; exit 1"))
            .await
            .unwrap_err();
        match err {
            ServiceError::RendererFailure { detail, .. } => {
                assert!(detail.contains("failed to load"), "got {detail}")
            }
            other => panic!("expected RendererFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let inv = RendererInvocation::new("/definitely/not/a/renderer");
        let err = invoker(StderrPolicy::Tolerate).invoke(&inv).await.unwrap_err();
        assert!(matches!(err, ServiceError::ProcessSpawn { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn hung_process_times_out() {
        let invoker = ProcessInvoker::new(
            Duration::from_millis(200),
            1,
            OutputPolicy {
                stderr: StderrPolicy::Tolerate,
            },
        );
        let start = Instant::now();
        let err = invoker.invoke(&sh("sleep 30")).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::ProcessTimeout { timeout, .. } if timeout == Duration::from_millis(200)),
            "got {err:?}"
        );
        assert!(err.to_string().contains("200ms"), "got: {err}");
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(invoker.available_permits(), 1);
    }

    #[tokio::test]
    async fn concurrency_is_capped() {
        let invoker = ProcessInvoker::new(
            Duration::from_secs(10),
            2,
            OutputPolicy {
                stderr: StderrPolicy::Tolerate,
            },
        );
        let dir = tempfile::tempdir().unwrap();
        // Each process records itself, checks how many peers are live, then leaves.
        let script = format!(
            "touch {d}/$$; n=$(ls {d} | wc -l); sleep 0.2; rm {d}/$$; printf \"$n\"",
            d = dir.path().display()
        );

        let runs: Vec<_> = (0..6)
            .map(|_| {
                let invoker = invoker.clone();
                let inv = sh(&script);
                tokio::spawn(async move { invoker.invoke(&inv).await.unwrap() })
            })
            .collect();

        for r in runs {
            let out = r.await.unwrap();
            let peers: usize = String::from_utf8(out.stdout).unwrap().trim().parse().unwrap();
            assert!(peers <= 2, "saw {peers} concurrent renderers");
        }
    }

    #[test]
    fn excerpt_truncates_long_stderr() {
        let long = vec![b'x'; STDERR_EXCERPT + 100];
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), STDERR_EXCERPT + 1);
        assert!(e.ends_with('\u{2026}'));
    }
}
