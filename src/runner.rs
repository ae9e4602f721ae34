//! Synchronous execution of the external tool.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{CompressError, CompressResult};

/// Captured result of one process invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Text to show the user when the tool failed
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }

    fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs an external program to completion.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ToolOutput>;
}

/// [`ToolRunner`] backed by `std::process::Command`.
///
/// Blocks until the child exits; there is no timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ToolOutput> {
        let started = Instant::now();
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: started.elapsed(),
        })
    }
}

/// Run `program` and require both a zero exit and an output file on disk.
pub fn run_checked(
    runner: &dyn ToolRunner,
    program: &Path,
    args: &[OsString],
    output_path: &Path,
) -> CompressResult<ToolOutput> {
    log::debug!("Running {} {:?}", program.display(), args);

    let output = runner
        .run(program, args)
        .map_err(|source| CompressError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    check_output(program, &output, output_path)?;

    log::debug!(
        "{} finished in {:.2}s",
        program.display(),
        output.elapsed.as_secs_f64()
    );
    Ok(output)
}

/// Map a finished invocation onto success or a typed failure
pub fn check_output(program: &Path, output: &ToolOutput, output_path: &Path) -> CompressResult<()> {
    if !output.success() {
        return Err(CompressError::InvocationFailed {
            program: program.to_path_buf(),
            status: output.status_text(),
            diagnostics: output.diagnostics(),
        });
    }
    if !output_path.exists() {
        return Err(CompressError::OutputMissing {
            program: program.to_path_buf(),
            output: output_path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, stderr: &str) -> ToolOutput {
        ToolOutput {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_output(
            Path::new("gs"),
            &output(Some(1), "Error: /undefined in startxref\n"),
            &dir.path().join("out.pdf"),
        )
        .unwrap_err();

        match err {
            CompressError::InvocationFailed {
                status,
                diagnostics,
                ..
            } => {
                assert_eq!(status, "exit code 1");
                assert_eq!(diagnostics, "Error: /undefined in startxref");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_signal_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_output(Path::new("gs"), &output(None, ""), &dir.path().join("out.pdf"))
            .unwrap_err();
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_zero_exit_without_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_output(Path::new("gs"), &output(Some(0), ""), &dir.path().join("out.pdf"))
            .unwrap_err();
        assert!(matches!(err, CompressError::OutputMissing { .. }));
    }

    #[test]
    fn test_zero_exit_with_output_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        std::fs::write(&out, b"%PDF").unwrap();
        assert!(check_output(Path::new("gs"), &output(Some(0), ""), &out).is_ok());
    }

    #[test]
    fn test_diagnostics_fall_back_to_stdout() {
        let mut out = output(Some(1), "  ");
        out.stdout = "GPL Ghostscript: Unrecoverable error\n".to_string();
        assert_eq!(out.diagnostics(), "GPL Ghostscript: Unrecoverable error");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_captures_exit_and_stderr() {
        let out = ProcessRunner
            .run(
                Path::new("/bin/sh"),
                &[OsString::from("-c"), OsString::from("echo boom >&2; exit 3")],
            )
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stderr.trim(), "boom");
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_checked(
            &ProcessRunner,
            &dir.path().join("no-such-program"),
            &[],
            &dir.path().join("out.pdf"),
        )
        .unwrap_err();
        assert!(matches!(err, CompressError::Spawn { .. }));
    }
}
