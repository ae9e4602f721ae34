//! Ghostscript-backed compressor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::{build_args, DEFAULT_COMPATIBILITY_LEVEL};
use crate::error::{CompressError, CompressResult};
use crate::locator::ToolLocator;
use crate::runner::{run_checked, ProcessRunner, ToolRunner};
use crate::{CompressionJob, Compressor};

/// Compresses PDFs by re-distilling them through Ghostscript's `pdfwrite`
#[derive(Clone)]
pub struct Ghostscript {
    program: PathBuf,
    compatibility_level: String,
    runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for Ghostscript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ghostscript")
            .field("program", &self.program)
            .field("compatibility_level", &self.compatibility_level)
            .finish()
    }
}

impl Ghostscript {
    /// Use the executable at `program` as-is
    pub fn at(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            compatibility_level: DEFAULT_COMPATIBILITY_LEVEL.to_string(),
            runner: Arc::new(ProcessRunner),
        }
    }

    /// Find Ghostscript on `PATH` under the platform's usual names
    pub fn locate() -> CompressResult<Self> {
        Self::locate_with(&ToolLocator::default())
    }

    pub fn locate_with(locator: &ToolLocator) -> CompressResult<Self> {
        match locator.locate() {
            Some(program) => Ok(Self::at(program)),
            None => Err(CompressError::ToolNotFound {
                searched: locator.names().join(", "),
            }),
        }
    }

    pub fn with_compatibility_level(mut self, level: impl Into<String>) -> Self {
        self.compatibility_level = level.into();
        self
    }

    /// Swap the process runner, e.g. for a recording fake in tests
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Compress an in-memory PDF.
    ///
    /// The bytes go through a private temporary directory which is removed
    /// whether or not Ghostscript succeeds.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn compress_bytes(
        &self,
        pdf_bytes: &[u8],
        quality: crate::Quality,
    ) -> CompressResult<Vec<u8>> {
        let tmp = tempfile::tempdir()?;
        let input = tmp.path().join("input.pdf");
        let output = tmp.path().join("output.pdf");
        std::fs::write(&input, pdf_bytes)?;

        self.compress(&CompressionJob {
            input,
            output: output.clone(),
            quality,
        })?;

        Ok(std::fs::read(&output)?)
    }
}

impl Compressor for Ghostscript {
    fn name(&self) -> &str {
        "ghostscript"
    }

    fn compress(&self, job: &CompressionJob) -> CompressResult<()> {
        let args = build_args(
            &job.input,
            &job.output,
            job.quality,
            &self.compatibility_level,
        )?;
        run_checked(self.runner.as_ref(), &self.program, &args, &job.output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ToolOutput;
    use crate::Quality;
    use std::ffi::OsString;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records invocations and writes the output file like a real run would
    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<Vec<OsString>>>,
        exit_code: i32,
    }

    impl ToolRunner for FakeRunner {
        fn run(&self, _program: &Path, args: &[OsString]) -> io::Result<ToolOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            if self.exit_code == 0 {
                let out = args
                    .iter()
                    .filter_map(|a| a.to_str())
                    .find_map(|a| a.strip_prefix("-sOutputFile="))
                    .unwrap();
                std::fs::write(out, b"%PDF-1.4 small").unwrap();
            }
            Ok(ToolOutput {
                code: Some(self.exit_code),
                stdout: String::new(),
                stderr: if self.exit_code == 0 {
                    String::new()
                } else {
                    "Unrecoverable error".to_string()
                },
                elapsed: Duration::ZERO,
            })
        }
    }

    #[test]
    fn test_locate_reports_searched_names() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ToolLocator::new()
            .with_names(["gswin64c", "gs"])
            .with_search_path(dir.path());
        match Ghostscript::locate_with(&locator) {
            Err(CompressError::ToolNotFound { searched }) => assert_eq!(searched, "gswin64c, gs"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_compress_passes_compatibility_level() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.pdf");
        std::fs::write(&input, b"%PDF-1.7 big").unwrap();
        let runner = Arc::new(FakeRunner::default());
        let gs = Ghostscript::at("/usr/bin/gs")
            .with_compatibility_level("1.6")
            .with_runner(runner.clone());

        gs.compress(&CompressionJob {
            input,
            output: dir.path().join("a_compressed.pdf"),
            quality: Quality::Printer,
        })
        .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&OsString::from("-dCompatibilityLevel=1.6")));
        assert!(calls[0].contains(&OsString::from("-dPDFSETTINGS=/printer")));
    }

    #[test]
    fn test_compress_failure_surfaces_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.pdf");
        std::fs::write(&input, b"garbage").unwrap();
        let runner = Arc::new(FakeRunner {
            exit_code: 1,
            ..Default::default()
        });
        let gs = Ghostscript::at("gs").with_runner(runner);

        let err = gs
            .compress(&CompressionJob {
                input,
                output: dir.path().join("a_compressed.pdf"),
                quality: Quality::Ebook,
            })
            .unwrap_err();
        assert!(err.to_string().contains("Unrecoverable error"));
    }

    #[test]
    fn test_compress_bytes_round_trips_through_tempdir() {
        let runner = Arc::new(FakeRunner::default());
        let gs = Ghostscript::at("gs").with_runner(runner.clone());

        let out = gs.compress_bytes(b"%PDF-1.7 big", Quality::Screen).unwrap();
        assert_eq!(out, b"%PDF-1.4 small");

        let calls = runner.calls.lock().unwrap();
        let input = PathBuf::from(calls[0].last().unwrap());
        assert!(!input.exists(), "temporary input should be cleaned up");
    }
}
