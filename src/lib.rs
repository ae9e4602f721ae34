//! PDF Compressor Library
//!
//! Batch PDF size reduction. The actual recompression is delegated: either to
//! Ghostscript's `pdfwrite` device (run as an external process with one of
//! four quality presets) or to lopdf, which re-serializes the object graph
//! in-process. This crate locates the tool, builds its arguments, runs it,
//! and drives it over a list of files with progress and per-item results.
//! Shared between the CLI and WASM targets.

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub mod batch;
pub mod command;
pub mod error;
pub mod ghostscript;
pub mod locator;
pub mod quality;
pub mod rewrite;
pub mod runner;

use std::path::PathBuf;

pub use batch::{
    compress_batch, compress_batch_with, output_path_for, BatchList, BatchObserver, BatchOptions,
    BatchReport, BatchRunner, BatchWorker, ItemReport, ItemStatus, Progress, RunHandle, RunState,
};
pub use error::{CompressError, CompressResult};
pub use ghostscript::Ghostscript;
pub use locator::{find_ghostscript, ToolLocator};
pub use quality::{Backend, Quality};
pub use rewrite::{rewrite_pdf_bytes, LopdfRewriter, RewriteOptions};

/// One input file to shrink into one output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
}

/// Something that turns `job.input` into a smaller `job.output`.
///
/// Implementations block until the output is written or the attempt failed.
/// They never retry and never remove a partial output.
pub trait Compressor: Send + Sync {
    /// Short label for logs and reports
    fn name(&self) -> &str;

    fn compress(&self, job: &CompressionJob) -> CompressResult<()>;
}

impl<C: Compressor + ?Sized> Compressor for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compress(&self, job: &CompressionJob) -> CompressResult<()> {
        (**self).compress(job)
    }
}

impl<C: Compressor + ?Sized> Compressor for std::sync::Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compress(&self, job: &CompressionJob) -> CompressResult<()> {
        (**self).compress(job)
    }
}
