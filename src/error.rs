use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for PDF compression operations
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Ghostscript not found on the search path (tried: {searched})")]
    ToolNotFound { searched: String },

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Output path is the same file as the input: {0}")]
    OutputIsInput(PathBuf),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed ({status}): {diagnostics}")]
    InvocationFailed {
        program: PathBuf,
        status: String,
        diagnostics: String,
    },

    #[error("{program} exited successfully but did not create {output}")]
    OutputMissing { program: PathBuf, output: PathBuf },

    #[error("Failed to load PDF: {0}")]
    LoadError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("PDF has no pages: {0}")]
    NoPages(String),

    #[error("Unknown quality preset '{0}' (expected screen, ebook, printer or prepress)")]
    InvalidQuality(String),

    #[error("A batch run is already in progress")]
    RunInProgress,

    #[error("Batch worker thread panicked")]
    WorkerPanicked,

    #[error("Failed to scan folder: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type CompressResult<T> = Result<T, CompressError>;
