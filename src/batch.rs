//! Batch driver: the input list, per-item jobs, progress and results.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{CompressError, CompressResult};
use crate::ghostscript::Ghostscript;
use crate::locator::ToolLocator;
use crate::quality::Quality;
use crate::runner::{ProcessRunner, ToolRunner};
use crate::{CompressionJob, Compressor};

/// Appended to the input's file stem to name the output
pub const DEFAULT_SUFFIX: &str = "_compressed";

/// Ordered list of input files with no duplicates.
///
/// Two entries are duplicates when they canonicalize to the same file, or,
/// for paths that don't exist yet, when they are literally equal.
#[derive(Debug, Clone, Default)]
pub struct BatchList {
    paths: Vec<PathBuf>,
}

impl BatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the file was already listed
    pub fn add(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let key = dedup_key(&path);
        if self.paths.iter().any(|p| dedup_key(p) == key) {
            log::debug!("Already listed: {}", path.display());
            return false;
        }
        self.paths.push(path);
        true
    }

    /// Returns how many of `paths` were new
    pub fn add_all<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut added = 0;
        for path in paths {
            if self.add(path) {
                added += 1;
            }
        }
        added
    }

    /// Add every `.pdf` below `dir`, recursively, in sorted order
    pub fn add_folder(&mut self, dir: &Path) -> CompressResult<usize> {
        let mut found = collect_pdfs(dir)?;
        found.sort();
        log::info!("Found {} PDF files under {}", found.len(), dir.display());
        Ok(self.add_all(found))
    }

    /// Remove the entries at `indices`; out-of-range indices are ignored
    pub fn remove(&mut self, indices: &[usize]) -> usize {
        let mut indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.paths.len())
            .collect();
        indices.sort_unstable();
        indices.dedup();

        for &i in indices.iter().rev() {
            self.paths.remove(i);
        }
        indices.len()
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }
}

fn dedup_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn collect_pdfs(dir: &Path) -> CompressResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_dir() && is_pdf(entry.path()) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// `<dir>/<stem><suffix>.pdf`, where `<dir>` is `output_dir` or the input's
/// own directory.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{}{}.pdf", stem, suffix);

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => match input.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        },
    }
}

/// Settings fixed for the duration of one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub quality: Quality,
    /// Write outputs here instead of next to each input
    pub output_dir: Option<PathBuf>,
    pub suffix: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            output_dir: None,
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Succeeded,
    Failed,
    /// The destination existed and overwriting was declined
    Skipped,
}

/// Emitted before each item starts, and once more at the end
#[derive(Debug, Clone)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// The item about to be processed, `None` once the run is done
    pub current: Option<PathBuf>,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Outcome of a single file
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub original_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub elapsed_ms: u64,
}

impl ItemReport {
    fn new(input: &Path, output: PathBuf) -> Self {
        Self {
            input: input.to_path_buf(),
            output,
            status: ItemStatus::Pending,
            error: None,
            original_size: None,
            compressed_size: None,
            elapsed_ms: 0,
        }
    }

    /// Size reduction in percent; negative when the output grew
    pub fn savings_percent(&self) -> Option<f64> {
        match (self.original_size, self.compressed_size) {
            (Some(orig), Some(comp)) if orig > 0 => {
                Some((orig as f64 - comp as f64) / orig as f64 * 100.0)
            }
            _ => None,
        }
    }
}

/// Aggregate result of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    fn record(&mut self, item: ItemReport) {
        match item.status {
            ItemStatus::Succeeded => self.succeeded += 1,
            ItemStatus::Failed => self.failed += 1,
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Pending => {}
        }
        self.items.push(item);
    }

    /// Bytes saved across all successful items
    pub fn bytes_saved(&self) -> i64 {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Succeeded)
            .filter_map(|i| Some(i.original_size? as i64 - i.compressed_size? as i64))
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Callbacks into the presentation layer.
///
/// The default implementation never overwrites and ignores all events.
pub trait BatchObserver {
    /// Asked once per item whose destination already exists
    fn confirm_overwrite(&mut self, _output: &Path) -> bool {
        false
    }

    fn on_progress(&mut self, _progress: &Progress) {}

    fn on_item(&mut self, _item: &ItemReport) {}

    fn on_complete(&mut self, _report: &BatchReport) {}
}

impl BatchObserver for () {}

/// Runs a [`Compressor`] over a list of files, one after another.
///
/// A failing item is recorded and the run moves on to the next one.
pub struct BatchRunner<C> {
    compressor: C,
    options: BatchOptions,
}

impl<C: Compressor> BatchRunner<C> {
    pub fn new(compressor: C, options: BatchOptions) -> Self {
        Self {
            compressor,
            options,
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn run(&self, list: &BatchList, observer: &mut dyn BatchObserver) -> BatchReport {
        let total = list.len();
        log::info!(
            "Compressing {} files with {} at quality '{}'",
            total,
            self.compressor.name(),
            self.options.quality
        );

        let mut report = BatchReport {
            total,
            ..Default::default()
        };

        for (index, input) in list.iter().enumerate() {
            observer.on_progress(&Progress {
                completed: index,
                total,
                current: Some(input.clone()),
            });

            let item = self.process_item(input, observer);
            observer.on_item(&item);
            report.record(item);
        }

        observer.on_progress(&Progress {
            completed: total,
            total,
            current: None,
        });

        if report.has_failures() {
            log::warn!(
                "Batch finished with {} failed of {} files",
                report.failed,
                total
            );
        } else {
            log::info!(
                "Batch finished: {} succeeded, {} skipped",
                report.succeeded,
                report.skipped
            );
        }

        observer.on_complete(&report);
        report
    }

    fn process_item(&self, input: &Path, observer: &mut dyn BatchObserver) -> ItemReport {
        let output = output_path_for(input, self.options.output_dir.as_deref(), &self.options.suffix);
        let mut item = ItemReport::new(input, output.clone());

        let started = Instant::now();
        match self.try_item(input, &output, observer) {
            Ok(true) => {
                item.status = ItemStatus::Succeeded;
                item.original_size = fs::metadata(input).ok().map(|m| m.len());
                item.compressed_size = fs::metadata(&output).ok().map(|m| m.len());
            }
            Ok(false) => {
                log::info!("Skipping {}: {} exists", input.display(), output.display());
                item.status = ItemStatus::Skipped;
            }
            Err(e) => {
                log::warn!("Failed to compress {}: {}", input.display(), e);
                item.status = ItemStatus::Failed;
                item.original_size = fs::metadata(input).ok().map(|m| m.len());
                item.error = Some(e.to_string());
            }
        }
        item.elapsed_ms = started.elapsed().as_millis() as u64;
        item
    }

    /// Ok(false) means the item was skipped
    fn try_item(
        &self,
        input: &Path,
        output: &Path,
        observer: &mut dyn BatchObserver,
    ) -> CompressResult<bool> {
        if !input.is_file() {
            return Err(CompressError::InputNotFound(input.to_path_buf()));
        }
        if dedup_key(input) == dedup_key(output) {
            return Err(CompressError::OutputIsInput(output.to_path_buf()));
        }
        if output.exists() && !observer.confirm_overwrite(output) {
            return Ok(false);
        }
        if let Some(dir) = &self.options.output_dir {
            fs::create_dir_all(dir)?;
        }

        self.compressor.compress(&CompressionJob {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            quality: self.options.quality,
        })?;
        Ok(true)
    }
}

/// Locate Ghostscript and run the batch with it.
///
/// Refuses to start, without invoking anything, when no executable is found.
pub fn compress_batch(
    list: &BatchList,
    options: BatchOptions,
    locator: &ToolLocator,
    observer: &mut dyn BatchObserver,
) -> CompressResult<BatchReport> {
    compress_batch_with(list, options, locator, Arc::new(ProcessRunner), observer)
}

/// [`compress_batch`] with an explicit process runner
pub fn compress_batch_with(
    list: &BatchList,
    options: BatchOptions,
    locator: &ToolLocator,
    runner: Arc<dyn ToolRunner>,
    observer: &mut dyn BatchObserver,
) -> CompressResult<BatchReport> {
    let gs = Ghostscript::locate_with(locator)?.with_runner(runner);
    Ok(BatchRunner::new(gs, options).run(list, observer))
}

/// Lifecycle of the background worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
}

/// Runs one batch at a time on a background thread.
///
/// Cloning shares the run state, so any clone can tell whether a run is in
/// progress. There is no cancellation: a started run goes to completion.
#[derive(Debug, Clone, Default)]
pub struct BatchWorker {
    state: Arc<Mutex<RunState>>,
}

impl BatchWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        *lock_state(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn start<C, O>(
        &self,
        runner: BatchRunner<C>,
        list: BatchList,
        mut observer: O,
    ) -> CompressResult<RunHandle>
    where
        C: Compressor + 'static,
        O: BatchObserver + Send + 'static,
    {
        {
            let mut state = lock_state(&self.state);
            if *state == RunState::Running {
                return Err(CompressError::RunInProgress);
            }
            *state = RunState::Running;
        }

        let guard = RunGuard(self.state.clone());
        let spawned = thread::Builder::new()
            .name("compress-batch".to_string())
            .spawn(move || {
                let _guard = guard;
                runner.run(&list, &mut observer)
            });

        match spawned {
            Ok(handle) => Ok(RunHandle { handle }),
            Err(e) => Err(CompressError::Io(e)),
        }
    }
}

fn lock_state(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks the run finished when the worker exits, including by panic
struct RunGuard(Arc<Mutex<RunState>>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        *lock_state(&self.0) = RunState::Completed;
    }
}

/// Handle to a batch running on the worker thread
pub struct RunHandle {
    handle: JoinHandle<BatchReport>,
}

impl RunHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the run completes
    pub fn join(self) -> CompressResult<BatchReport> {
        self.handle.join().map_err(|_| CompressError::WorkerPanicked)
    }
}
