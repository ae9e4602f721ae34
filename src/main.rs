//! PDF Compressor CLI
//!
//! Command-line front end for batch PDF compression.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Parser;
use compress_pdf::{
    Backend, BatchList, BatchObserver, BatchOptions, BatchReport, BatchRunner, BatchWorker,
    CompressError, Compressor, Ghostscript, ItemReport, ItemStatus, LopdfRewriter, Progress,
    Quality,
};

/// Reduce the file size of PDF documents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PDF files or folders to compress (folders are searched recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Quality preset: screen, ebook, printer or prepress
    #[arg(short, long, default_value = "ebook")]
    quality: Quality,

    /// Write compressed files here instead of next to each original
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Appended to the original file name
    #[arg(long, default_value = "_compressed")]
    suffix: String,

    /// ghostscript (external tool) or lopdf (in-process re-serialization)
    #[arg(short, long, default_value = "ghostscript")]
    backend: Backend,

    /// Ghostscript executable to use instead of searching PATH
    #[arg(long, value_name = "PATH")]
    gs: Option<PathBuf>,

    /// PDF compatibility level for Ghostscript output
    #[arg(long, default_value = "1.4")]
    compat: String,

    /// Overwrite existing output files without asking
    #[arg(short, long, conflicts_with = "no_overwrite")]
    yes: bool,

    /// Skip files whose output already exists without asking
    #[arg(long)]
    no_overwrite: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Open the output folder when at least one file was compressed
    #[arg(long)]
    open: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy)]
enum OverwritePolicy {
    Ask,
    Always,
    Never,
}

struct ConsoleObserver {
    overwrite: OverwritePolicy,
    quiet: bool,
}

impl BatchObserver for ConsoleObserver {
    fn confirm_overwrite(&mut self, output: &Path) -> bool {
        match self.overwrite {
            OverwritePolicy::Always => true,
            OverwritePolicy::Never => false,
            OverwritePolicy::Ask => ask_yes_no(&format!(
                "'{}' already exists. Overwrite?",
                display_name(output)
            )),
        }
    }

    fn on_progress(&mut self, progress: &Progress) {
        if self.quiet {
            return;
        }
        if let Some(current) = &progress.current {
            println!(
                "[{}/{}] {:>3.0}% {}",
                progress.completed + 1,
                progress.total,
                progress.percent(),
                display_name(current)
            );
        }
    }

    fn on_item(&mut self, item: &ItemReport) {
        if self.quiet {
            return;
        }
        match item.status {
            ItemStatus::Succeeded => {
                let sizes = match (item.original_size, item.compressed_size) {
                    (Some(orig), Some(comp)) => format!(
                        "{} -> {}, {:.1}% smaller",
                        format_mb(orig),
                        format_mb(comp),
                        item.savings_percent().unwrap_or(0.0)
                    ),
                    _ => "size unknown".to_string(),
                };
                println!("      saved to {} ({})", item.output.display(), sizes);
            }
            ItemStatus::Skipped => println!("      skipped, output exists"),
            ItemStatus::Failed => eprintln!(
                "      failed: {}",
                item.error.as_deref().unwrap_or("unknown error")
            ),
            ItemStatus::Pending => {}
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let compressor = build_compressor(&args)?;

    let mut list = BatchList::new();
    for input in &args.inputs {
        if input.is_dir() {
            let added = list
                .add_folder(input)
                .with_context(|| format!("Failed to scan folder: {}", input.display()))?;
            if added == 0 {
                log::warn!("No PDF files found in {}", input.display());
            }
        } else {
            list.add(input.clone());
        }
    }
    if list.is_empty() {
        bail!("No PDF files to compress");
    }

    let options = BatchOptions {
        quality: args.quality,
        output_dir: args.output_dir.clone(),
        suffix: args.suffix.clone(),
    };
    let observer = ConsoleObserver {
        overwrite: if args.yes {
            OverwritePolicy::Always
        } else if args.no_overwrite {
            OverwritePolicy::Never
        } else {
            OverwritePolicy::Ask
        },
        quiet: args.json,
    };

    if !args.json {
        println!("PDF Compressor");
        println!("==============");
        println!(
            "{} file(s), quality '{}', backend {}\n",
            list.len(),
            args.quality,
            compressor.name()
        );
    }

    let runner = BatchRunner::new(compressor, options);
    let report = BatchWorker::new().start(runner, list, observer)?.join()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if args.open && report.succeeded > 0 {
        if let Some(folder) = output_folder(&report, args.output_dir.as_deref()) {
            if let Err(e) = open_folder(&folder) {
                log::warn!("Could not open {}: {:#}", folder.display(), e);
            }
        }
    }

    if report.has_failures() {
        bail!("{} of {} files failed to compress", report.failed, report.total);
    }
    Ok(())
}

fn build_compressor(args: &Args) -> Result<Box<dyn Compressor>> {
    match args.backend {
        Backend::Lopdf => Ok(Box::new(LopdfRewriter::default())),
        Backend::Ghostscript => {
            let gs = match &args.gs {
                Some(path) => {
                    if !path.is_file() {
                        bail!("Ghostscript executable not found: {}", path.display());
                    }
                    Ghostscript::at(path)
                }
                None => match Ghostscript::locate() {
                    Ok(gs) => gs,
                    Err(e @ CompressError::ToolNotFound { .. }) => {
                        bail!("{}\n\n{}", e, INSTALL_HINT)
                    }
                    Err(e) => return Err(e.into()),
                },
            };
            log::info!("Using Ghostscript at {}", gs.program().display());
            Ok(Box::new(gs.with_compatibility_level(args.compat.clone())))
        }
    }
}

const INSTALL_HINT: &str = "Ghostscript is required for compression:\n  \
    Windows: install from ghostscript.com and add it to PATH\n  \
    macOS:   brew install ghostscript\n  \
    Linux:   sudo apt-get install ghostscript\n\
    Or pass --gs <PATH>, or use --backend lopdf.";

fn print_summary(report: &BatchReport) {
    println!(
        "\nDone! {} succeeded, {} failed, {} skipped",
        report.succeeded, report.failed, report.skipped
    );
    let saved = report.bytes_saved();
    if report.succeeded > 0 {
        if saved >= 0 {
            println!("Total saved: {}", format_mb(saved as u64));
        } else {
            println!("Outputs grew by {}", format_mb(saved.unsigned_abs()));
        }
    }
}

/// Folder holding the outputs: the override, or the first success's parent
fn output_folder(report: &BatchReport, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = output_dir {
        return Some(dir.to_path_buf());
    }
    report
        .items
        .iter()
        .find(|i| i.status == ItemStatus::Succeeded)
        .and_then(|i| i.output.parent())
        .map(Path::to_path_buf)
}

fn open_folder(path: &Path) -> Result<()> {
    let program = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    Command::new(program)
        .arg(path)
        .spawn()
        .with_context(|| format!("Failed to run {}", program))?;
    Ok(())
}

fn ask_yes_no(question: &str) -> bool {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        log::info!("{} (no terminal, answering no)", question);
        return false;
    }

    // stdout may be carrying the JSON report
    prompt_yes_no(question, &mut stdin.lock(), &mut io::stderr())
}

fn prompt_yes_no(question: &str, input: &mut impl BufRead, prompt: &mut impl Write) -> bool {
    if write!(prompt, "{} [y/N] ", question).is_err() || prompt.flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
