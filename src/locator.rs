//! Locating the Ghostscript executable on the process search path.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Executable names to probe, in order of preference
pub fn candidate_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["gswin64c", "gswin32c", "gs"]
    } else {
        &["gs"]
    }
}

/// Probes candidate names against a search path.
///
/// Nothing is cached: every call to [`ToolLocator::locate`] re-reads the
/// directories, so installing Ghostscript mid-session is picked up.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    names: Vec<String>,
    search_path: Option<OsString>,
}

impl Default for ToolLocator {
    fn default() -> Self {
        Self {
            names: candidate_names().iter().map(|s| s.to_string()).collect(),
            search_path: None,
        }
    }
}

impl ToolLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Search these directories (in `PATH` syntax) instead of `PATH`
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Absolute path of the first candidate found, or `None`
    pub fn locate(&self) -> Option<PathBuf> {
        let search_path = self.search_path.clone().or_else(|| env::var_os("PATH"))?;
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        for name in &self.names {
            if let Ok(found) = which::which_in(name, Some(&search_path), &cwd) {
                log::debug!("Found {} at {}", name, found.display());
                return Some(found);
            }
        }

        log::debug!("None of {:?} found on search path", self.names);
        None
    }
}

/// Shorthand for `ToolLocator::default().locate()`
pub fn find_ghostscript() -> Option<PathBuf> {
    ToolLocator::default().locate()
}
