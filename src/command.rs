//! Building the Ghostscript argument vector for one compression job.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{CompressError, CompressResult};
use crate::quality::Quality;

/// Compatibility level written into the output unless overridden
pub const DEFAULT_COMPATIBILITY_LEVEL: &str = "1.4";

/// Arguments for a batch-mode, non-interactive `pdfwrite` run.
///
/// The input must be an existing file and the output must not name the same
/// file. The PDF itself is not inspected; a malformed input only shows up as
/// a non-zero exit from Ghostscript.
pub fn build_args(
    input: &Path,
    output: &Path,
    quality: Quality,
    compatibility_level: &str,
) -> CompressResult<Vec<OsString>> {
    if !input.is_file() {
        return Err(CompressError::InputNotFound(input.to_path_buf()));
    }
    if same_file(input, output) {
        return Err(CompressError::OutputIsInput(output.to_path_buf()));
    }

    let mut output_flag = OsString::from("-sOutputFile=");
    output_flag.push(escape_output_path(output));

    Ok(vec![
        OsString::from("-sDEVICE=pdfwrite"),
        OsString::from(format!("-dCompatibilityLevel={}", compatibility_level)),
        OsString::from(quality.settings_flag()),
        OsString::from("-dNOPAUSE"),
        OsString::from("-dQUIET"),
        OsString::from("-dBATCH"),
        output_flag,
        guard_leading_dash(input).into_os_string(),
    ])
}

/// `%d` in `-sOutputFile` is a page-number template, so a literal `%` has
/// to be doubled.
#[cfg(unix)]
fn escape_output_path(path: &Path) -> OsString {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let mut escaped = Vec::new();
    for &b in path.as_os_str().as_bytes() {
        if b == b'%' {
            escaped.push(b'%');
        }
        escaped.push(b);
    }
    OsString::from_vec(escaped)
}

#[cfg(windows)]
fn escape_output_path(path: &Path) -> OsString {
    use std::os::windows::ffi::{OsStrExt, OsStringExt};

    let percent = u16::from(b'%');
    let mut escaped = Vec::new();
    for unit in path.as_os_str().encode_wide() {
        if unit == percent {
            escaped.push(percent);
        }
        escaped.push(unit);
    }
    OsString::from_wide(&escaped)
}

#[cfg(not(any(unix, windows)))]
fn escape_output_path(path: &Path) -> OsString {
    OsString::from(path.to_string_lossy().replace('%', "%%"))
}

/// A relative path like `-draft.pdf` would be parsed as a switch.
fn guard_leading_dash(path: &Path) -> PathBuf {
    match path.components().next() {
        Some(Component::Normal(first)) if first.to_string_lossy().starts_with('-') => {
            Path::new(".").join(path)
        }
        _ => path.to_path_buf(),
    }
}

pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
