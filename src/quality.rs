//! Quality presets understood by Ghostscript's `pdfwrite` device.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CompressError;

/// Compression aggressiveness, mapped onto a `-dPDFSETTINGS` token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// 72 dpi images, smallest output
    Screen,
    /// 150 dpi images
    #[default]
    Ebook,
    /// 300 dpi images
    Printer,
    /// 300 dpi images with color preservation
    Prepress,
}

impl Quality {
    /// All presets, from smallest output to highest fidelity
    pub const ALL: [Quality; 4] = [
        Quality::Screen,
        Quality::Ebook,
        Quality::Printer,
        Quality::Prepress,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Quality::Screen => "screen",
            Quality::Ebook => "ebook",
            Quality::Printer => "printer",
            Quality::Prepress => "prepress",
        }
    }

    /// The settings token as Ghostscript expects it, e.g. `/ebook`
    pub fn token(&self) -> &'static str {
        match self {
            Quality::Screen => "/screen",
            Quality::Ebook => "/ebook",
            Quality::Printer => "/printer",
            Quality::Prepress => "/prepress",
        }
    }

    pub fn settings_flag(&self) -> String {
        format!("-dPDFSETTINGS={}", self.token())
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quality {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('/');
        Quality::ALL
            .into_iter()
            .find(|q| q.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| CompressError::InvalidQuality(s.to_string()))
    }
}

/// Which engine performs the actual size reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Shell out to Ghostscript's `pdfwrite` device
    #[default]
    Ghostscript,
    /// Re-serialize the object graph with lopdf, no external process
    Lopdf,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ghostscript" | "gs" => Ok(Backend::Ghostscript),
            "lopdf" | "library" => Ok(Backend::Lopdf),
            other => Err(format!(
                "unknown backend '{}' (expected ghostscript or lopdf)",
                other
            )),
        }
    }
}
