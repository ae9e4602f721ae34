//! WebAssembly bindings for the PDF Compressor
//!
//! Browsers cannot spawn Ghostscript, so only the lopdf re-serialization
//! backend is exposed here.

use wasm_bindgen::prelude::*;
use crate::{rewrite_pdf_bytes, RewriteOptions};

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Rewrite a PDF with lopdf and return the new bytes
///
/// # Arguments
/// * `pdf_bytes` - The input PDF file as a byte array
/// * `compress_streams` - Flate-compress unfiltered streams (default: true)
///
/// # Returns
/// The rewritten PDF as a byte array, or throws an error
#[wasm_bindgen]
pub fn rewrite_pdf(pdf_bytes: &[u8], compress_streams: Option<bool>) -> Result<Vec<u8>, JsError> {
    let options = RewriteOptions {
        compress_streams: compress_streams.unwrap_or(true),
        ..RewriteOptions::default()
    };

    rewrite_pdf_bytes(pdf_bytes, &options).map_err(|e| JsError::new(&e.to_string()))
}

/// Rewrite a PDF and report the size change alongside the bytes
#[wasm_bindgen]
pub fn rewrite_pdf_with_info(pdf_bytes: &[u8]) -> Result<RewriteResultJs, JsError> {
    let output_bytes = rewrite_pdf_bytes(pdf_bytes, &RewriteOptions::default())
        .map_err(|e| JsError::new(&e.to_string()))?;

    let info_json = serde_json::json!({
        "originalSize": pdf_bytes.len(),
        "rewrittenSize": output_bytes.len(),
        "reductionPercent": reduction_percent(pdf_bytes.len(), output_bytes.len()),
    })
    .to_string();

    Ok(RewriteResultJs {
        original_size: pdf_bytes.len(),
        rewritten_size: output_bytes.len(),
        pdf_bytes: output_bytes,
        info_json,
    })
}

fn reduction_percent(original: usize, rewritten: usize) -> f64 {
    if original == 0 {
        0.0
    } else {
        (original as f64 - rewritten as f64) / original as f64 * 100.0
    }
}

/// Result of a rewrite with size statistics
#[wasm_bindgen]
pub struct RewriteResultJs {
    pdf_bytes: Vec<u8>,
    original_size: usize,
    rewritten_size: usize,
    info_json: String,
}

#[wasm_bindgen]
impl RewriteResultJs {
    /// Get the rewritten PDF bytes
    #[wasm_bindgen(getter)]
    pub fn pdf_bytes(&self) -> Vec<u8> {
        self.pdf_bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn original_size(&self) -> usize {
        self.original_size
    }

    #[wasm_bindgen(getter)]
    pub fn rewritten_size(&self) -> usize {
        self.rewritten_size
    }

    /// Size statistics as a JSON string
    #[wasm_bindgen(getter)]
    pub fn info_json(&self) -> String {
        self.info_json.clone()
    }
}
