//! In-library re-serialization with lopdf.
//!
//! No external process is involved. The document is loaded, unreachable
//! objects and empty streams are dropped, uncompressed streams are
//! Flate-encoded and the result is written back out. Images and fonts are
//! left exactly as they are, so savings depend entirely on how wasteful the
//! original writer was.

use lopdf::Document;

use crate::command::same_file;
use crate::error::{CompressError, CompressResult};
use crate::{CompressionJob, Compressor};

/// Options for lopdf re-serialization
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Flate-compress streams that have no filter yet
    pub compress_streams: bool,
    /// Drop objects not reachable from the trailer, then renumber
    pub prune_unused: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            compress_streams: true,
            prune_unused: true,
        }
    }
}

/// [`Compressor`] that rewrites the PDF object graph with lopdf.
///
/// The job's quality preset has no effect here.
#[derive(Debug, Clone, Default)]
pub struct LopdfRewriter {
    pub options: RewriteOptions,
}

impl LopdfRewriter {
    pub fn new(options: RewriteOptions) -> Self {
        Self { options }
    }
}

impl Compressor for LopdfRewriter {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn compress(&self, job: &CompressionJob) -> CompressResult<()> {
        if !job.input.is_file() {
            return Err(CompressError::InputNotFound(job.input.clone()));
        }
        if same_file(&job.input, &job.output) {
            return Err(CompressError::OutputIsInput(job.output.clone()));
        }

        let mut doc = Document::load(&job.input)
            .map_err(|e| CompressError::LoadError(format!("{:?}: {}", job.input, e)))?;
        if doc.get_pages().is_empty() {
            return Err(CompressError::NoPages(job.input.display().to_string()));
        }

        optimize(&mut doc, &self.options);

        doc.save(&job.output)
            .map_err(|e| CompressError::SaveError(format!("{:?}: {}", job.output, e)))?;
        Ok(())
    }
}

/// Rewrite a PDF held in memory and return the new bytes
pub fn rewrite_pdf_bytes(input_bytes: &[u8], options: &RewriteOptions) -> CompressResult<Vec<u8>> {
    let mut doc =
        Document::load_mem(input_bytes).map_err(|e| CompressError::LoadError(e.to_string()))?;
    if doc.get_pages().is_empty() {
        return Err(CompressError::NoPages("in-memory document".to_string()));
    }

    optimize(&mut doc, options);

    let mut output_bytes = Vec::new();
    doc.save_to(&mut output_bytes)
        .map_err(|e| CompressError::SaveError(e.to_string()))?;
    Ok(output_bytes)
}

fn optimize(doc: &mut Document, options: &RewriteOptions) {
    if options.prune_unused {
        let pruned = doc.prune_objects();
        let empty = doc.delete_zero_length_streams();
        doc.renumber_objects();
        log::debug!(
            "Pruned {} unreachable objects and {} empty streams",
            pruned.len(),
            empty.len()
        );
    }

    if options.compress_streams {
        doc.compress();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Quality;
    use lopdf::{dictionary, Object, Stream};

    /// One-page document with an uncompressed content stream and a
    /// dangling, unreferenced object.
    fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for i in 0..pages {
            let text = format!("BT /F1 12 Tf 72 712 Td (Page {}) Tj ET\n", i + 1).repeat(50);
            let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        doc.add_object(Stream::new(dictionary! {}, vec![b'x'; 4096]));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_rewrite_shrinks_uncompressed_document() {
        let input = sample_pdf(2);
        let output = rewrite_pdf_bytes(&input, &RewriteOptions::default()).unwrap();

        assert!(output.starts_with(b"%PDF"));
        assert!(output.len() < input.len());

        let doc = Document::load_mem(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_rewrite_rejects_pageless_document() {
        let input = sample_pdf(0);
        assert!(matches!(
            rewrite_pdf_bytes(&input, &RewriteOptions::default()),
            Err(CompressError::NoPages(_))
        ));
    }

    #[test]
    fn test_rewrite_rejects_garbage() {
        assert!(matches!(
            rewrite_pdf_bytes(b"not a pdf", &RewriteOptions::default()),
            Err(CompressError::LoadError(_))
        ));
    }

    #[test]
    fn test_rewriter_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        std::fs::write(&input, sample_pdf(1)).unwrap();
        let output = dir.path().join("doc_compressed.pdf");

        LopdfRewriter::default()
            .compress(&CompressionJob {
                input: input.clone(),
                output: output.clone(),
                quality: Quality::Screen,
            })
            .unwrap();

        let written = std::fs::read(&output).unwrap();
        assert!(written.starts_with(b"%PDF"));
        assert!(written.len() < std::fs::metadata(&input).unwrap().len() as usize);
    }

    #[test]
    fn test_rewriter_refuses_aliased_input() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let input = dir.path().join("doc.pdf");
        let original = sample_pdf(1);
        std::fs::write(&input, &original).unwrap();

        let result = LopdfRewriter::default().compress(&CompressionJob {
            input: input.clone(),
            output: dir.path().join("sub").join("..").join("doc.pdf"),
            quality: Quality::Ebook,
        });

        assert!(matches!(result, Err(CompressError::OutputIsInput(_))));
        assert_eq!(std::fs::read(&input).unwrap(), original);
    }
}
