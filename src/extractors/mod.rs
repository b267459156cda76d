//! Source extractors: the leaves that turn one web page, PDF or image into
//! text.
//!
//! All the real work is done by external tools (poppler-utils, `tesseract`,
//! `easyocr`) and by `reqwest` + `scraper`. The batch dispatcher talks to the
//! extractors through [`ExtractorBackend`], so it can be tested without any of
//! those installed.

use std::env;

use clap::Args;

use crate::{
    errors::ExtractError,
    prelude::*,
    source::{OcrEngineKind, PageRange},
};

pub mod image;
pub mod ocr;
pub mod pdf;
pub mod web;

/// The default DPI used when rasterizing scanned PDFs.
pub const DEFAULT_RASTERIZE_DPI: u32 = 300;

/// External tools we run, by name or path.
#[derive(Args, Clone, Debug)]
pub struct ToolCommands {
    /// The `tesseract` executable.
    #[clap(long, env = "SCRAPEY_TESSERACT", default_value = "tesseract", value_name = "PATH")]
    pub tesseract: PathBuf,

    /// The `easyocr` executable.
    #[clap(long, env = "SCRAPEY_EASYOCR", default_value = "easyocr", value_name = "PATH")]
    pub easyocr: PathBuf,

    /// The `pdfinfo` executable from poppler-utils.
    #[clap(long, env = "SCRAPEY_PDFINFO", default_value = "pdfinfo", value_name = "PATH")]
    pub pdfinfo: PathBuf,

    /// The `pdftotext` executable from poppler-utils.
    #[clap(long, env = "SCRAPEY_PDFTOTEXT", default_value = "pdftotext", value_name = "PATH")]
    pub pdftotext: PathBuf,

    /// The `pdftocairo` executable from poppler-utils.
    #[clap(long, env = "SCRAPEY_PDFTOCAIRO", default_value = "pdftocairo", value_name = "PATH")]
    pub pdftocairo: PathBuf,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            tesseract: PathBuf::from("tesseract"),
            easyocr: PathBuf::from("easyocr"),
            pdfinfo: PathBuf::from("pdfinfo"),
            pdftotext: PathBuf::from("pdftotext"),
            pdftocairo: PathBuf::from("pdftocairo"),
        }
    }
}

/// Read-only configuration shared by every extractor in a batch.
#[derive(Clone, Debug)]
pub struct ExtractionContext {
    /// OCR language, as a Tesseract language code (`eng`, `deu+fra`, ...).
    pub ocr_language: String,

    /// Where transient artifacts (grayscale copies, crops, rasterized pages)
    /// are created. They never outlive the extractor call that made them.
    pub scratch_dir: PathBuf,

    /// The external tools to run.
    pub tools: ToolCommands,

    /// DPI for rasterizing scanned PDFs.
    pub rasterize_dpi: u32,
}

impl ExtractionContext {
    /// Create a context using the system temporary directory and the
    /// default tool names.
    pub fn new(ocr_language: impl Into<String>) -> Self {
        Self {
            ocr_language: ocr_language.into(),
            scratch_dir: env::temp_dir(),
            tools: ToolCommands::default(),
            rasterize_dpi: DEFAULT_RASTERIZE_DPI,
        }
    }
}

/// The extraction operations the batch dispatcher needs.
#[async_trait]
pub trait ExtractorBackend: Send + Sync + 'static {
    /// Where the dispatcher should put its own transient artifacts.
    fn scratch_dir(&self) -> &Path;

    /// Fetch a web page and return its visible text.
    async fn extract_web_text(&self, url: &str) -> Result<String, ExtractError>;

    /// Extract the text layer of a PDF.
    async fn extract_pdf_text(
        &self,
        path: &Path,
        page_range: Option<PageRange>,
    ) -> Result<String, ExtractError>;

    /// Rasterize a PDF and OCR each page.
    async fn ocr_scanned_pdf(
        &self,
        path: &Path,
        engine: OcrEngineKind,
        page_range: Option<PageRange>,
    ) -> Result<String, ExtractError>;

    /// OCR a single image.
    async fn perform_ocr(
        &self,
        image_path: &Path,
        engine: OcrEngineKind,
    ) -> Result<String, ExtractError>;
}

/// The real extractors, backed by external tools and the network.
pub struct SystemExtractors {
    ctx: ExtractionContext,
    client: reqwest::Client,
}

impl SystemExtractors {
    pub fn new(ctx: ExtractionContext) -> Self {
        Self {
            ctx,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ExtractorBackend for SystemExtractors {
    fn scratch_dir(&self) -> &Path {
        &self.ctx.scratch_dir
    }

    async fn extract_web_text(&self, url: &str) -> Result<String, ExtractError> {
        web::extract_web_text(&self.client, url).await
    }

    async fn extract_pdf_text(
        &self,
        path: &Path,
        page_range: Option<PageRange>,
    ) -> Result<String, ExtractError> {
        pdf::extract_pdf_text(&self.ctx, path, page_range).await
    }

    async fn ocr_scanned_pdf(
        &self,
        path: &Path,
        engine: OcrEngineKind,
        page_range: Option<PageRange>,
    ) -> Result<String, ExtractError> {
        ocr::ocr_scanned_pdf(&self.ctx, path, engine, page_range).await
    }

    async fn perform_ocr(
        &self,
        image_path: &Path,
        engine: OcrEngineKind,
    ) -> Result<String, ExtractError> {
        ocr::perform_ocr(&self.ctx, image_path, engine).await
    }
}

/// Wrap each non-empty page as `=== Page N ===` and join them with blank
/// lines. Page text is kept as the tool returned it. Pages must already be in
/// ascending order.
pub fn join_page_blocks(pages: impl IntoIterator<Item = (usize, String)>) -> String {
    pages
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| format!("=== Page {} ===\n{}\n", page, text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pages_are_skipped() {
        let text = join_page_blocks(vec![
            (2, "first\n".to_owned()),
            (3, " \n\t".to_owned()),
            (4, "second".to_owned()),
        ]);
        assert_eq!(text, "=== Page 2 ===\nfirst\n\n\n=== Page 4 ===\nsecond\n");
    }

    #[test]
    fn no_pages_is_empty_text() {
        assert_eq!(join_page_blocks(vec![]), "");
    }

    #[test]
    fn context_defaults() {
        let ctx = ExtractionContext::new("eng");
        assert_eq!(ctx.rasterize_dpi, 300);
        assert_eq!(ctx.tools.tesseract, PathBuf::from("tesseract"));
        assert_eq!(ctx.scratch_dir, env::temp_dir());
    }
}
