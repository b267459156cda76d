//! OCR of images and scanned PDFs.

use crate::{
    cpu_limit::with_cpu_semaphore,
    errors::ExtractError,
    prelude::*,
    source::{OcrEngineKind, PageRange},
};

use super::{
    ExtractionContext,
    image::{discard_artifact, grayscale_artifact},
    join_page_blocks, pdf,
};

pub mod engines;

/// OCR one image file.
///
/// The image is converted to grayscale first. The grayscale copy lives in the
/// scratch directory only for the duration of this call.
#[instrument(level = "debug", skip(ctx), fields(path = %image_path.display()))]
pub async fn perform_ocr(
    ctx: &ExtractionContext,
    image_path: &Path,
    engine: OcrEngineKind,
) -> Result<String, ExtractError> {
    let gray = grayscale_artifact(image_path, &ctx.scratch_dir).await?;
    let engine = engines::engine_for(engine, &ctx.tools);
    let result =
        with_cpu_semaphore(|| engine.recognize(gray.path(), &ctx.ocr_language)).await;
    discard_artifact(gray);
    result
}

/// OCR each page of a scanned PDF.
///
/// Pages are rasterized into a temporary directory, and each page image is
/// deleted as soon as it has been through OCR.
#[instrument(level = "debug", skip(ctx), fields(path = %path.display()))]
pub async fn ocr_scanned_pdf(
    ctx: &ExtractionContext,
    path: &Path,
    engine: OcrEngineKind,
    page_range: Option<PageRange>,
) -> Result<String, ExtractError> {
    let total_pages = pdf::get_pdf_page_count(ctx, path).await?;
    let pages = PageRange::clamp(page_range, total_pages);
    if pages.is_empty() {
        debug!(total_pages, "No pages selected");
        return Ok(String::new());
    }

    let raster_dir = tempfile::Builder::new()
        .prefix("scrapey-pages-")
        .tempdir_in(&ctx.scratch_dir)?;
    let page_images = pdf::rasterize_pages(ctx, path, pages, raster_dir.path()).await?;

    let mut page_texts = Vec::with_capacity(page_images.len());
    for (page, image_path) in page_images {
        debug!(page, "OCRing page");
        let result = perform_ocr(ctx, &image_path, engine).await;
        if let Err(err) = tokio::fs::remove_file(&image_path).await {
            warn!(
                path = ?image_path.display(),
                "failed to delete page image: {}",
                err
            );
        }
        page_texts.push((page, result?));
    }

    let raster_dir_path = raster_dir.path().to_owned();
    if let Err(err) = raster_dir.close() {
        error!(
            directory = ?raster_dir_path.display(),
            "failed to delete temporary directory: {}",
            err
        );
    }
    Ok(join_page_blocks(page_texts))
}

#[cfg(test)]
mod tests {
    use crate::extractors::image::tests::{list_dir, write_test_png};

    use super::*;

    fn context_with_tesseract(scratch_dir: &Path, tesseract: &str) -> ExtractionContext {
        let mut ctx = ExtractionContext::new("eng");
        ctx.scratch_dir = scratch_dir.to_owned();
        ctx.tools.tesseract = PathBuf::from(tesseract);
        ctx
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn ocr_runs_on_a_grayscale_copy_that_is_removed() {
        let input = tempfile::TempDir::new().unwrap();
        let scratch = tempfile::TempDir::new().unwrap();
        let image = write_test_png(input.path(), "scan.png", 16, 16);
        let ctx = context_with_tesseract(scratch.path(), "echo");

        // Our stand-in engine echoes the path it was given.
        let text = perform_ocr(&ctx, &image, OcrEngineKind::Tesseract)
            .await
            .unwrap();
        let ocr_input = PathBuf::from(text.split_whitespace().next().unwrap());
        assert_ne!(ocr_input, image);
        assert!(ocr_input.starts_with(scratch.path()));
        assert!(!ocr_input.exists());
        assert!(list_dir(scratch.path()).is_empty());
        assert!(image.exists());
    }

    #[tokio::test]
    async fn missing_engine_leaves_nothing_behind() {
        let input = tempfile::TempDir::new().unwrap();
        let scratch = tempfile::TempDir::new().unwrap();
        let image = write_test_png(input.path(), "scan.png", 16, 16);
        let ctx = context_with_tesseract(scratch.path(), "/nonexistent/tesseract");

        let err = perform_ocr(&ctx, &image, OcrEngineKind::Tesseract)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::OcrEngineUnavailable { .. }), "{err}");
        assert!(list_dir(scratch.path()).is_empty());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn failing_engine_leaves_nothing_behind() {
        let input = tempfile::TempDir::new().unwrap();
        let scratch = tempfile::TempDir::new().unwrap();
        let image = write_test_png(input.path(), "scan.png", 16, 16);
        let ctx = context_with_tesseract(scratch.path(), "false");

        let err = perform_ocr(&ctx, &image, OcrEngineKind::Tesseract)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::OcrFailed(_)), "{err}");
        assert!(list_dir(scratch.path()).is_empty());
    }

    /// Write an executable shell script.
    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt as _;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A context whose poppler tools are stand-ins: a three-page "PDF" whose
    /// pages rasterize to copies of `page_image`.
    #[cfg(unix)]
    fn context_with_fake_poppler(
        tools_dir: &Path,
        scratch_dir: &Path,
        page_image: &Path,
        tesseract: &str,
    ) -> ExtractionContext {
        let mut ctx = context_with_tesseract(scratch_dir, tesseract);
        ctx.tools.pdfinfo = write_script(tools_dir, "pdfinfo", "echo 'Pages:          3'\n");
        // Called as `-png -r DPI -f FIRST -l LAST INPUT OUTPUT_ROOT`.
        ctx.tools.pdftocairo = write_script(
            tools_dir,
            "pdftocairo",
            &format!(
                "page=$5\nwhile [ \"$page\" -le \"$7\" ]; do\n  \
                 cp '{}' \"$9-$page.png\" || exit 1\n  \
                 page=$((page + 1))\ndone\n",
                page_image.display()
            ),
        );
        ctx
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn scanned_pdf_cleans_up_when_ocr_fails() {
        let input = tempfile::TempDir::new().unwrap();
        let tools = tempfile::TempDir::new().unwrap();
        let scratch = tempfile::TempDir::new().unwrap();
        let page_image = write_test_png(input.path(), "page.png", 16, 16);
        let pdf_path = input.path().join("scan.pdf");
        std::fs::write(&pdf_path, b"stand-in").unwrap();
        let ctx =
            context_with_fake_poppler(tools.path(), scratch.path(), &page_image, "false");

        let err = ocr_scanned_pdf(&ctx, &pdf_path, OcrEngineKind::Tesseract, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::OcrFailed(_)), "{err}");
        assert!(list_dir(scratch.path()).is_empty());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn scanned_pdf_range_is_clamped_and_cleaned_up() {
        let input = tempfile::TempDir::new().unwrap();
        let tools = tempfile::TempDir::new().unwrap();
        let scratch = tempfile::TempDir::new().unwrap();
        let page_image = write_test_png(input.path(), "page.png", 16, 16);
        let pdf_path = input.path().join("scan.pdf");
        std::fs::write(&pdf_path, b"stand-in").unwrap();
        let ctx = context_with_fake_poppler(tools.path(), scratch.path(), &page_image, "echo");

        let text = ocr_scanned_pdf(
            &ctx,
            &pdf_path,
            OcrEngineKind::Tesseract,
            Some(PageRange { start: 2, end: 9 }),
        )
        .await
        .unwrap();
        let headers = text
            .lines()
            .filter(|line| line.starts_with("=== Page "))
            .collect::<Vec<_>>();
        assert_eq!(headers, vec!["=== Page 2 ===", "=== Page 3 ==="]);
        assert!(list_dir(scratch.path()).is_empty());
        assert!(page_image.exists());
    }

    #[tokio::test]
    #[ignore = "Requires poppler-utils to be installed"]
    async fn scanned_pdf_pages_are_ocred_in_order() {
        let input = tempfile::TempDir::new().unwrap();
        let scratch = tempfile::TempDir::new().unwrap();
        let text = (1..=60).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let pdf_path = input.path().join("scan.pdf");
        std::fs::write(
            &pdf_path,
            crate::export::render(&text, crate::export::OutputFormat::Pdf).unwrap(),
        )
        .unwrap();
        let mut ctx = context_with_tesseract(scratch.path(), "echo");
        ctx.rasterize_dpi = 36;

        let text = ocr_scanned_pdf(
            &ctx,
            &pdf_path,
            OcrEngineKind::Tesseract,
            Some(PageRange { start: 2, end: 3 }),
        )
        .await
        .unwrap();
        assert!(text.starts_with("=== Page 2 ===\n"));
        assert!(text.contains("\n=== Page 3 ===\n"));
        assert!(!text.contains("=== Page 1 ==="));
        assert!(list_dir(scratch.path()).is_empty());
    }
}
