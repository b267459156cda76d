//! PDF support via poppler-utils: page counts, text layers and
//! rasterization.

use std::{collections::BTreeMap, io, ops::RangeInclusive, process::Output, sync::LazyLock};

use regex::Regex;
use tokio::process::Command;

use crate::{
    async_utils::check_for_command_failure,
    cpu_limit::with_cpu_semaphore,
    errors::ExtractError,
    prelude::*,
    source::PageRange,
};

use super::{ExtractionContext, join_page_blocks};

/// A default error regex for checking command output.
static ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Page images written by `pdftocairo`, which zero-pads the page number.
static PAGE_IMAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^page-(\d+)\.png$").expect("failed to compile regex")
});

/// Does this line contain an error?
fn is_error_line(line: &str) -> bool {
    ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// Run a poppler tool against `pdf_path`, turning every failure into
/// [`ExtractError::UnreadablePdf`].
async fn run_poppler_tool(
    tool_name: &str,
    pdf_path: &Path,
    cmd: &mut Command,
    is_error_line: Option<&(dyn Fn(&str) -> bool + Sync)>,
) -> Result<Output, ExtractError> {
    let output = cmd.output().await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ExtractError::unreadable_pdf(
                pdf_path,
                format!("{} not found (is poppler-utils installed?)", tool_name),
            )
        } else {
            ExtractError::unreadable_pdf(
                pdf_path,
                format!("failed to run {}: {}", tool_name, err),
            )
        }
    })?;
    check_for_command_failure(tool_name, &output, is_error_line)
        .map_err(|err| ExtractError::unreadable_pdf(pdf_path, format!("{:#}", err)))?;
    Ok(output)
}

/// Count the pages in a PDF using `pdfinfo`.
#[instrument(level = "debug", skip(ctx), fields(path = %path.display()))]
pub async fn get_pdf_page_count(
    ctx: &ExtractionContext,
    path: &Path,
) -> Result<usize, ExtractError> {
    let mut cmd = Command::new(&ctx.tools.pdfinfo);
    cmd.arg(path);
    let output = run_poppler_tool("pdfinfo", path, &mut cmd, None).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_page_count(&stdout).ok_or_else(|| {
        ExtractError::unreadable_pdf(path, "failed to find page count in pdfinfo output")
    })
}

/// Parse the `Pages:` property out of `pdfinfo` output.
fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    let mut properties = BTreeMap::new();
    for line in pdfinfo_output.lines() {
        let mut parts = line.splitn(2, ':');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        properties.insert(key, value);
    }
    properties.get("Pages")?.parse::<usize>().ok()
}

/// Extract the text layer of `path`, one `=== Page N ===` block per non-empty
/// page in the clamped range.
#[instrument(level = "debug", skip(ctx), fields(path = %path.display()))]
pub async fn extract_pdf_text(
    ctx: &ExtractionContext,
    path: &Path,
    page_range: Option<PageRange>,
) -> Result<String, ExtractError> {
    let total_pages = get_pdf_page_count(ctx, path).await?;
    let pages = PageRange::clamp(page_range, total_pages);
    if pages.is_empty() {
        debug!(total_pages, "No pages selected");
        return Ok(String::new());
    }

    // Writing to "-" sends the text to stdout.
    let mut cmd = Command::new(&ctx.tools.pdftotext);
    cmd.arg("-f")
        .arg(pages.start().to_string())
        .arg("-l")
        .arg(pages.end().to_string())
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-");
    let output = run_poppler_tool("pdftotext", path, &mut cmd, None).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(join_page_blocks(split_pdftotext_pages(&stdout, pages)))
}

/// `pdftotext` ends every page with a form feed. Pair each page's text with
/// its page number.
fn split_pdftotext_pages(output: &str, pages: RangeInclusive<usize>) -> Vec<(usize, String)> {
    pages
        .zip(output.split('\x0C'))
        .map(|(page, text)| (page, text.to_owned()))
        .collect()
}

/// Rasterize `pages` of `path` into PNG files in `out_dir`, returning them in
/// page order.
#[instrument(level = "debug", skip(ctx, out_dir), fields(path = %path.display()))]
pub async fn rasterize_pages(
    ctx: &ExtractionContext,
    path: &Path,
    pages: RangeInclusive<usize>,
    out_dir: &Path,
) -> Result<Vec<(usize, PathBuf)>, ExtractError> {
    let mut cmd = Command::new(&ctx.tools.pdftocairo);
    cmd.arg("-png")
        .arg("-r")
        .arg(ctx.rasterize_dpi.to_string())
        .arg("-f")
        .arg(pages.start().to_string())
        .arg("-l")
        .arg(pages.end().to_string())
        .arg(path)
        .arg(out_dir.join("page"));

    // `pdftocairo` will use at least a full CPU.
    with_cpu_semaphore(|| {
        run_poppler_tool("pdftocairo", path, &mut cmd, Some(&is_error_line))
    })
    .await?;

    let mut page_images = vec![];
    for entry in std::fs::read_dir(out_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if let Some(page) = page_number_from_file_name(&file_name.to_string_lossy()) {
            page_images.push((page, entry.path()));
        }
    }
    page_images.sort();

    let expected = pages.count();
    if page_images.len() != expected {
        warn!(
            expected,
            found = page_images.len(),
            "pdftocairo produced an unexpected number of pages"
        );
    }
    Ok(page_images)
}

fn page_number_from_file_name(file_name: &str) -> Option<usize> {
    PAGE_IMAGE_REGEX
        .captures(file_name)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use crate::export::{OutputFormat, render};

    use super::*;

    /// Write a PDF with `lines` numbered lines, which our exporter lays out
    /// at 27 lines per page.
    fn write_fixture_pdf(dir: &Path, lines: usize) -> PathBuf {
        let text = (1..=lines)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let path = dir.join("fixture.pdf");
        std::fs::write(&path, render(&text, OutputFormat::Pdf).unwrap()).unwrap();
        path
    }

    #[test]
    fn parses_pdfinfo_output() {
        let output = "Title:          Extracted text\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(output), Some(12));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }

    #[test]
    fn splits_pages_on_form_feeds() {
        let pages = split_pdftotext_pages("two\n\x0C\n\x0Cfour\n\x0C", 2..=4);
        assert_eq!(
            pages,
            vec![
                (2, "two\n".to_owned()),
                (3, "\n".to_owned()),
                (4, "four\n".to_owned()),
            ]
        );
        assert_eq!(
            join_page_blocks(pages),
            "=== Page 2 ===\ntwo\n\n\n=== Page 4 ===\nfour\n\n"
        );
    }

    #[test]
    fn recognizes_rasterized_page_names() {
        assert_eq!(page_number_from_file_name("page-007.png"), Some(7));
        assert_eq!(page_number_from_file_name("page-1.png"), Some(1));
        assert_eq!(page_number_from_file_name("other.png"), None);
    }

    #[test]
    fn downgrades_xref_errors() {
        assert!(is_error_line("Syntax Error: Couldn't find trailer dictionary"));
        assert!(!is_error_line("Syntax Error: xref num 12 not found"));
    }

    #[tokio::test]
    async fn missing_tools_make_pdfs_unreadable() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = ExtractionContext::new("eng");
        ctx.tools.pdfinfo = dir.path().join("no-such-pdfinfo");
        let err = get_pdf_page_count(&ctx, &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnreadablePdf { .. }), "{err}");
    }

    #[tokio::test]
    #[ignore = "Requires poppler-utils to be installed"]
    async fn counts_pages() {
        let dir = tempfile::TempDir::new().unwrap();
        let pdf = write_fixture_pdf(dir.path(), 60);
        let ctx = ExtractionContext::new("eng");
        assert_eq!(get_pdf_page_count(&ctx, &pdf).await.unwrap(), 3);
    }

    #[tokio::test]
    #[ignore = "Requires poppler-utils to be installed"]
    async fn extracts_only_pages_in_range() {
        let dir = tempfile::TempDir::new().unwrap();
        let pdf = write_fixture_pdf(dir.path(), 60);
        let ctx = ExtractionContext::new("eng");

        let text = extract_pdf_text(&ctx, &pdf, Some(PageRange { start: 2, end: 9 }))
            .await
            .unwrap();
        assert!(!text.contains("=== Page 1 ==="));
        let page2 = text.find("=== Page 2 ===").unwrap();
        let page3 = text.find("=== Page 3 ===").unwrap();
        assert!(page2 < page3);
        assert!(text.contains("line 60"));
        assert!(!text.contains("line 1\n"));

        let nothing = extract_pdf_text(&ctx, &pdf, Some(PageRange { start: 5, end: 9 }))
            .await
            .unwrap();
        assert_eq!(nothing, "");
    }

    #[tokio::test]
    #[ignore = "Requires poppler-utils to be installed"]
    async fn garbage_is_unreadable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.pdf");
        std::fs::write(&path, b"this is not a PDF").unwrap();
        let ctx = ExtractionContext::new("eng");
        let err = extract_pdf_text(&ctx, &path, None).await.unwrap_err();
        assert!(matches!(err, ExtractError::UnreadablePdf { .. }), "{err}");
    }

    #[tokio::test]
    #[ignore = "Requires poppler-utils to be installed"]
    async fn rasterizes_selected_pages() {
        let dir = tempfile::TempDir::new().unwrap();
        let pdf = write_fixture_pdf(dir.path(), 60);
        let out_dir = tempfile::TempDir::new().unwrap();
        let mut ctx = ExtractionContext::new("eng");
        ctx.rasterize_dpi = 36;
        let pages = rasterize_pages(&ctx, &pdf, 2..=3, out_dir.path())
            .await
            .unwrap();
        assert_eq!(pages.iter().map(|(n, _)| *n).collect::<Vec<_>>(), vec![2, 3]);
    }
}
