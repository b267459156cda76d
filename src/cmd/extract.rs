//! The `extract` subcommand.

use std::sync::Arc;

use clap::Args;

use crate::{
    async_utils::io::write_output,
    batch::{BatchRequest, BatchRunner, ProgressFn},
    export::{OutputFormat, output_path_with_suffix, render},
    extractors::{DEFAULT_RASTERIZE_DPI, ExtractionContext, SystemExtractors, ToolCommands},
    prelude::*,
    settings::Settings,
    source::{CropRegion, ExtractionOptions, OcrEngineKind, PageRange, Source, SourceKind},
    ui::{ProgressConfig, Ui, show_batch_progress},
};

use super::load_settings;

/// Extract command line arguments.
#[derive(Debug, Args)]
pub struct ExtractOpts {
    /// URLs (for `--kind web`) or file paths to extract text from.
    #[clap(required = true, value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// What kind of sources these are.
    #[clap(short = 'k', long, value_enum)]
    pub kind: SourceKind,

    /// OCR engine. Defaults to the `default_ocr_engine` setting.
    #[clap(long, value_enum)]
    pub engine: Option<OcrEngineKind>,

    /// OCR language, as a Tesseract language code. Defaults to the
    /// `ocr_language` setting.
    #[clap(long = "lang", value_name = "LANG")]
    pub language: Option<String>,

    /// Only extract these pages of PDFs, for example `2-5` or `3`.
    #[clap(long, value_name = "S-E")]
    pub pages: Option<PageRange>,

    /// Only OCR this region of a single image, in pixels.
    #[clap(long, value_name = "X1,Y1,X2,Y2")]
    pub crop: Option<CropRegion>,

    /// Output format. Defaults to the `default_output_format` setting.
    #[clap(short = 'f', long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write output here instead of standard output. The format's suffix is
    /// added if missing.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// Max number of sources to extract at a time.
    #[clap(short = 'j', long = "jobs", default_value = "1")]
    pub job_count: usize,

    /// Directory for temporary files. Defaults to the system temporary
    /// directory.
    #[clap(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// The DPI to use when rasterizing scanned PDFs for OCR.
    #[clap(long, default_value_t = DEFAULT_RASTERIZE_DPI)]
    pub rasterize_dpi: u32,

    #[clap(flatten)]
    pub tools: ToolCommands,
}

impl ExtractOpts {
    /// Check option combinations that clap can't express.
    fn validate(&self) -> Result<()> {
        if self.job_count == 0 {
            return Err(anyhow!("--jobs must be at least 1"));
        }
        Ok(())
    }

    /// Build the batch, filling in defaults from `settings`. Options that
    /// don't apply to this batch are dropped with a warning.
    fn batch_request(&self, settings: &Settings) -> BatchRequest {
        let mut page_range = self.pages;
        if self.kind == SourceKind::Web && page_range.is_some() {
            warn!("--pages is ignored for web pages");
            page_range = None;
        }
        let mut request = BatchRequest {
            sources: self
                .sources
                .iter()
                .map(|id| Source::from_identifier(self.kind, id))
                .collect(),
            kind: self.kind,
            options: ExtractionOptions {
                engine: self.engine.unwrap_or(settings.default_ocr_engine),
                page_range,
                crop_region: self.crop,
            },
            jobs: self.job_count,
        };
        if let Some(crop) = request.options.crop_region
            && !request.crop_applies()
        {
            warn!(
                "--crop {} is ignored: it only applies to `--kind image-ocr` with a single non-PDF image",
                crop
            );
            request.options.crop_region = None;
        }
        request
    }
}

/// The `extract` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_extract(
    ui: Ui,
    config_path: Option<&Path>,
    opts: &ExtractOpts,
) -> Result<()> {
    opts.validate()?;
    let (_, settings) = load_settings(config_path)?;

    let format = opts.format.unwrap_or(settings.default_output_format);
    let output_path = opts
        .output_path
        .as_deref()
        .map(|path| output_path_with_suffix(path, format));
    if output_path.is_none() && format.is_binary() {
        return Err(anyhow!("{} output must be written to a file with --out", format));
    }

    let mut ctx = ExtractionContext::new(
        opts.language
            .clone()
            .unwrap_or_else(|| settings.ocr_language.clone()),
    );
    if let Some(scratch_dir) = &opts.scratch_dir {
        ctx.scratch_dir = scratch_dir.to_owned();
    }
    ctx.tools = opts.tools.clone();
    ctx.rasterize_dpi = opts.rasterize_dpi;

    let request = opts.batch_request(&settings);
    debug!(?request, ?ctx, "Starting batch");

    // Configure our progress bar.
    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "📄",
            msg: "Extracting text",
            done_msg: "Extracted text",
        },
        request.sources.len() as u64,
    );
    let progress: ProgressFn = {
        let pb = pb.clone();
        Arc::new(move |event| show_batch_progress(&pb, event))
    };

    let runner = BatchRunner::new(Arc::new(SystemExtractors::new(ctx)));
    let result = runner.submit(request, progress)?.join().await?;
    pb.finish();

    let bytes = render(&result.text(), format)?;
    write_output(output_path.as_deref(), &bytes).await?;
    if let Some(path) = &output_path {
        info!(path = %path.display(), %format, "Wrote results");
    }
    Ok(())
}
