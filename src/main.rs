use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod batch;
mod cmd;
mod cpu_limit;
mod errors;
mod export;
mod extractors;
mod prelude;
mod settings;
mod source;
mod ui;

/// Extract text from web pages, PDFs and images.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - SCRAPEY_CONFIG (optional): Override the settings file location.
  - SCRAPEY_TESSERACT, SCRAPEY_EASYOCR, SCRAPEY_PDFINFO, SCRAPEY_PDFTOTEXT,
    SCRAPEY_PDFTOCAIRO (optional): Override the external tools we run.
  - RUST_LOG (optional): Log filter, for example `debug`.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    /// Settings file to use.
    #[clap(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Extract text from a batch of web pages, PDFs or images.
    Extract(cmd::extract::ExtractOpts),
    /// Print the number of pages in a PDF.
    Pages(cmd::pages::PagesOpts),
    /// Show or change settings.
    Settings(cmd::settings::SettingsOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Extract(opts) => opts.output_path.is_none(),
            Cmd::Pages(_) | Cmd::Settings(_) => true,
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the progress bar if we're using stdout for output.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    let config_path = opts.config.as_deref();
    match &opts.subcmd {
        Cmd::Extract(extract_opts) => {
            cmd::extract::cmd_extract(ui, config_path, extract_opts).await?;
        }
        Cmd::Pages(pages_opts) => {
            cmd::pages::cmd_pages(pages_opts).await?;
        }
        Cmd::Settings(settings_opts) => {
            cmd::settings::cmd_settings(config_path, settings_opts).await?;
        }
    }
    Ok(())
}
