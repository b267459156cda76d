//! The `pages` subcommand.

use clap::Args;

use crate::{
    async_utils::io::write_output,
    extractors::{ExtractionContext, ToolCommands, pdf::get_pdf_page_count},
    prelude::*,
};

/// Pages command line arguments.
#[derive(Debug, Args)]
pub struct PagesOpts {
    /// The PDF to count pages in.
    #[clap(value_name = "PDF")]
    pub path: PathBuf,

    #[clap(flatten)]
    pub tools: ToolCommands,
}

/// The `pages` subcommand. Prints the number of pages in a PDF, which is the
/// upper bound for `extract --pages`.
#[instrument(level = "debug", skip_all, fields(path = %opts.path.display()))]
pub async fn cmd_pages(opts: &PagesOpts) -> Result<()> {
    let ctx = ExtractionContext {
        tools: opts.tools.clone(),
        ..ExtractionContext::new("")
    };
    let count = get_pdf_page_count(&ctx, &opts.path).await?;
    write_output(None, format!("{}\n", count).as_bytes()).await
}
