//! I/O utilities.

use tokio::io::{AsyncWrite, AsyncWriteExt as _};

use crate::prelude::*;

/// Create a writer for either standard output or a file.
async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write rendered output to either standard output or a file.
pub async fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    let mut writer = create_writer(path).await?;
    writer
        .write_all(bytes)
        .await
        .context("Failed to write output")?;
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}
