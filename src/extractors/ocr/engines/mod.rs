//! OCR engine interface.

use std::{io, process::Output};

use tokio::process::Command;

use crate::{
    async_utils::check_for_command_failure,
    errors::ExtractError,
    extractors::ToolCommands,
    prelude::*,
    source::OcrEngineKind,
};

use self::{easyocr::EasyOcrEngine, tesseract::TesseractEngine};

pub mod easyocr;
pub mod tesseract;

/// An OCR engine that can read the text in one image file.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Which engine this is.
    fn kind(&self) -> OcrEngineKind;

    /// Recognize the text in `image_path`. `language` is a Tesseract
    /// language code.
    async fn recognize(&self, image_path: &Path, language: &str) -> Result<String, ExtractError>;
}

/// Get the OCR engine for `kind`.
pub fn engine_for(kind: OcrEngineKind, tools: &ToolCommands) -> Box<dyn OcrEngine> {
    match kind {
        OcrEngineKind::Tesseract => Box::new(TesseractEngine::new(tools.tesseract.clone())),
        OcrEngineKind::EasyOcr => Box::new(EasyOcrEngine::new(tools.easyocr.clone())),
    }
}

/// Run an engine's command and return its standard output.
///
/// A missing executable is [`ExtractError::OcrEngineUnavailable`]. Anything
/// else that goes wrong is [`ExtractError::OcrFailed`].
async fn run_engine_command(
    kind: OcrEngineKind,
    install_hint: &str,
    cmd: &mut Command,
) -> Result<String, ExtractError> {
    let output: Output = cmd.output().await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ExtractError::OcrEngineUnavailable {
                engine: kind,
                hint: install_hint.to_owned(),
            }
        } else {
            ExtractError::OcrFailed(format!("cannot run {}: {}", kind, err))
        }
    })?;
    check_for_command_failure(kind.as_str(), &output, None)
        .map_err(|err| ExtractError::OcrFailed(format!("{:#}", err)))?;
    String::from_utf8(output.stdout).map_err(|err| {
        ExtractError::OcrFailed(format!("{} output was not valid UTF-8: {}", kind, err))
    })
}
