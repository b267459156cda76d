//! Tesseract OCR engine.

use tokio::process::Command;

use crate::{errors::ExtractError, prelude::*, source::OcrEngineKind};

use super::{OcrEngine, run_engine_command};

/// OCR engine wrapping the `tesseract` CLI tool.
pub struct TesseractEngine {
    command: PathBuf,
}

impl TesseractEngine {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn kind(&self) -> OcrEngineKind {
        OcrEngineKind::Tesseract
    }

    #[instrument(level = "debug", skip_all, fields(path = %image_path.display(), language))]
    async fn recognize(&self, image_path: &Path, language: &str) -> Result<String, ExtractError> {
        // An output base of "stdout" makes tesseract print the text.
        let mut cmd = Command::new(&self.command);
        cmd.arg(image_path).arg("stdout").arg("-l").arg(language);
        run_engine_command(
            self.kind(),
            "install tesseract-ocr and the language data you need",
            &mut cmd,
        )
        .await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_image_and_language() {
        // `echo` stands in for tesseract and prints its arguments.
        let engine = TesseractEngine::new(PathBuf::from("echo"));
        let text = engine
            .recognize(Path::new("/tmp/in.png"), "deu")
            .await
            .unwrap();
        assert_eq!(text, "/tmp/in.png stdout -l deu\n");
    }

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let engine = TesseractEngine::new(PathBuf::from("/nonexistent/tesseract"));
        let err = engine
            .recognize(Path::new("/tmp/in.png"), "eng")
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ExtractError::OcrEngineUnavailable {
                    engine: OcrEngineKind::Tesseract,
                    ..
                }
            ),
            "{err}"
        );
    }

    #[tokio::test]
    async fn failing_executable_is_an_ocr_failure() {
        let engine = TesseractEngine::new(PathBuf::from("false"));
        let err = engine
            .recognize(Path::new("/tmp/in.png"), "eng")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::OcrFailed(_)), "{err}");
    }
}
