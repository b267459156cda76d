//! EasyOCR engine, via the `easyocr` command-line tool.

use tokio::process::Command;

use crate::{errors::ExtractError, prelude::*, source::OcrEngineKind};

use super::{OcrEngine, run_engine_command};

/// Tesseract language codes and their EasyOCR equivalents.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("eng", "en"),
    ("fra", "fr"),
    ("deu", "de"),
    ("spa", "es"),
    ("ita", "it"),
    ("por", "pt"),
    ("rus", "ru"),
    ("chi_sim", "ch_sim"),
    ("jpn", "ja"),
    ("kor", "ko"),
];

/// Map a Tesseract language spec (`"eng"`, `"eng+fra"`) to EasyOCR language
/// codes. Unknown codes pass through unchanged.
pub fn easyocr_languages(tesseract_language: &str) -> Vec<&str> {
    tesseract_language
        .split('+')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| {
            LANGUAGE_CODES
                .iter()
                .find(|(tess, _)| *tess == code)
                .map_or(code, |(_, easy)| *easy)
        })
        .collect()
}

/// OCR engine wrapping the `easyocr` CLI tool.
pub struct EasyOcrEngine {
    command: PathBuf,
}

impl EasyOcrEngine {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }
}

#[async_trait]
impl OcrEngine for EasyOcrEngine {
    fn kind(&self) -> OcrEngineKind {
        OcrEngineKind::EasyOcr
    }

    #[instrument(level = "debug", skip_all, fields(path = %image_path.display(), language))]
    async fn recognize(&self, image_path: &Path, language: &str) -> Result<String, ExtractError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg("-l")
            .args(easyocr_languages(language))
            .arg("-f")
            .arg(image_path)
            .arg("--detail")
            .arg("0");
        let stdout =
            run_engine_command(self.kind(), "install it with `pip install easyocr`", &mut cmd)
                .await?;

        // With `--detail 0`, each recognized string is printed on its own line.
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_tesseract_languages() {
        assert_eq!(easyocr_languages("eng"), vec!["en"]);
        assert_eq!(easyocr_languages("chi_sim+jpn"), vec!["ch_sim", "ja"]);
        assert_eq!(easyocr_languages("nld"), vec!["nld"]);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn builds_easyocr_arguments() {
        let engine = EasyOcrEngine::new(PathBuf::from("echo"));
        let text = engine
            .recognize(Path::new("/tmp/in.png"), "fra+deu")
            .await
            .unwrap();
        assert_eq!(text, "-l fr de -f /tmp/in.png --detail 0");
    }

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let engine = EasyOcrEngine::new(PathBuf::from("/nonexistent/easyocr"));
        let err = engine
            .recognize(Path::new("/tmp/in.png"), "eng")
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ExtractError::OcrEngineUnavailable {
                    engine: OcrEngineKind::EasyOcr,
                    ..
                }
            ),
            "{err}"
        );
    }
}
