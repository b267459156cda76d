//! Error types shared by the extractors, the batch dispatcher and the
//! exporters.
//!
//! Command-level code works in terms of [`anyhow::Error`]. Everything below
//! that uses these typed errors, so callers (and tests) can tell an HTTP 404
//! from a missing OCR engine without parsing messages.

use std::{io, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

use crate::source::{OcrEngineKind, Source};

/// Why a single source could not be extracted.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The PDF could not be opened, counted or parsed.
    #[error("cannot read PDF {path:?}: {reason}")]
    UnreadablePdf { path: PathBuf, reason: String },

    /// The OCR engine's executable is not installed.
    #[error("OCR engine {engine} is not available: {hint}")]
    OcrEngineUnavailable { engine: OcrEngineKind, hint: String },

    /// Any other OCR failure.
    #[error("OCR failed: {0}")]
    OcrFailed(String),

    /// The server answered with something other than 200 OK.
    #[error("error fetching URL: HTTP {status}")]
    HttpError { status: StatusCode },

    /// We never got an HTTP response at all.
    #[error("error fetching URL: {0}")]
    Fetch(String),

    /// A file extractor was handed a URL.
    #[error("{0} is not a local file")]
    NotAFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractError {
    /// Build an [`ExtractError::UnreadablePdf`].
    pub fn unreadable_pdf(path: &std::path::Path, reason: impl Into<String>) -> Self {
        ExtractError::UnreadablePdf {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Why a batch stopped.
#[derive(Debug, Error)]
pub enum BatchError {
    /// An extractor failed. The batch stops at the first failure.
    #[error("failed to extract text from {input}: {cause}")]
    ExtractionFailed {
        input: Source,
        #[source]
        cause: ExtractError,
    },

    /// Another batch is still running on this runner.
    #[error("a batch is already running")]
    BatchInFlight,

    /// The background task panicked or was cancelled.
    #[error("batch task did not complete: {0}")]
    Join(String),
}

/// Why exporting failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no output to save")]
    NothingToExport,

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("failed to write JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV output: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write PDF output: {0}")]
    Pdf(String),
}

/// Why loading, saving or updating settings failed.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown setting {0:?} (expected ocr_language, default_ocr_engine or default_output_format)")]
    UnknownKey(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot determine a configuration directory; use --config")]
    NoConfigDir,
}
