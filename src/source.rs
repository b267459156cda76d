//! Batch inputs: sources, their kind, and the options that narrow what we
//! extract from them.

use std::{fmt, ops::RangeInclusive, str::FromStr};

use clap::ValueEnum;

use crate::prelude::*;

/// One input to a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A web page.
    Web(String),
    /// A local file (PDF or image).
    File(PathBuf),
}

impl Source {
    /// Build a source from a raw identifier, using the batch's kind to decide
    /// how to interpret it. We never sniff content here.
    pub fn from_identifier(kind: SourceKind, identifier: &str) -> Self {
        match kind {
            SourceKind::Web => Source::Web(identifier.to_owned()),
            SourceKind::Pdf | SourceKind::ImageOcr => {
                Source::File(PathBuf::from(identifier))
            }
        }
    }

    /// The base name used in result headers.
    pub fn label(&self) -> String {
        match self {
            Source::Web(url) => url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty() && !s.ends_with(':'))
                .map(str::to_owned)
                .unwrap_or_else(|| url.clone()),
            Source::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    /// The local file this source names, if it is one.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Source::Web(_) => None,
            Source::File(path) => Some(path),
        }
    }

    /// Does this source name a PDF file? Decided by extension only.
    pub fn is_pdf(&self) -> bool {
        match self {
            Source::Web(_) => false,
            Source::File(path) => path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Web(url) => write!(f, "{}", url),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Which extractor handles every source in a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Web pages, fetched over HTTP.
    Web,
    /// PDFs with a text layer.
    Pdf,
    /// Images, or scanned PDFs, run through OCR.
    #[value(name = "image-ocr", alias = "ocr")]
    ImageOcr,
}

/// The OCR engines we know how to drive.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    #[default]
    #[serde(alias = "Tesseract")]
    Tesseract,
    #[serde(alias = "EasyOCR", alias = "EasyOcr")]
    #[value(name = "easyocr")]
    EasyOcr,
}

impl OcrEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrEngineKind::Tesseract => "tesseract",
            OcrEngineKind::EasyOcr => "easyocr",
        }
    }
}

impl fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OcrEngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tesseract" => Ok(OcrEngineKind::Tesseract),
            "easyocr" => Ok(OcrEngineKind::EasyOcr),
            _ => Err(anyhow!(
                "unknown OCR engine {:?} (supported: tesseract, easyocr)",
                s
            )),
        }
    }
}

/// An inclusive, 1-based range of pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Create a new [`PageRange`].
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(anyhow!(
                "page range start {} is after its end {}",
                start,
                end
            ));
        }
        Ok(Self { start, end })
    }

    /// Clamp an optional range into `1..=total_pages`. `None` means every
    /// page. The result may be empty if the range lies past the end of the
    /// document.
    pub fn clamp(range: Option<PageRange>, total_pages: usize) -> RangeInclusive<usize> {
        match range {
            Some(range) => range.start.max(1)..=range.end.min(total_pages),
            None => 1..=total_pages,
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for PageRange {
    type Err = anyhow::Error;

    /// Parse `"S-E"` or `"N"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse_page = |p: &str| {
            p.trim()
                .parse::<usize>()
                .with_context(|| format!("invalid page number {:?}", p))
        };
        match s.split_once('-') {
            Some((start, end)) => Self::new(parse_page(start)?, parse_page(end)?),
            None => {
                let page = parse_page(s)?;
                Self::new(page, page)
            }
        }
    }
}

/// A rectangle in original-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

impl FromStr for CropRegion {
    type Err = anyhow::Error;

    /// Parse `"x1,y1,x2,y2"`.
    fn from_str(s: &str) -> Result<Self> {
        let coords = s
            .split(',')
            .map(|c| {
                c.trim()
                    .parse::<u32>()
                    .with_context(|| format!("invalid crop coordinate {:?}", c))
            })
            .collect::<Result<Vec<_>>>()?;
        let [x1, y1, x2, y2] = coords[..] else {
            return Err(anyhow!(
                "crop region must have 4 coordinates (x1,y1,x2,y2), got {:?}",
                s
            ));
        };
        if x2 <= x1 || y2 <= y1 {
            return Err(anyhow!(
                "crop region {:?} is empty: need x2 > x1 and y2 > y1",
                s
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }
}

/// Options that apply to every source in a batch.
#[derive(Clone, Debug, Default)]
pub struct ExtractionOptions {
    /// Used only for [`SourceKind::ImageOcr`].
    pub engine: OcrEngineKind,
    /// Used only for PDFs, and scanned PDFs under OCR.
    pub page_range: Option<PageRange>,
    /// Used only for single, non-PDF images under OCR.
    pub crop_region: Option<CropRegion>,
}
