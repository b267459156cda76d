//! Serializing extracted text into one of our output formats.

use std::{fmt, io::BufWriter, str::FromStr};

use clap::ValueEnum;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde_json::ser::PrettyFormatter;

use crate::{errors::ExportError, prelude::*};

/// A4 page size, plus the margins and line height we lay text out with.
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const BOTTOM_MARGIN_MM: f32 = 15.0;
const LINE_HEIGHT_MM: f32 = 10.0;
const FONT_SIZE_PT: f32 = 12.0;

/// Output formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "text", alias = "TEXT")]
    Text,
    #[serde(rename = "JSON", alias = "json", alias = "Json")]
    Json,
    #[serde(rename = "CSV", alias = "csv", alias = "Csv")]
    Csv,
    #[serde(rename = "HTML", alias = "html", alias = "Html")]
    Html,
    #[serde(rename = "PDF", alias = "pdf", alias = "Pdf")]
    Pdf,
}

impl OutputFormat {
    /// The file suffix for this format, including the leading dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            OutputFormat::Text => ".txt",
            OutputFormat::Json => ".json",
            OutputFormat::Csv => ".csv",
            OutputFormat::Html => ".html",
            OutputFormat::Pdf => ".pdf",
        }
    }

    /// Is this a binary format that shouldn't be dumped onto a terminal?
    pub fn is_binary(&self) -> bool {
        matches!(self, OutputFormat::Pdf)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "Text",
            OutputFormat::Json => "JSON",
            OutputFormat::Csv => "CSV",
            OutputFormat::Html => "HTML",
            OutputFormat::Pdf => "PDF",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "html" => Ok(OutputFormat::Html),
            "pdf" => Ok(OutputFormat::Pdf),
            _ => Err(anyhow!(
                "unknown output format {:?} (supported: Text, JSON, CSV, HTML, PDF)",
                s
            )),
        }
    }
}

/// Append the format's suffix to `path` unless it already ends with it.
pub fn output_path_with_suffix(path: &Path, format: OutputFormat) -> PathBuf {
    let suffix = format.suffix();
    let as_str = path.to_string_lossy();
    if as_str.ends_with(suffix) {
        path.to_owned()
    } else {
        PathBuf::from(format!("{}{}", as_str, suffix))
    }
}

/// The JSON document we write.
#[derive(Debug, Deserialize, Serialize)]
pub struct JsonExport {
    pub text: String,
}

/// Render `text` in the requested format.
#[instrument(level = "debug", skip(text))]
pub fn render(text: &str, format: OutputFormat) -> Result<Vec<u8>, ExportError> {
    if text.trim().is_empty() {
        return Err(ExportError::NothingToExport);
    }
    match format {
        OutputFormat::Text => Ok(text.as_bytes().to_vec()),
        OutputFormat::Json => render_json(text),
        OutputFormat::Csv => render_csv(text),
        OutputFormat::Html => Ok(render_html(text).into_bytes()),
        OutputFormat::Pdf => render_pdf(text),
    }
}

fn render_json(text: &str) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    JsonExport {
        text: text.to_owned(),
    }
    .serialize(&mut ser)?;
    Ok(out)
}

/// One single-column record per line.
fn render_csv(text: &str) -> Result<Vec<u8>, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for line in text.lines() {
        wtr.write_record([line])?;
    }
    wtr.into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

fn render_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    format!("<html><body><pre>{}</pre></body></html>", escaped)
}

/// Lay out one line per text row, starting a new page whenever the next row
/// would run into the bottom margin.
fn render_pdf(text: &str) -> Result<Vec<u8>, ExportError> {
    let pdf_err = |err: printpdf::Error| ExportError::Pdf(format!("{:?}", err));

    let (doc, page, layer) = PdfDocument::new(
        "Extracted text",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;

    let mut current_layer = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;
    for line in text.lines() {
        if y - LINE_HEIGHT_MM < BOTTOM_MARGIN_MM {
            let (page, layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            current_layer = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        y -= LINE_HEIGHT_MM;
        current_layer.use_text(
            to_builtin_font_charset(line),
            FONT_SIZE_PT,
            Mm(MARGIN_MM),
            Mm(y),
            &font,
        );
    }

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer).map_err(pdf_err)?;
    writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

/// The built-in PDF fonts only cover Latin-1, so replace anything else.
fn to_builtin_font_charset(line: &str) -> String {
    line.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if u32::from(c) < 0x100 => c,
            _ => '?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: &str = "=== Results for a.png ===\nHello, <world> & co.\n\nsecond line\n";

    #[test]
    fn formats_parse_and_display() {
        for format in [
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::Csv,
            OutputFormat::Html,
            OutputFormat::Pdf,
        ] {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("docx".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn suffixes_are_added_once() {
        assert_eq!(
            output_path_with_suffix(Path::new("out"), OutputFormat::Json),
            PathBuf::from("out.json")
        );
        assert_eq!(
            output_path_with_suffix(Path::new("out.json"), OutputFormat::Json),
            PathBuf::from("out.json")
        );
        assert_eq!(
            output_path_with_suffix(Path::new("out.txt"), OutputFormat::Csv),
            PathBuf::from("out.txt.csv")
        );
    }

    #[test]
    fn empty_text_is_refused() {
        assert!(matches!(
            render(" \n\t", OutputFormat::Text),
            Err(ExportError::NothingToExport)
        ));
    }

    #[test]
    fn text_is_written_verbatim() {
        assert_eq!(render(SAMPLE, OutputFormat::Text).unwrap(), SAMPLE.as_bytes());
    }

    #[test]
    fn json_preserves_text_exactly() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, render(SAMPLE, OutputFormat::Json).unwrap()).unwrap();

        let data = std::fs::read_to_string(&path).unwrap();
        assert!(data.contains("\n    \"text\": "));
        let parsed: JsonExport = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed.text, SAMPLE);
    }

    #[test]
    fn csv_has_one_row_per_line() {
        let bytes = render(SAMPLE, OutputFormat::Csv).unwrap();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&bytes[..]);
        let rows = rdr
            .records()
            .map(|r| r.unwrap().get(0).unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                "=== Results for a.png ===",
                "Hello, <world> & co.",
                "",
                "second line"
            ]
        );
    }

    #[test]
    fn html_is_escaped_and_preformatted() {
        let html = String::from_utf8(render(SAMPLE, OutputFormat::Html).unwrap()).unwrap();
        assert!(html.starts_with("<html><body><pre>=== Results for a.png ==="));
        assert!(html.contains("Hello, &lt;world&gt; &amp; co."));
        assert!(html.ends_with("</pre></body></html>"));
    }

    #[test]
    fn pdf_output_is_a_pdf() {
        let long_text = (1..=60).map(|i| format!("line {i} – ok")).collect::<Vec<_>>().join("\n");
        let bytes = render(&long_text, OutputFormat::Pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn non_latin1_characters_are_replaced_in_pdfs() {
        assert_eq!(to_builtin_font_charset("café\t東京"), "café ??");
    }
}
