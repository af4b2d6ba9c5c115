//! Document text extraction.
//!
//! Dispatches on the file extension: PDF (`pdf-extract`), DOCX (`docx-rs`),
//! HTML (`htmd`) and plain text. PDF and DOCX sit behind the `pdf` / `docx`
//! cargo features (both on by default) to keep slim builds possible.
//!
//! HTML comes out as visible text: htmd walks the DOM, but headings,
//! emphasis, links and code are rendered without their markdown markers.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use htmd::Element;
use htmd::element_handler::{HandlerResult, Handlers};
use htmd::options::{BulletListMarker, Options};
use regex::Regex;
use thiserror::Error;

/// Backslash escapes htmd puts in front of markdown-significant characters.
static MARKDOWN_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([\\`*_\[\]<.+#=~>-])").expect("valid markdown escape regex"));

/// Extensions (lower-case, no dot) the parser accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "html"];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("HTML extraction failed: {0}")]
    Html(String),
    #[error("feature not enabled: rebuild with --features {0}")]
    FeatureDisabled(String),
    #[error("no text could be extracted from {0}")]
    NoText(String),
}

/// Extracted text plus a little provenance for logs.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    pub word_count: usize,
    /// Extraction backend used (`"pdf-extract"`, `"docx-rs"`, `"htmd"`, `"plain"`).
    pub method: &'static str,
}

/// Lower-cased final extension, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
}

/// Extract trimmed plain text from `path`.
pub fn parse_document(path: &Path) -> Result<String, ParseError> {
    parse_document_detailed(path).map(|doc| doc.text)
}

pub fn parse_document_detailed(path: &Path) -> Result<ParsedDocument, ParseError> {
    let ext = extension_of(path);
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ParseError::UnsupportedFormat(if ext.is_empty() {
            "<none>".to_string()
        } else {
            format!(".{ext}")
        }));
    }

    let data = fs::read(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let (text, method) = match ext.as_str() {
        "pdf" => (extract_pdf(&data)?, "pdf-extract"),
        "docx" => (extract_docx(&data)?, "docx-rs"),
        "html" => (extract_html(&data)?, "htmd"),
        _ => (extract_plain(&data), "plain"),
    };

    let text = text.trim().to_string();
    let word_count = text.split_whitespace().count();
    Ok(ParsedDocument { text, word_count, method })
}

/// UTF-8 with invalid sequences replaced rather than rejected.
fn extract_plain(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn extract_html(data: &[u8]) -> Result<String, ParseError> {
    let html = String::from_utf8_lossy(data);
    let converter = htmd::HtmlToMarkdown::builder()
        .options(Options {
            bullet_list_marker: BulletListMarker::Dash,
            ul_bullet_spacing: 1,
            ol_number_spacing: 1,
            ..Default::default()
        })
        .skip_tags(vec!["script", "style", "head", "noscript", "img"])
        .add_handler(
            vec!["h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre"],
            block_text,
        )
        .add_handler(vec!["a", "strong", "b", "em", "i", "code"], inline_text)
        .add_handler(vec!["hr"], paragraph_break)
        .build();
    let text = converter
        .convert(&html)
        .map_err(|e| ParseError::Html(e.to_string()))?;
    Ok(MARKDOWN_ESCAPE.replace_all(&text, "$1").into_owned())
}

/// A block element as a bare paragraph.
fn block_text(handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
    let content = handlers.walk_children(element.node).content;
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    Some(format!("\n\n{content}\n\n").into())
}

fn paragraph_break(_: &dyn Handlers, _: Element) -> Option<HandlerResult> {
    Some("\n\n".into())
}

fn inline_text(handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
    Some(handlers.walk_children(element.node).content.into())
}

#[cfg(feature = "pdf")]
fn extract_pdf(data: &[u8]) -> Result<String, ParseError> {
    // pdf-extract panics on some structurally valid but malformed files
    // (missing /Resources, unknown font encodings).
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data)) {
        Ok(result) => result.map_err(|e| ParseError::Pdf(e.to_string())),
        Err(payload) => Err(ParseError::Pdf(format!(
            "extractor panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

#[cfg(feature = "pdf")]
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_data: &[u8]) -> Result<String, ParseError> {
    Err(ParseError::FeatureDisabled("pdf".to_string()))
}

#[cfg(feature = "docx")]
fn extract_docx(data: &[u8]) -> Result<String, ParseError> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild, read_docx};

    let docx = read_docx(data).map_err(|e| ParseError::Docx(e.to_string()))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(para) => Some(
                para.children
                    .iter()
                    .filter_map(|pc| match pc {
                        ParagraphChild::Run(run) => Some(
                            run.children
                                .iter()
                                .filter_map(|rc| match rc {
                                    RunChild::Text(t) => Some(t.text.as_str()),
                                    _ => None,
                                })
                                .collect::<String>(),
                        ),
                        _ => None,
                    })
                    .collect::<String>(),
            ),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

#[cfg(not(feature = "docx"))]
fn extract_docx(_data: &[u8]) -> Result<String, ParseError> {
    Err(ParseError::FeatureDisabled("docx".to_string()))
}
