//! Generic content partitioning.
//!
//! Ignores the declared media type and sniffs the bytes instead, splitting
//! whatever structure it recognises into ordered text segments. A PDF whose
//! fonts lopdf cannot decode page-wise may still yield raw text runs here.

use lopdf::content::Content;
use lopdf::Object;
use tracing::debug;

use crate::error::BackendError;
use crate::processor::docx;
use crate::processor::{ExtractionBackend, ExtractionInput, ExtractionMethod};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A paragraph of a text or DOCX document.
    Paragraph,
    /// One `BT ... ET` text object of a PDF content stream.
    TextRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Paragraph,
            text: text.into(),
        }
    }

    fn text_run(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::TextRun,
            text: text.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PartitionBackend;

impl PartitionBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionBackend for PartitionBackend {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Partition
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, BackendError> {
        let filename = input.filename();
        let _span = tracing::info_span!("backend.partition", file = %filename).entered();

        let data = input.read()?;
        let segments = partition(&data)?;
        debug!("Partitioned {} into {} segments", filename, segments.len());

        Ok(join_segments(&segments))
    }
}

/// Splits `bytes` into text segments based on the detected content.
pub fn partition(bytes: &[u8]) -> Result<Vec<Segment>, BackendError> {
    if bytes.is_empty() {
        return Err(BackendError::EmptyDocument);
    }

    if bytes.starts_with(ZIP_MAGIC) {
        if !docx::is_docx_archive(bytes) {
            return Err(BackendError::NoStructuredText(
                "zip archive without a word document".to_string(),
            ));
        }
        let paragraphs = docx::extract_docx_paragraphs(bytes)?;
        return Ok(paragraphs.into_iter().map(Segment::paragraph).collect());
    }

    if bytes.starts_with(PDF_MAGIC) {
        return partition_pdf(bytes);
    }

    if let Ok(format) = image::guess_format(bytes) {
        return Err(BackendError::NoStructuredText(format!(
            "{:?} image has no text layer",
            format
        )));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') => Ok(partition_text(text)),
        _ => Err(BackendError::NoStructuredText("binary content".to_string())),
    }
}

pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn partition_text(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                segments.push(Segment::paragraph(current.join("\n")));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        segments.push(Segment::paragraph(current.join("\n")));
    }

    segments
}

fn partition_pdf(bytes: &[u8]) -> Result<Vec<Segment>, BackendError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| BackendError::PdfSyntax(e.to_string()))?;

    let mut segments = Vec::new();

    for (page_num, page_id) in doc.get_pages() {
        let content = match doc
            .get_page_content(page_id)
            .and_then(|data| Content::decode(&data))
        {
            Ok(content) => content,
            Err(e) => {
                debug!("Skipping content of page {}: {}", page_num, e);
                continue;
            }
        };

        let mut run = String::new();
        for operation in &content.operations {
            match operation.operator.as_str() {
                "Tj" | "'" | "\"" => {
                    if let Some(operand) = operation.operands.last() {
                        push_string_operand(&mut run, operand);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operation.operands.first() {
                        for item in items {
                            push_string_operand(&mut run, item);
                        }
                    }
                }
                "T*" | "Td" | "TD" => {
                    if !run.is_empty() && !run.ends_with('\n') {
                        run.push('\n');
                    }
                }
                "ET" => {
                    let text = run.trim();
                    if !text.is_empty() {
                        segments.push(Segment::text_run(text));
                    }
                    run.clear();
                }
                _ => {}
            }
        }
    }

    if segments.is_empty() {
        return Err(BackendError::NoStructuredText(
            "PDF has no text runs".to_string(),
        ));
    }

    Ok(segments)
}

/// String operands are decoded byte-per-char (PDFDocEncoding is a
/// superset of Latin-1 for printable text).
fn push_string_operand(run: &mut String, operand: &Object) {
    if let Object::String(bytes, _) = operand {
        run.extend(bytes.iter().map(|&b| b as char));
    }
}
