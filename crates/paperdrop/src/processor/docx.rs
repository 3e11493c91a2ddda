use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::BackendError;

const DOCUMENT_XML: &str = "word/document.xml";

/// Returns the non-empty paragraphs of a DOCX archive in document order.
pub fn extract_docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, BackendError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| BackendError::Docx(format!("Failed to open DOCX: {}", e)))?;

    let xml = read_document_xml(&mut archive)?;
    parse_docx_xml(&xml)
}

/// True when the zip archive carries a Word main document part.
pub fn is_docx_archive(bytes: &[u8]) -> bool {
    match zip::ZipArchive::new(Cursor::new(bytes)) {
        Ok(mut archive) => {
            let found = archive.by_name(DOCUMENT_XML).is_ok();
            found
        }
        Err(_) => false,
    }
}

fn read_document_xml<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, BackendError> {
    let mut document_xml = archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| BackendError::Docx(format!("Failed to find document.xml: {}", e)))?;

    let mut xml_content = String::new();
    document_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| BackendError::Docx(format!("Failed to read document.xml: {}", e)))?;

    Ok(xml_content)
}

fn parse_docx_xml(xml: &str) -> Result<Vec<String>, BackendError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let decoded = e.unescape().unwrap_or_default();
                    current.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(BackendError::Docx(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}
