#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lopdf::{dictionary, Document, Object, Stream};

use paperdrop::processor::{ExtractionBackend, ExtractionInput, ExtractionMethod};
use paperdrop::BackendError;

/// Builds a PDF with one page per entry in `page_contents`. Pages share a
/// Courier font bound to `/F1`.
pub fn pdf_with_pages(page_contents: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for content in page_contents {
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.as_bytes().to_vec(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF");
    bytes
}

/// A single-page PDF whose text layer reads `text`.
pub fn text_pdf(text: &str) -> Vec<u8> {
    pdf_with_pages(&[&format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text)])
}

/// A PDF that only draws vector lines, like a scan without a text layer.
pub fn scanned_pdf() -> Vec<u8> {
    pdf_with_pages(&["0 0 m 612 792 l S"])
}

/// What a [`ScriptedBackend`] does when called.
#[derive(Clone)]
pub enum Script {
    Text(&'static str),
    Fail(&'static str),
    Panic(&'static str),
    Sleep(Duration, &'static str),
    /// Polls until the input's deadline passes, then gives up.
    UntilDeadline,
}

/// Backend that follows a fixed script and counts its invocations.
pub struct ScriptedBackend {
    method: ExtractionMethod,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(method: ExtractionMethod, script: Script) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Self {
            method,
            script,
            calls: Arc::clone(&calls),
        };
        (backend, calls)
    }
}

impl ExtractionBackend for ScriptedBackend {
    fn method(&self) -> ExtractionMethod {
        self.method
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Text(text) => Ok(text.to_string()),
            Script::Fail(reason) => Err(BackendError::NoStructuredText(reason.to_string())),
            Script::Panic(message) => panic!("{}", message),
            Script::Sleep(duration, text) => {
                std::thread::sleep(*duration);
                Ok(text.to_string())
            }
            Script::UntilDeadline => {
                if input.deadline.is_none() {
                    return Err(BackendError::NoStructuredText("no deadline".to_string()));
                }
                while !input.is_past_deadline() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                input.check_deadline().map(|_| String::new())
            }
        }
    }
}

/// Scripted pdf_layout, ocr and partition backends in chain order, with
/// their call counters.
pub fn scripted_chain(
    pdf_layout: Script,
    ocr: Script,
    partition: Script,
) -> (Vec<Box<dyn ExtractionBackend>>, Vec<Arc<AtomicUsize>>) {
    let mut backends: Vec<Box<dyn ExtractionBackend>> = Vec::new();
    let mut counters = Vec::new();
    for (method, script) in [
        (ExtractionMethod::PdfLayout, pdf_layout),
        (ExtractionMethod::Ocr, ocr),
        (ExtractionMethod::Partition, partition),
    ] {
        let (backend, calls) = ScriptedBackend::new(method, script);
        backends.push(Box::new(backend));
        counters.push(calls);
    }
    (backends, counters)
}

pub fn total_calls(counters: &[Arc<AtomicUsize>]) -> usize {
    counters.iter().map(|c| c.load(Ordering::SeqCst)).sum()
}
