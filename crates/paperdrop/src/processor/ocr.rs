use std::io::Cursor;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::BackendError;
use crate::processor::subprocess::run_tool;
use crate::processor::{ExtractionBackend, ExtractionInput, ExtractionMethod};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Tesseract page segmentation mode 1: automatic with orientation detection.
const PAGE_SEG_MODE: &str = "1";

/// Tesseract OCR over images and rasterised PDF pages.
#[derive(Clone)]
pub struct OcrBackend {
    inner: Arc<OcrBackendInner>,
}

struct OcrBackendInner {
    languages: String,
    dpi: u32,
    tessdata_dir: Option<String>,
}

impl OcrBackend {
    pub fn new(languages: &[String], dpi: u32, tessdata_dir: Option<String>) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(OcrBackendInner {
                languages: lang_str,
                dpi,
                tessdata_dir,
            }),
        }
    }

    pub fn dpi(&self) -> u32 {
        self.inner.dpi
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    /// Decodes any supported raster format and runs OCR on it.
    pub fn recognize_image_bytes(&self, image_data: &[u8]) -> Result<String, BackendError> {
        let _span = tracing::info_span!("backend.ocr.image").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| BackendError::NotAnImage(e.to_string()))?;

        // leptess only reads formats leptonica was built with; PNG is always there.
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| BackendError::Ocr(format!("Failed to convert image: {}", e)))?;

        self.recognize_png(&png_data)
    }

    fn recognize_png(&self, png_data: &[u8]) -> Result<String, BackendError> {
        let mut lt =
            leptess::LepTess::new(self.inner.tessdata_dir.as_deref(), &self.inner.languages)
                .map_err(|e| BackendError::Ocr(format!("Failed to initialize Tesseract: {}", e)))?;

        lt.set_variable(leptess::Variable::TesseditPagesegMode, PAGE_SEG_MODE)
            .map_err(|e| BackendError::Ocr(format!("Failed to set page segmentation: {}", e)))?;

        lt.set_image_from_mem(png_data)
            .map_err(|e| BackendError::Ocr(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| BackendError::Ocr(format!("Failed to read OCR text: {}", e)))
    }

    /// Rasterises every page with `pdftoppm` and OCRs them in page order.
    /// Pages that fail to render or recognise are skipped; if none render
    /// at all the whole document is reported as a rasterisation failure.
    /// Stops with `DeadlinePassed` once `deadline` is reached.
    fn recognize_pdf(
        &self,
        pdf_bytes: &[u8],
        deadline: Option<Instant>,
    ) -> Result<String, BackendError> {
        let _span = tracing::info_span!("backend.ocr.pdf").entered();

        let page_count = match lopdf::Document::load_mem(pdf_bytes) {
            Ok(doc) => doc.get_pages().len(),
            Err(e) => {
                debug!("lopdf could not parse PDF ({}), asking pdfinfo", e);
                count_pdf_pages(pdf_bytes, deadline)?
            }
        };

        let work_dir = tempfile::tempdir()
            .map_err(|e| BackendError::Rasterize(format!("Failed to create work dir: {}", e)))?;
        let pdf_path = work_dir.path().join("document.pdf");
        std::fs::write(&pdf_path, pdf_bytes)
            .map_err(|e| BackendError::Rasterize(format!("Failed to write temp PDF: {}", e)))?;

        let mut all_text = String::new();
        let mut rendered = 0usize;
        let mut last_error = None;

        for page_num in 1..=page_count as u32 {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                debug!("Deadline reached before page {}", page_num);
                return Err(BackendError::DeadlinePassed);
            }

            let rendered_page =
                render_pdf_page(&pdf_path, work_dir.path(), page_num, self.inner.dpi, deadline);
            let image_data = match rendered_page {
                Ok(data) => data,
                Err(BackendError::DeadlinePassed) => return Err(BackendError::DeadlinePassed),
                Err(e) => {
                    warn!("Failed to render page {}: {}", page_num, e);
                    last_error = Some(e);
                    continue;
                }
            };
            rendered += 1;

            match self.recognize_png(&image_data) {
                Ok(page_text) => {
                    all_text.push_str(page_text.trim_end());
                    all_text.push('\n');
                }
                Err(e) => warn!("OCR failed on page {}: {}", page_num, e),
            }
        }

        if rendered == 0 {
            return Err(last_error.unwrap_or_else(|| {
                BackendError::Rasterize("document has no pages".to_string())
            }));
        }

        Ok(all_text)
    }
}

impl ExtractionBackend for OcrBackend {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, BackendError> {
        let data = input.read()?;

        if data.starts_with(PDF_MAGIC) {
            self.recognize_pdf(&data, input.deadline)
        } else {
            self.recognize_image_bytes(&data)
        }
    }
}

/// Page count via `pdfinfo` (poppler-utils), for PDFs lopdf cannot parse.
fn count_pdf_pages(pdf_bytes: &[u8], deadline: Option<Instant>) -> Result<usize, BackendError> {
    let temp_file = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| BackendError::Rasterize(format!("Failed to create temp PDF: {}", e)))?;
    std::fs::write(temp_file.path(), pdf_bytes)
        .map_err(|e| BackendError::Rasterize(format!("Failed to write temp PDF: {}", e)))?;

    let output = run_tool(Command::new("pdfinfo").arg(temp_file.path()), deadline)?;

    if !output.status.success() {
        return Err(BackendError::Rasterize(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(parse_page_count(&String::from_utf8_lossy(&output.stdout)).unwrap_or(1))
}

fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output
        .lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|count| count.trim().parse::<usize>().ok())
}

fn render_pdf_page(
    pdf_path: &Path,
    out_dir: &Path,
    page_num: u32,
    dpi: u32,
    deadline: Option<Instant>,
) -> Result<Vec<u8>, BackendError> {
    let output_prefix = out_dir.join(format!("page-{}", page_num));
    let page = page_num.to_string();

    let output = run_tool(
        Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg("-singlefile")
            .arg(pdf_path)
            .arg(&output_prefix),
        deadline,
    )?;

    if !output.status.success() {
        return Err(BackendError::Rasterize(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // -singlefile writes exactly `<prefix>.png`.
    let image_path = output_prefix.with_extension("png");
    let image_data = std::fs::read(&image_path).map_err(|e| {
        BackendError::Rasterize(format!("Failed to read rendered page {}: {}", page_num, e))
    })?;
    let _ = std::fs::remove_file(&image_path);

    Ok(image_data)
}
