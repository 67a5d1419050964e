use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while turning an uploaded document into text
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Document is not valid UTF-8 text: {0}")]
    InvalidEncoding(#[from] std::string::FromUtf8Error),

    #[error("No extractor available for {0} documents")]
    ExtractorUnavailable(DocumentFormat),

    #[error("Failed to extract text from {format} document: {reason}")]
    Failed {
        format: DocumentFormat,
        reason: String,
    },
}

/// Document formats recognized from a declared MIME type or filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::PlainText => "plain text",
        };
        f.write_str(name)
    }
}

const WORD_MIME_TYPES: [&str; 2] = [
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
];

const TEXT_MIME_TYPES: [&str; 2] = ["text/plain", "text/markdown"];

impl DocumentFormat {
    /// Detect the format from a MIME type or a filename
    ///
    /// MIME types are compared case-insensitively, filename extensions are not.
    pub fn detect(declared_type: &str) -> Result<Self, ExtractError> {
        let lower = declared_type.to_lowercase();

        if lower == "application/pdf" || declared_type.ends_with(".pdf") {
            Ok(DocumentFormat::Pdf)
        } else if WORD_MIME_TYPES.contains(&lower.as_str())
            || declared_type.ends_with(".docx")
            || declared_type.ends_with(".doc")
        {
            Ok(DocumentFormat::Docx)
        } else if TEXT_MIME_TYPES.contains(&lower.as_str())
            || declared_type.ends_with(".txt")
            || declared_type.ends_with(".md")
        {
            Ok(DocumentFormat::PlainText)
        } else {
            Err(ExtractError::UnsupportedFormat(declared_type.to_string()))
        }
    }
}

/// Converts the bytes of one document format into plain text
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// UTF-8 text and markdown
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

impl ExtractError {
    fn failed(format: DocumentFormat, reason: impl fmt::Display) -> Self {
        ExtractError::Failed {
            format,
            reason: reason.to_string(),
        }
    }
}

/// Text layer of a PDF
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        // The PDF parser panics on some malformed inputs
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ExtractError::failed(DocumentFormat::Pdf, e)),
            Err(_) => Err(ExtractError::failed(DocumentFormat::Pdf, "parser panicked")),
        }
    }
}

const DOCX_BODY: &str = "word/document.xml";

/// Paragraph text of a Word document, one paragraph per line
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl DocumentExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(docx_failure)?;
        let mut xml = String::new();
        archive
            .by_name(DOCX_BODY)
            .map_err(docx_failure)?
            .read_to_string(&mut xml)
            .map_err(docx_failure)?;

        docx_paragraphs(&xml).map_err(docx_failure)
    }
}

fn docx_failure(err: impl fmt::Display) -> ExtractError {
    ExtractError::failed(DocumentFormat::Docx, err)
}

/// Join the text runs (`w:t`) of each paragraph (`w:p`) with newlines
fn docx_paragraphs(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => current.push('\t'),
                b"w:br" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

/// Registry dispatching documents to a per-format extractor
///
/// The default registry handles PDF, DOCX and plain text. Extractors can be
/// replaced or added with [`TextExtractor::with_extractor`].
#[derive(Clone)]
pub struct TextExtractor {
    extractors: HashMap<DocumentFormat, Arc<dyn DocumentExtractor>>,
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::empty()
            .with_extractor(DocumentFormat::Pdf, PdfExtractor)
            .with_extractor(DocumentFormat::Docx, DocxExtractor)
            .with_extractor(DocumentFormat::PlainText, PlainTextExtractor)
    }

    /// Registry with no extractors; every format is unavailable
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register (or replace) the extractor for a format
    pub fn with_extractor(
        mut self,
        format: DocumentFormat,
        extractor: impl DocumentExtractor + 'static,
    ) -> Self {
        self.extractors.insert(format, Arc::new(extractor));
        self
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.extractors.contains_key(&format)
    }

    /// Extract plain text from a document given its declared MIME type or filename
    pub fn extract_text(&self, bytes: &[u8], declared_type: &str) -> Result<String, ExtractError> {
        let format = DocumentFormat::detect(declared_type)?;
        let extractor = self
            .extractors
            .get(&format)
            .ok_or(ExtractError::ExtractorUnavailable(format))?;

        tracing::debug!("Extracting {} bytes as {}", bytes.len(), format);
        extractor.extract(bytes)
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextExtractor")
            .field("formats", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperCaseExtractor;

    impl DocumentExtractor for UpperCaseExtractor {
        fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
            Ok(String::from_utf8_lossy(bytes).to_uppercase())
        }
    }

    #[test]
    fn test_detect_from_mime() {
        assert_eq!(DocumentFormat::detect("application/pdf").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::detect("Application/PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::detect("application/msword").unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::detect("text/markdown").unwrap(), DocumentFormat::PlainText);
    }

    #[test]
    fn test_detect_from_filename() {
        assert_eq!(DocumentFormat::detect("resume.pdf").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::detect("resume.docx").unwrap(), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::detect("job.txt").unwrap(), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::detect("job.md").unwrap(), DocumentFormat::PlainText);
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let err = DocumentFormat::detect("image/png").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref t) if t == "image/png"));
    }

    #[test]
    fn test_plain_text_round_trip() {
        let extractor = TextExtractor::new();
        let text = extractor.extract_text("5 years Python, AWS".as_bytes(), "text/plain").unwrap();
        assert_eq!(text, "5 years Python, AWS");
    }

    #[test]
    fn test_invalid_utf8() {
        let extractor = TextExtractor::new();
        let err = extractor.extract_text(&[0xff, 0xfe, 0xfd], "cv.txt").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidEncoding(_)));
    }

    const RESUME_PDF: &[u8] = include_bytes!("../../tests/fixtures/resume.pdf");
    const RESUME_DOCX: &[u8] = include_bytes!("../../tests/fixtures/resume.docx");

    #[test]
    fn test_default_registry_supports_all_formats() {
        let extractor = TextExtractor::new();
        assert!(extractor.supports(DocumentFormat::Pdf));
        assert!(extractor.supports(DocumentFormat::Docx));
        assert!(extractor.supports(DocumentFormat::PlainText));
    }

    #[test]
    fn test_pdf_text() {
        let text = TextExtractor::new().extract_text(RESUME_PDF, "application/pdf").unwrap();
        assert!(text.contains("Senior Rust engineer"), "got: {:?}", text);
        assert!(text.contains("5 years Python, AWS"), "got: {:?}", text);
    }

    #[test]
    fn test_docx_paragraphs_joined_by_newline() {
        let text = TextExtractor::new().extract_text(RESUME_DOCX, "resume.docx").unwrap();
        assert_eq!(text, "Senior Rust engineer\n5 years Python, AWS & Kubernetes\n\nZürich");
    }

    #[test]
    fn test_docx_tabs_and_breaks() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Skills</w:t><w:tab/><w:t>Rust</w:t><w:br/><w:t>Go</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(docx_paragraphs(xml).unwrap(), "Skills\tRust\nGo");
    }

    #[test]
    fn test_corrupt_pdf_fails() {
        let err = TextExtractor::new()
            .extract_text(b"this is not a pdf", "cv.pdf")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Failed { format: DocumentFormat::Pdf, .. }));
    }

    #[test]
    fn test_corrupt_docx_fails() {
        let extractor = TextExtractor::new();

        let not_zip = extractor.extract_text(b"plain bytes", "cv.docx").unwrap_err();
        assert!(matches!(not_zip, ExtractError::Failed { format: DocumentFormat::Docx, .. }));

        // Legacy .doc files are not zip archives either
        let legacy = extractor.extract_text(&[0xd0, 0xcf, 0x11, 0xe0], "application/msword").unwrap_err();
        assert!(matches!(legacy, ExtractError::Failed { format: DocumentFormat::Docx, .. }));
    }

    #[test]
    fn test_recognized_format_without_extractor() {
        let extractor = TextExtractor::empty();
        assert!(!extractor.supports(DocumentFormat::Pdf));

        let err = extractor.extract_text(b"%PDF-1.7", "cv.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::ExtractorUnavailable(DocumentFormat::Pdf)));
    }

    #[test]
    fn test_registered_extractor_is_used() {
        let extractor = TextExtractor::new().with_extractor(DocumentFormat::Docx, UpperCaseExtractor);
        let text = extractor.extract_text(b"rust", "cv.docx").unwrap();
        assert_eq!(text, "RUST");
    }
}
