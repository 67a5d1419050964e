// Core pipeline exports
pub mod assessment;
pub mod extract;
pub mod identity;
pub mod matcher;

pub use assessment::{parse_assessment, strip_code_fence, AssessmentError};
pub use extract::{
    DocumentExtractor, DocumentFormat, DocxExtractor, ExtractError, PdfExtractor, PlainTextExtractor,
    TextExtractor,
};
pub use identity::{content_key, CacheKey};
pub use matcher::Matcher;
