//! Intake Document Processing
//!
//! PDF text extraction, the model round trip and the batch runner that feeds
//! the application and medication tables.

pub mod extraction;
pub mod llm_client;
pub mod pdf_processor;
pub mod prompt;
pub mod response;

pub use extraction::{discover_pdfs, ArtifactPaths, DocumentOutcome, Pipeline, RunSummary};
pub use llm_client::{CompletionClient, OpenAiClient};
pub use pdf_processor::{
    build_extractor, compare_extractors, comparison_report, ExtractorSample, TextExtractor,
};
pub use prompt::PromptBuilder;
pub use response::{parse_response, ParsedResponse};
