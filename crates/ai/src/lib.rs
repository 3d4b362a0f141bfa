//! Incident classification: model boundary, response parsing and the
//! knowledge-base-first orchestrator.

#![warn(missing_docs)]

pub mod classifier;
pub mod parser;
pub mod orchestrator;

pub use classifier::{build_prompt, ClassifierError, LanguageModel, OllamaLanguageModel};
pub use parser::{apply_defaults, extract_fields, ExtractedFields, ParseError, ResponseParser};
pub use orchestrator::{validate, ClassificationOrchestrator, ClassifyError, AI_GENERATED_TAG};
