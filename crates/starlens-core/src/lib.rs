//! starlens-core — Celebrity lookup from a photo.
//!
//! Localizes the largest face with a cascade detector, identifies the person
//! through a vision-language model, and answers follow-up questions through
//! a text model. The server side holds no session state.

pub mod detector;
pub mod identifier;
pub mod llm;
pub mod localizer;
pub mod pipeline;
pub mod prompts;
pub mod qa;
pub mod types;

pub use detector::{CascadeDetector, DetectorSettings, FaceDetector};
pub use identifier::CelebrityIdentifier;
pub use llm::ModelEndpoint;
pub use localizer::{AnnotationStyle, FaceLocalizer, Localization};
pub use pipeline::{Answer, Identify, Pipeline, PipelineError};
pub use qa::QaEngine;
pub use types::{
    AskOutcome, AskRequest, FaceRegion, IdentificationResult, Question, SessionState,
    UploadOutcome,
};
