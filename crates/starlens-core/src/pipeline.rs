//! Upload and ask orchestration.
//!
//! Both operations are stateless: everything an ask needs beyond the question
//! is resubmitted by the caller from the upload result.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::identifier::CelebrityIdentifier;
use crate::localizer::{FaceLocalizer, LocalizeError};
use crate::qa::QaEngine;
use crate::types::{
    AskOutcome, AskRequest, IdentificationResult, Question, UploadOutcome, NO_FACE_NOTICE,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Localize(#[from] LocalizeError),
    #[error("face localization task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Identification stage seam.
#[async_trait]
pub trait Identify: Send + Sync {
    async fn identify(&self, image: &[u8]) -> IdentificationResult;
}

/// Question-answering stage seam.
#[async_trait]
pub trait Answer: Send + Sync {
    async fn answer(&self, question: &Question) -> String;
}

#[async_trait]
impl Identify for CelebrityIdentifier {
    async fn identify(&self, image: &[u8]) -> IdentificationResult {
        CelebrityIdentifier::identify(self, image).await
    }
}

#[async_trait]
impl Answer for QaEngine {
    async fn answer(&self, question: &Question) -> String {
        self.ask(&question.name, &question.question_text).await
    }
}

/// The localize → identify → answer pipeline.
///
/// Holds only shared, read-only collaborators; one instance serves any
/// number of concurrent requests.
#[derive(Clone)]
pub struct Pipeline {
    localizer: FaceLocalizer,
    identifier: Arc<dyn Identify>,
    qa: Arc<dyn Answer>,
}

impl Pipeline {
    pub fn new(localizer: FaceLocalizer, identifier: Arc<dyn Identify>, qa: Arc<dyn Answer>) -> Self {
        Self {
            localizer,
            identifier,
            qa,
        }
    }

    /// Localize the face in `image`, then identify the person.
    ///
    /// Identification always sees the original bytes, not the annotated copy.
    /// When no face is found the identification is discarded and the profile
    /// text becomes [`NO_FACE_NOTICE`].
    pub async fn upload(&self, image: Vec<u8>) -> Result<UploadOutcome, PipelineError> {
        let image = Arc::new(image);

        let localizer = self.localizer.clone();
        let original = Arc::clone(&image);
        let localization =
            tokio::task::spawn_blocking(move || localizer.localize(&original)).await??;

        let identification = self.identifier.identify(&image).await;

        let outcome = match localization.region {
            Some(region) => UploadOutcome {
                profile_text: identification.profile_text,
                name: identification.name,
                image: localization.image,
                region: Some(region),
            },
            None => {
                tracing::info!(
                    discarded_name = %identification.name,
                    "no face; overriding identification"
                );
                UploadOutcome {
                    profile_text: NO_FACE_NOTICE.to_string(),
                    name: String::new(),
                    image: localization.image,
                    region: None,
                }
            }
        };
        Ok(outcome)
    }

    /// Answer a follow-up question, echoing the caller's context unchanged.
    pub async fn ask(&self, request: AskRequest) -> AskOutcome {
        let question = Question {
            name: request.name,
            question_text: request.question_text,
        };
        let answer = self.qa.answer(&question).await;
        AskOutcome {
            profile_text: request.profile_text,
            annotated_image: request.annotated_image,
            question_text: question.question_text,
            answer,
        }
    }
}
