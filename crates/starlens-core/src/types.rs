use serde::{Deserialize, Serialize};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Placeholder profile text and name used when nothing could be identified.
pub const UNKNOWN: &str = "Unknown";

/// Profile text shown in place of an identification when no face was found.
pub const NO_FACE_NOTICE: &str = "No face detected. Please try another image.";

/// Answer returned when the question-answering endpoint fails.
pub const QA_FALLBACK: &str = "Sorry I couldn't find the answer";

/// Axis-aligned face rectangle in pixel coordinates of the decoded image.
///
/// Regions produced by [`FaceRegion::within`] are non-empty and fully inside
/// the image they were detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    /// Clip a raw detector rectangle to an `image_width` × `image_height` image.
    ///
    /// Detectors may report origins left of / above the frame or boxes that
    /// overhang the right and bottom edges. Returns `None` when nothing of the
    /// rectangle remains inside the image.
    pub fn within(
        x: i64,
        y: i64,
        width: u64,
        height: u64,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        let x0 = x.clamp(0, image_width as i64);
        let y0 = y.clamp(0, image_height as i64);
        let x1 = x.saturating_add(width as i64).clamp(0, image_width as i64);
        let y1 = y.saturating_add(height as i64).clamp(0, image_height as i64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

/// Output of the identification stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationResult {
    /// Labelled profile prose from the vision model, or `"Unknown"`.
    pub profile_text: String,
    /// Name pulled out of `profile_text`.
    pub name: String,
}

impl IdentificationResult {
    /// Result substituted when the vision endpoint could not be used.
    pub fn unavailable() -> Self {
        Self {
            profile_text: UNKNOWN.to_string(),
            name: String::new(),
        }
    }
}

/// A follow-up question about a named person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    pub question_text: String,
}

/// State the caller holds between an upload and its follow-up questions.
///
/// The server keeps none of this. It is handed back verbatim on every ask
/// and is not re-validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub profile_text: String,
    pub name: String,
    /// Standard base64 of the annotated JPEG, without a data-URI prefix.
    /// Empty when no face was found.
    pub annotated_image: String,
}

/// Result of the upload operation.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub profile_text: String,
    pub name: String,
    /// Annotated JPEG when `region` is set, otherwise the untouched input.
    pub image: Vec<u8>,
    pub region: Option<FaceRegion>,
}

impl UploadOutcome {
    /// Base64 of the annotated image, or an empty string when there is none
    /// worth displaying.
    pub fn annotated_image_base64(&self) -> String {
        match self.region {
            Some(_) => STANDARD.encode(&self.image),
            None => String::new(),
        }
    }

    /// The carrier the caller resubmits with each follow-up question.
    pub fn session(&self) -> SessionState {
        SessionState {
            profile_text: self.profile_text.clone(),
            name: self.name.clone(),
            annotated_image: self.annotated_image_base64(),
        }
    }
}

/// Caller-supplied input to the ask operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub name: String,
    pub profile_text: String,
    pub annotated_image: String,
    pub question_text: String,
}

impl AskRequest {
    pub fn from_session(session: SessionState, question_text: impl Into<String>) -> Self {
        Self {
            name: session.name,
            profile_text: session.profile_text,
            annotated_image: session.annotated_image,
            question_text: question_text.into(),
        }
    }
}

/// Result of the ask operation: the caller's context echoed back plus the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskOutcome {
    pub profile_text: String,
    pub annotated_image: String,
    pub question_text: String,
    pub answer: String,
}
