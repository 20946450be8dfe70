//! Cascade face detector.
//!
//! The [`FaceDetector`] trait is the seam between the localizer and whatever
//! finds faces in an intensity grid. [`CascadeDetector`] implements it with
//! the SeetaFace funnel-structured cascade from `rustface`, scanning a window
//! over an image pyramid.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

// --- Named constants (no magic numbers) ---
const DEFAULT_SCALE_STEP: f32 = 1.1;
const DEFAULT_MIN_FACE_SIZE: u32 = 20;
const DEFAULT_SCORE_THRESHOLD: f64 = 2.0;
const DEFAULT_WINDOW_STEP: u32 = 4;
/// Smallest window the SeetaFace cascade accepts.
const CASCADE_MIN_WINDOW: u32 = 20;
/// The pyramid factor `1 / scale_step` must stay within the cascade's [0.01, 0.99].
const MIN_SCALE_STEP: f32 = 1.0 / 0.99;
const MAX_SCALE_STEP: f32 = 100.0;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; download seeta_fd_frontal_v1.0.bin and place it in models/")]
    ModelNotFound(String),
    #[error("failed to load cascade model: {0}")]
    ModelLoad(String),
    #[error("invalid detector settings: {0}")]
    InvalidSettings(String),
}

/// A raw face rectangle as reported by a detector.
///
/// The origin is signed and the box may overhang the frame; callers clip it
/// with [`crate::FaceRegion::within`].
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Cascade confidence score.
    pub score: f64,
}

/// Pluggable face detection backend.
///
/// Implementations must be stateless per call so one instance can be shared
/// across concurrent requests.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    ///
    /// Candidates come back in the detector's enumeration order, which must be
    /// deterministic for a given input.
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<Candidate>;
}

/// Tuning for the cascade scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    /// Ratio between successive pyramid levels (reference: 1.1).
    pub scale_step: f32,
    /// Smallest face, in pixels, the scan looks for.
    pub min_face_size: u32,
    /// Minimum cascade score for a window to count as a face. Plays the role
    /// of a minimum-neighbour count in sliding-window detectors.
    pub score_threshold: f64,
    /// Horizontal and vertical window stride in pixels.
    pub window_step: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            scale_step: DEFAULT_SCALE_STEP,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            window_step: DEFAULT_WINDOW_STEP,
        }
    }
}

impl DetectorSettings {
    pub fn validate(&self) -> Result<(), DetectorError> {
        if !(MIN_SCALE_STEP..=MAX_SCALE_STEP).contains(&self.scale_step) {
            return Err(DetectorError::InvalidSettings(format!(
                "scale_step must be in [{MIN_SCALE_STEP:.3}, {MAX_SCALE_STEP}], got {}",
                self.scale_step
            )));
        }
        if self.min_face_size < CASCADE_MIN_WINDOW {
            return Err(DetectorError::InvalidSettings(format!(
                "min_face_size must be at least {CASCADE_MIN_WINDOW}, got {}",
                self.min_face_size
            )));
        }
        if self.score_threshold.is_nan() || self.score_threshold < 0.0 {
            return Err(DetectorError::InvalidSettings(format!(
                "score_threshold must be non-negative, got {}",
                self.score_threshold
            )));
        }
        if self.window_step == 0 {
            return Err(DetectorError::InvalidSettings(
                "window_step must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Down-scale factor between pyramid levels, as the cascade expects it.
    fn pyramid_factor(&self) -> f32 {
        1.0 / self.scale_step
    }
}

/// SeetaFace cascade detector.
///
/// Holds the parsed model; each [`FaceDetector::detect`] call builds a fresh
/// scanner from it, so the type is shareable without locking.
pub struct CascadeDetector {
    model: rustface::Model,
    settings: DetectorSettings,
}

impl CascadeDetector {
    /// Load the SeetaFace model from the given path.
    pub fn load(model_path: &Path, settings: DetectorSettings) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }
        let file = std::fs::File::open(model_path)
            .map_err(|e| DetectorError::ModelLoad(format!("{}: {e}", model_path.display())))?;
        let detector = Self::from_reader(std::io::BufReader::new(file), settings)?;

        tracing::info!(
            path = %model_path.display(),
            settings = ?detector.settings,
            "loaded SeetaFace cascade model"
        );
        Ok(detector)
    }

    /// Parse a SeetaFace model from any reader.
    pub fn from_reader<R: Read>(reader: R, settings: DetectorSettings) -> Result<Self, DetectorError> {
        settings.validate()?;
        let model = rustface::read_model(reader)
            .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;
        Ok(Self { model, settings })
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<Candidate> {
        if width < self.settings.min_face_size
            || height < self.settings.min_face_size
            || gray.len() < width as usize * height as usize
        {
            return Vec::new();
        }

        let mut scanner = rustface::create_detector_with_model(self.model.clone());
        scanner.set_min_face_size(self.settings.min_face_size);
        scanner.set_score_thresh(self.settings.score_threshold);
        scanner.set_pyramid_scale_factor(self.settings.pyramid_factor());
        scanner.set_slide_window_step(self.settings.window_step, self.settings.window_step);

        let faces = scanner.detect(&rustface::ImageData::new(gray, width, height));
        tracing::debug!(width, height, faces = faces.len(), "cascade scan complete");

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Candidate {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                    score: face.score(),
                }
            })
            .collect()
    }
}
