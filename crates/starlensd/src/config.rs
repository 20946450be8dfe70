use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use starlens_core::llm::{DEFAULT_API_URL, DEFAULT_MODEL};
use starlens_core::{AnnotationStyle, DetectorSettings, ModelEndpoint};

/// Daemon configuration.
///
/// Built from defaults, then an optional TOML file named by `STARLENS_CONFIG`,
/// then `STARLENS_*` environment variables. The API key only ever comes from
/// `GROQ_API_KEY`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind: SocketAddr,
    /// SeetaFace cascade model file.
    pub model_path: PathBuf,
    /// Chat-completions URL used by both model calls.
    pub api_url: String,
    pub vision_model: String,
    pub qa_model: String,
    /// Upper bound on each outbound model call.
    pub request_timeout_secs: u64,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
    pub scale_step: f32,
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub window_step: u32,
    /// Thickness of the face outline in pixels.
    pub outline_stroke: u32,
    /// JPEG quality (1-100) of the annotated image.
    pub jpeg_quality: u8,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let detector = DetectorSettings::default();
        let style = AnnotationStyle::default();
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            model_path: PathBuf::from("models/seeta_fd_frontal_v1.0.bin"),
            api_url: DEFAULT_API_URL.to_string(),
            vision_model: DEFAULT_MODEL.to_string(),
            qa_model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 30,
            max_upload_bytes: 10 * 1024 * 1024,
            scale_step: detector.scale_step,
            min_face_size: detector.min_face_size,
            score_threshold: detector.score_threshold,
            window_step: detector.window_step,
            outline_stroke: style.stroke,
            jpeg_quality: style.jpeg_quality,
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the process environment.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("STARLENS_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        config.api_key = lookup("GROQ_API_KEY").filter(|k| !k.is_empty());
        Ok(config)
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("STARLENS_BIND") {
            self.bind = v.parse().with_context(|| format!("STARLENS_BIND={v}"))?;
        }
        if let Some(v) = lookup("STARLENS_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("STARLENS_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("STARLENS_VISION_MODEL") {
            self.vision_model = v;
        }
        if let Some(v) = lookup("STARLENS_QA_MODEL") {
            self.qa_model = v;
        }
        env_parse(lookup, "STARLENS_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs)?;
        env_parse(lookup, "STARLENS_MAX_UPLOAD_BYTES", &mut self.max_upload_bytes)?;
        env_parse(lookup, "STARLENS_SCALE_STEP", &mut self.scale_step)?;
        env_parse(lookup, "STARLENS_MIN_FACE_SIZE", &mut self.min_face_size)?;
        env_parse(lookup, "STARLENS_SCORE_THRESHOLD", &mut self.score_threshold)?;
        env_parse(lookup, "STARLENS_WINDOW_STEP", &mut self.window_step)?;
        env_parse(lookup, "STARLENS_OUTLINE_STROKE", &mut self.outline_stroke)?;
        env_parse(lookup, "STARLENS_JPEG_QUALITY", &mut self.jpeg_quality)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.outline_stroke > 0, "outline_stroke must be > 0");
        ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "jpeg_quality must be in 1..=100, got {}",
            self.jpeg_quality
        );
        Ok(())
    }

    pub fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle {
            stroke: self.outline_stroke,
            jpeg_quality: self.jpeg_quality,
            ..AnnotationStyle::default()
        }
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            scale_step: self.scale_step,
            min_face_size: self.min_face_size,
            score_threshold: self.score_threshold,
            window_step: self.window_step,
        }
    }

    pub fn vision_endpoint(&self) -> ModelEndpoint {
        self.endpoint(&self.vision_model)
    }

    pub fn qa_endpoint(&self) -> ModelEndpoint {
        self.endpoint(&self.qa_model)
    }

    fn endpoint(&self, model: &str) -> ModelEndpoint {
        ModelEndpoint::new(&self.api_url, model, self.api_key.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(v) = lookup(key) {
        *slot = v.parse().with_context(|| format!("{key}={v}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_with(env(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.scale_step, 1.1);
        assert!(config.api_key.is_none());
        assert!(config.vision_endpoint().api_key.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::load_with(env(&[
            ("STARLENS_BIND", "0.0.0.0:9000"),
            ("STARLENS_API_URL", "http://localhost:1234/v1/chat/completions"),
            ("STARLENS_VISION_MODEL", "vision-x"),
            ("STARLENS_REQUEST_TIMEOUT_SECS", "5"),
            ("STARLENS_MIN_FACE_SIZE", "40"),
            ("GROQ_API_KEY", "gsk_test"),
        ]))
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.min_face_size, 40);

        let vision = config.vision_endpoint();
        assert_eq!(vision.url, "http://localhost:1234/v1/chat/completions");
        assert_eq!(vision.model, "vision-x");
        assert_eq!(vision.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(vision.timeout, Duration::from_secs(5));
        assert_eq!(config.qa_endpoint().model, DEFAULT_MODEL);
    }

    #[test]
    fn test_annotation_style_from_env() {
        let config = Config::load_with(env(&[
            ("STARLENS_OUTLINE_STROKE", "5"),
            ("STARLENS_JPEG_QUALITY", "80"),
        ]))
        .unwrap();
        let style = config.annotation_style();
        assert_eq!(style.stroke, 5);
        assert_eq!(style.jpeg_quality, 80);
        assert_eq!(style.color, [0, 255, 0]);
        assert_eq!(Config::default().annotation_style(), AnnotationStyle::default());
    }

    #[test]
    fn test_invalid_annotation_style_is_rejected() {
        assert!(Config::load_with(env(&[("STARLENS_JPEG_QUALITY", "0")])).is_err());
        assert!(Config::load_with(env(&[("STARLENS_OUTLINE_STROKE", "0")])).is_err());
    }

    #[test]
    fn test_empty_api_key_is_absent() {
        let config = Config::load_with(env(&[("GROQ_API_KEY", "")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let err = Config::load_with(env(&[("STARLENS_WINDOW_STEP", "four")])).unwrap_err();
        assert!(format!("{err:#}").contains("STARLENS_WINDOW_STEP=four"));
    }

    #[test]
    fn test_toml_file_then_env() {
        let dir = std::env::temp_dir().join(format!("starlensd-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("starlens.toml");
        std::fs::write(
            &path,
            "bind = \"127.0.0.1:7000\"\nqa_model = \"qa-from-file\"\nscale_step = 1.2\n",
        )
        .unwrap();

        let path_str = path.to_string_lossy().into_owned();
        let config = Config::load_with(env(&[
            ("STARLENS_CONFIG", path_str.as_str()),
            ("STARLENS_QA_MODEL", "qa-from-env"),
        ]))
        .unwrap();

        assert_eq!(config.bind.port(), 7000);
        assert_eq!(config.qa_model, "qa-from-env");
        assert!((config.scale_step - 1.2).abs() < 1e-6);
        assert_eq!(config.vision_model, DEFAULT_MODEL);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unknown_toml_key_is_rejected() {
        let dir = std::env::temp_dir().join(format!("starlensd-badcfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "api_key = \"nope\"\n").unwrap();

        assert!(Config::from_file(&path).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
