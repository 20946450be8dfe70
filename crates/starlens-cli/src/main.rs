use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use starlens_core::llm::{DEFAULT_API_URL, DEFAULT_MODEL};
use starlens_core::{
    CascadeDetector, CelebrityIdentifier, DetectorSettings, FaceLocalizer,
    ModelEndpoint, Pipeline, QaEngine,
};

#[derive(Parser)]
#[command(name = "starlens", about = "Starlens celebrity lookup CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find and outline the largest face in an image (no model calls)
    Detect {
        image: PathBuf,
        /// Where to write the annotated JPEG
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        detector: DetectorArgs,
    },
    /// Localize the face and identify the celebrity
    Identify {
        image: PathBuf,
        /// Where to write the annotated JPEG
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Print the session fields as JSON instead of text
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        detector: DetectorArgs,
        #[command(flatten)]
        endpoint: EndpointArgs,
    },
    /// Ask a question about a named celebrity
    Ask {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        question: String,
        #[command(flatten)]
        endpoint: EndpointArgs,
    },
    /// Show daemon status
    Status {
        #[arg(long, env = "STARLENS_URL", default_value = "http://127.0.0.1:8080")]
        url: String,
    },
}

#[derive(Args)]
struct DetectorArgs {
    /// SeetaFace cascade model file
    #[arg(long, env = "STARLENS_MODEL_PATH", default_value = "models/seeta_fd_frontal_v1.0.bin")]
    model_path: PathBuf,
    /// Ratio between pyramid levels
    #[arg(long, env = "STARLENS_SCALE_STEP", default_value_t = 1.1)]
    scale_step: f32,
    #[arg(long, env = "STARLENS_MIN_FACE_SIZE", default_value_t = 20)]
    min_face_size: u32,
    #[arg(long, env = "STARLENS_SCORE_THRESHOLD", default_value_t = 2.0)]
    score_threshold: f64,
    #[arg(long, env = "STARLENS_WINDOW_STEP", default_value_t = 4)]
    window_step: u32,
}

impl DetectorArgs {
    fn localizer(&self) -> Result<FaceLocalizer> {
        let settings = DetectorSettings {
            scale_step: self.scale_step,
            min_face_size: self.min_face_size,
            score_threshold: self.score_threshold,
            window_step: self.window_step,
        };
        let detector = CascadeDetector::load(&self.model_path, settings)
            .context("loading face detector")?;
        Ok(FaceLocalizer::new(Arc::new(detector)))
    }
}

#[derive(Args)]
struct EndpointArgs {
    #[arg(long, env = "STARLENS_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    #[arg(long, env = "STARLENS_VISION_MODEL", default_value = DEFAULT_MODEL)]
    vision_model: String,
    #[arg(long, env = "STARLENS_QA_MODEL", default_value = DEFAULT_MODEL)]
    qa_model: String,
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, env = "STARLENS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

impl EndpointArgs {
    fn endpoint(&self, model: &str) -> ModelEndpoint {
        ModelEndpoint::new(&self.api_url, model, self.api_key.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    println!("Annotated image written to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { image, out, detector } => {
            let localizer = detector.localizer()?;
            let bytes = read_image(&image)?;
            let localization = localizer.localize(&bytes)?;
            match localization.region {
                Some(r) => {
                    println!("Face at x={} y={} width={} height={}", r.x, r.y, r.width, r.height);
                    if let Some(out) = out {
                        write_image(&out, &localization.image)?;
                    }
                }
                None => println!("No face detected"),
            }
        }
        Commands::Identify {
            image,
            out,
            json,
            detector,
            endpoint,
        } => {
            let identifier = CelebrityIdentifier::new(endpoint.endpoint(&endpoint.vision_model))?;
            let qa = QaEngine::new(endpoint.endpoint(&endpoint.qa_model))?;
            let pipeline = Pipeline::new(detector.localizer()?, Arc::new(identifier), Arc::new(qa));

            let outcome = pipeline.upload(read_image(&image)?).await?;
            if json {
                let mut value = serde_json::to_value(outcome.session())?;
                value["region"] = serde_json::to_value(outcome.region)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", outcome.profile_text);
                if !outcome.name.is_empty() {
                    println!("\nName: {}", outcome.name);
                }
            }
            if let (Some(out), Some(_)) = (out, outcome.region) {
                write_image(&out, &outcome.image)?;
            }
        }
        Commands::Ask {
            name,
            question,
            endpoint,
        } => {
            let qa = QaEngine::new(endpoint.endpoint(&endpoint.qa_model))?;
            println!("{}", qa.ask(&name, &question).await);
        }
        Commands::Status { url } => {
            let status_url = format!("{}/status", url.trim_end_matches('/'));
            let response = reqwest::get(&status_url)
                .await
                .with_context(|| format!("starlensd: not reachable at {url}"))?;
            if !response.status().is_success() {
                bail!("starlensd: {} returned HTTP {}", status_url, response.status());
            }
            let body: serde_json::Value = response.json().await.context("parsing status")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
