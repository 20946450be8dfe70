use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use starlens_core::{AskRequest, FaceRegion, Pipeline, PipelineError, SessionState};
use tower_http::trace::TraceLayer;

/// Multipart field carrying the uploaded photo.
const IMAGE_FIELD: &str = "image";

/// What `/status` reports about this instance.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub version: &'static str,
    pub vision_model: String,
    pub qa_model: String,
}

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub info: ServiceInfo,
}

/// HTTP surface of the daemon.
///
/// `POST /upload` takes a multipart photo, `POST /ask` takes a question plus
/// the session fields the caller got back from `/upload`, `GET /status`
/// describes the instance.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/ask", post(ask))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    #[serde(flatten)]
    session: SessionState,
    region: Option<FaceRegion>,
}

/// Follow-up question plus the caller-held session fields.
///
/// Also accepts the field names of the original HTML form.
#[derive(Debug, Deserialize)]
struct AskForm {
    question: String,
    #[serde(alias = "celebrity_name")]
    name: String,
    #[serde(default, alias = "celebrity_information")]
    profile_text: String,
    #[serde(default, alias = "result_img_data")]
    annotated_image: String,
}

impl From<AskForm> for AskRequest {
    fn from(form: AskForm) -> Self {
        AskRequest {
            name: form.name,
            profile_text: form.profile_text,
            annotated_image: form.annotated_image,
            question_text: form.question,
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut image = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => match field.bytes().await {
                Ok(bytes) => {
                    image = Some(bytes.to_vec());
                    break;
                }
                Err(e) => return e.into_response(),
            },
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return e.into_response(),
        }
    }

    let Some(image) = image.filter(|bytes| !bytes.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "no image uploaded");
    };

    tracing::info!(bytes = image.len(), "upload received");
    match state.pipeline.upload(image).await {
        Ok(outcome) => Json(UploadResponse {
            session: outcome.session(),
            region: outcome.region,
        })
        .into_response(),
        Err(e @ PipelineError::Localize(_)) => {
            tracing::warn!(error = %e, "upload rejected");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "upload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn ask(State(state): State<AppState>, request: Request) -> Response {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let form = if is_json {
        match Json::<AskForm>::from_request(request, &()).await {
            Ok(Json(form)) => form,
            Err(rejection) => return rejection.into_response(),
        }
    } else {
        match Form::<AskForm>::from_request(request, &()).await {
            Ok(Form(form)) => form,
            Err(rejection) => return rejection.into_response(),
        }
    };

    tracing::info!(name = %form.name, "question received");
    Json(state.pipeline.ask(form.into()).await).into_response()
}

async fn status(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.info)
}
