use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use image::RgbImage;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::sync::PoisonError;
use tracing::{error, info};
use uuid::Uuid;

use crate::adapters::http::state::HttpState;
use crate::application::dto::{
    ConfigResponse, CreateSessionRequest, ImageDetectionResponse, ModelEntry, ModelsResponse, OkResponse,
    SessionResponse, UpdateSessionRequest,
};
use crate::application::registry::ModelRegistry;
use crate::application::session::DetectionSession;
use crate::domain::{
    errors::{DomainError, DomainResult},
    model::Task,
    session::SessionSettings,
    stream::summarize_detections,
};

const JPEG_QUALITY: u8 = 80;

/// Domain failures rendered as `{"error": ...}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            DomainError::UnknownIdentifier { .. } | DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::ModelLoadError { .. }
            | DomainError::SourceUnavailable(_)
            | DomainError::InvalidFrame(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::InferenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!("request failed ({}): {}", status, self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs model loading / inference off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> DomainResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(DomainError::InferenceError(format!("worker failed: {e}"))))?
        .map_err(ApiError)
}

pub(crate) fn encode_jpeg(img: &RgbImage) -> DomainResult<Vec<u8>> {
    let mut jpeg = Vec::new();
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    enc.encode(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgb8)
        .map_err(|e| DomainError::InferenceError(format!("jpeg encoding failed: {e}")))?;
    Ok(jpeg)
}

fn models_for(registry: &ModelRegistry, task: Task) -> ModelsResponse {
    ModelsResponse {
        task,
        models: registry
            .list_models(task)
            .iter()
            .map(|id| ModelEntry { identifier: id.to_string(), help: registry.describe(id).to_string() })
            .collect(),
    }
}

pub async fn get_config(State(st): State<HttpState>) -> Json<ConfigResponse> {
    let reg = &st.registry;
    Json(ConfigResponse {
        tasks: reg.tasks().iter().map(|t| models_for(reg, *t)).collect(),
        sources: reg.sources().to_vec(),
        default_confidence: SessionSettings::DEFAULT_CONFIDENCE,
        demo_videos: reg.demo_videos().iter().map(|s| s.to_string()).collect(),
        video_extensions: st.opener.video_extensions().into_iter().map(String::from).collect(),
        default_image: reg.default_image().display().to_string(),
        default_detected_image: reg.default_detected_image().display().to_string(),
        default_video: reg.default_video().display().to_string(),
        default_detected_video: reg.default_detected_video().display().to_string(),
    })
}

pub async fn list_models(State(st): State<HttpState>, Path(task): Path<String>) -> ApiResult<ModelsResponse> {
    let task: Task = task.parse()?;
    Ok(Json(models_for(&st.registry, task)))
}

pub async fn create_session(
    State(st): State<HttpState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<SessionResponse> {
    let settings = req.into_settings()?;
    let (registry, loader) = (st.registry.clone(), st.loader.clone());
    let opened = settings.clone();
    let session = blocking(move || DetectionSession::open(registry, loader, opened)).await?;
    let id = st.sessions.insert(session);
    info!("session {} created", id);
    Ok(Json(SessionResponse { id, settings }))
}

pub async fn get_session(State(st): State<HttpState>, Path(id): Path<Uuid>) -> ApiResult<SessionResponse> {
    let entry = st.sessions.get(id)?;
    let settings = blocking(move || {
        let session = entry.session.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.settings().clone())
    })
    .await?;
    Ok(Json(SessionResponse { id, settings }))
}

pub async fn update_session(
    State(st): State<HttpState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSessionRequest>,
) -> ApiResult<SessionResponse> {
    let entry = st.sessions.get(id)?;
    let settings = blocking(move || {
        let mut session = entry.session.lock().unwrap_or_else(PoisonError::into_inner);
        let next = req.apply_to(session.settings())?;
        session.select_model(next)?;
        Ok(session.settings().clone())
    })
    .await?;
    Ok(Json(SessionResponse { id, settings }))
}

pub async fn delete_session(State(st): State<HttpState>, Path(id): Path<Uuid>) -> ApiResult<OkResponse> {
    if !st.sessions.remove(id) {
        return Err(DomainError::NotFound(format!("session {}", id)).into());
    }
    info!("session {} closed", id);
    Ok(Json(OkResponse { ok: true }))
}

/// Raw image bytes in the body; an empty body runs the default demo image.
pub async fn detect_image(
    State(st): State<HttpState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<ImageDetectionResponse> {
    let entry = st.sessions.get(id)?;
    let opener = st.opener.clone();
    let response = blocking(move || {
        let mut session = entry.session.lock().unwrap_or_else(PoisonError::into_inner);
        let detection = session.detect_image(opener.as_ref(), body.to_vec())?;
        let jpeg = encode_jpeg(&detection.rendered)?;
        Ok(ImageDetectionResponse {
            width: detection.rendered.width(),
            height: detection.rendered.height(),
            image: BASE64_STANDARD.encode(jpeg),
            summary: summarize_detections(&detection.regions),
            regions: detection.regions,
        })
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    ext: Option<String>,
}

/// Stores an uploaded video for the session's next `Video` stream.
pub async fn upload_video(
    State(st): State<HttpState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<OkResponse> {
    let entry = st.sessions.get(id)?;
    if body.is_empty() {
        return Err(DomainError::InvalidInput("empty video upload".into()).into());
    }
    let ext = query.ext.unwrap_or_else(|| "mp4".into());
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::InvalidInput(format!("bad extension '{ext}'")).into());
    }

    blocking(move || {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .and_then(|mut f| f.write_all(&body).map(|_| f))
            .map_err(|e| DomainError::SourceUnavailable(format!("cannot store upload: {e}")))?;
        file.flush().map_err(|e| DomainError::SourceUnavailable(e.to_string()))?;
        info!("stored {} byte upload at {}", body.len(), file.path().display());
        *entry.upload.lock().unwrap_or_else(PoisonError::into_inner) = Some(file);
        Ok(())
    })
    .await?;
    Ok(Json(OkResponse { ok: true }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::http::{router, state::SessionStore};
    use crate::application::ports::{Detector, DetectorLoader, FrameSource, MediaOpener};
    use crate::application::services::tests::{CountedSource, RecordingDetector};
    use crate::domain::source::SourceDescriptor;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct FakeLoader;

    impl DetectorLoader for FakeLoader {
        fn load(&self, weights: &std::path::Path) -> DomainResult<Box<dyn Detector>> {
            if weights.to_string_lossy().contains("yolov8x") {
                return Err(DomainError::ModelLoadError { path: weights.display().to_string(), reason: "missing".into() });
            }
            Ok(Box::new(RecordingDetector::default()))
        }
    }

    pub(crate) struct FakeOpener;

    impl MediaOpener for FakeOpener {
        fn open(&self, descriptor: &SourceDescriptor) -> DomainResult<Box<dyn FrameSource>> {
            match descriptor {
                SourceDescriptor::VideoFile(p) if !p.exists() => {
                    Err(DomainError::SourceUnavailable(p.display().to_string()))
                }
                SourceDescriptor::ImageBytes(_) | SourceDescriptor::ImageFile(_) => {
                    Ok(Box::new(CountedSource { remaining: 1, size: (800, 600) }))
                }
                _ => Ok(Box::new(CountedSource { remaining: 3, size: (800, 600) })),
            }
        }

        fn video_extensions(&self) -> Vec<&'static str> {
            vec!["gif", "mp4"]
        }
    }

    pub(crate) fn test_state() -> HttpState {
        HttpState {
            registry: Arc::new(ModelRegistry::new("weights", "assets", 0)),
            loader: Arc::new(FakeLoader),
            opener: Arc::new(FakeOpener),
            sessions: Arc::new(SessionStore::default()),
        }
    }

    async fn call(state: &HttpState, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let res = router(state.clone(), 1 << 20).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn new_session(state: &HttpState) -> String {
        let body = Body::from(r#"{"task":"Detection","model":"yolov8n","confidence":0.4}"#);
        let (status, json) = call(state, "POST", "/api/sessions", body).await;
        assert_eq!(status, StatusCode::OK);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn models_are_listed_per_task() {
        let state = test_state();
        let (status, json) = call(&state, "GET", "/api/models/detection", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = json["models"].as_array().unwrap().iter().map(|m| m["identifier"].as_str().unwrap()).collect();
        assert_eq!(ids, ["yolov8n", "yolov8s", "yolov8m", "yolov8l", "yolov8x"]);

        let (status, _) = call(&state, "GET", "/api/models/tracking", Body::empty()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn config_lists_sources_and_defaults() {
        let (status, json) = call(&test_state(), "GET", "/api/config", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["sources"], serde_json::json!(["Image", "Video", "Webcam"]));
        assert_eq!(json["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(json["video_extensions"], serde_json::json!(["gif", "mp4"]));
    }

    #[tokio::test]
    async fn cross_task_model_is_bad_request() {
        let body = Body::from(r#"{"task":"Detection","model":"yolov8n-seg"}"#);
        let (status, json) = call(&test_state(), "POST", "/api/sessions", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("yolov8n-seg"));
    }

    #[tokio::test]
    async fn image_detection_returns_regions_and_jpeg() {
        let state = test_state();
        let id = new_session(&state).await;
        let uri = format!("/api/sessions/{id}/image");
        let (status, json) = call(&state, "POST", &uri, Body::from(vec![1u8, 2, 3])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["width"], 720);
        assert_eq!(json["height"], 405);
        assert_eq!(json["regions"].as_array().unwrap().len(), 2);
        assert_eq!(json["summary"], "2 person");
        let jpeg = BASE64_STANDARD.decode(json["image"].as_str().unwrap()).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn update_keeps_old_model_when_load_fails() {
        let state = test_state();
        let id = new_session(&state).await;
        let uri = format!("/api/sessions/{id}");
        let (status, _) = call(&state, "PUT", &uri, Body::from(r#"{"model":"yolov8x"}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, json) = call(&state, "PUT", &uri, Body::from(r#"{"confidence":0.65}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["settings"]["model"], "yolov8n");
        assert!((json["settings"]["confidence"].as_f64().unwrap() - 0.65).abs() < 1e-6);

        let (status, _) = call(&state, "PUT", &uri, Body::from(r#"{"confidence":3.0}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let uri = format!("/api/sessions/{}/image", Uuid::new_v4());
        let (status, _) = call(&test_state(), "POST", &uri, Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn video_upload_is_stored_and_session_can_be_deleted() {
        let state = test_state();
        let id = new_session(&state).await;
        let uri = format!("/api/sessions/{id}/video?ext=gif");
        let (status, _) = call(&state, "POST", &uri, Body::from(vec![0u8; 64])).await;
        assert_eq!(status, StatusCode::OK);
        let entry = state.sessions.get(id.parse().unwrap()).unwrap();
        assert!(entry.upload.lock().unwrap().as_ref().unwrap().path().exists());

        let bad = format!("/api/sessions/{id}/video?ext=../x");
        let (status, _) = call(&state, "POST", &bad, Body::from(vec![0u8; 8])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&state, "DELETE", &format!("/api/sessions/{id}"), Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&state, "GET", &format!("/api/sessions/{id}"), Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
