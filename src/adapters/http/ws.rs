use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::ops::ControlFlow;
use std::sync::PoisonError;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::http::routes::{encode_jpeg, ApiError};
use crate::adapters::http::state::HttpState;
use crate::application::session::stream_session;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::source::{SourceDescriptor, SourceKind};
use crate::domain::stream::{FrameMeta, WsMessage};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub source: SourceKind,
    /// Named demo clip; without one the session's upload, then the default clip.
    pub video: Option<String>,
}

enum StreamEvent {
    Frame { meta: FrameMeta, jpeg: Vec<u8>, ack: oneshot::Sender<bool> },
    Done(WsMessage),
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(st): State<HttpState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let descriptor = match resolve_descriptor(&st, id, &query) {
        Ok(d) => d,
        Err(e) => return ApiError(e).into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, st, id, descriptor))
}

fn resolve_descriptor(st: &HttpState, id: Uuid, query: &StreamQuery) -> DomainResult<SourceDescriptor> {
    let entry = st.sessions.get(id)?;
    match query.source {
        SourceKind::Webcam => Ok(SourceDescriptor::Camera(st.registry.camera_index())),
        SourceKind::Video => {
            if let Some(name) = &query.video {
                return st
                    .registry
                    .demo_video(name)
                    .map(SourceDescriptor::VideoFile)
                    .ok_or_else(|| DomainError::NotFound(format!("demo video '{}'", name)));
            }
            let upload = entry.upload.lock().unwrap_or_else(PoisonError::into_inner);
            let path = match upload.as_ref() {
                Some(file) => file.path().to_path_buf(),
                None => st.registry.default_video(),
            };
            Ok(SourceDescriptor::VideoFile(path))
        }
        SourceKind::Image => Err(DomainError::InvalidInput(
            "images are detected through POST /api/sessions/:id/image".into(),
        )),
    }
}

async fn handle_socket(mut socket: WebSocket, st: HttpState, id: Uuid, descriptor: SourceDescriptor) {
    let entry = match st.sessions.get(id) {
        Ok(e) => e,
        Err(e) => {
            send_json(&mut socket, &WsMessage::Error { message: e.to_string() }).await;
            return;
        }
    };

    // Capacity 1 plus the per-frame ack keeps read -> infer -> send strictly in step.
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(1);
    let session = entry.session.clone();
    let opener = st.opener.clone();

    std::thread::spawn(move || {
        let mut fps_est: f32 = 0.0;
        let mut last_t = Instant::now();

        let outcome = stream_session(&session, opener.as_ref(), &descriptor, |index, output| {
            let process_ms = last_t.elapsed().as_secs_f32() * 1000.0;
            let jpeg = match encode_jpeg(&output.rendered) {
                Ok(j) => j,
                Err(e) => {
                    warn!("dropping stream: {}", e);
                    return ControlFlow::Break(());
                }
            };
            fps_est = 0.9 * fps_est + 0.1 * (1000.0 / process_ms.max(1.0));

            let meta = FrameMeta {
                index,
                width: output.rendered.width(),
                height: output.rendered.height(),
                process_ms,
                fps_est,
            };
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.blocking_send(StreamEvent::Frame { meta, jpeg, ack: ack_tx }).is_err() {
                return ControlFlow::Break(());
            }
            let delivered = ack_rx.blocking_recv().unwrap_or(false);
            last_t = Instant::now();
            if delivered { ControlFlow::Continue(()) } else { ControlFlow::Break(()) }
        });

        let last = match outcome {
            Ok(frames) => WsMessage::End { frames },
            Err(e) => WsMessage::Error { message: e.to_string() },
        };
        let _ = tx.blocking_send(StreamEvent::Done(last));
    });

    // Dropping `rx` on exit fails the worker's next send or ack, which stops it.
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(StreamEvent::Frame { meta, jpeg, ack }) => {
                    debug!("frame {} -> session {}", meta.index, id);
                    let delivered = send_json(&mut socket, &WsMessage::Frame { meta }).await
                        && socket.send(Message::Binary(jpeg)).await.is_ok();
                    let _ = ack.send(delivered);
                    if !delivered {
                        info!("stream client for session {} went away", id);
                        break;
                    }
                }
                Some(StreamEvent::Done(msg)) => {
                    send_json(&mut socket, &msg).await;
                    break;
                }
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    info!("stream client for session {} closed", id);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &WsMessage) -> bool {
    let json = serde_json::to_string(msg).unwrap_or_default();
    socket.send(Message::Text(json)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::routes::tests::test_state;
    use crate::application::session::DetectionSession;
    use crate::domain::{model::Task, session::SessionSettings};
    use std::path::PathBuf;

    fn state_with_session() -> (HttpState, Uuid) {
        let st = test_state();
        let settings = SessionSettings::new(Task::Detection, "yolov8n", 0.4).unwrap();
        let session = DetectionSession::open(st.registry.clone(), st.loader.clone(), settings).unwrap();
        let id = st.sessions.insert(session);
        (st, id)
    }

    #[test]
    fn webcam_uses_registry_camera() {
        let (st, id) = state_with_session();
        let q = StreamQuery { source: SourceKind::Webcam, video: None };
        assert_eq!(resolve_descriptor(&st, id, &q).unwrap(), SourceDescriptor::Camera(0));
    }

    #[test]
    fn video_without_upload_falls_back_to_demo_assets() {
        let (st, id) = state_with_session();
        let q = StreamQuery { source: SourceKind::Video, video: None };
        assert_eq!(
            resolve_descriptor(&st, id, &q).unwrap(),
            SourceDescriptor::VideoFile(PathBuf::from("assets/videos/default_video.mp4"))
        );
        let q = StreamQuery { source: SourceKind::Video, video: Some("video_3".into()) };
        assert_eq!(
            resolve_descriptor(&st, id, &q).unwrap(),
            SourceDescriptor::VideoFile(PathBuf::from("assets/videos/video_3.mp4"))
        );
        let q = StreamQuery { source: SourceKind::Video, video: Some("nope".into()) };
        assert!(matches!(resolve_descriptor(&st, id, &q), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn named_demo_clip_wins_over_upload() {
        let (st, id) = state_with_session();
        let file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        let upload = file.path().to_path_buf();
        *st.sessions.get(id).unwrap().upload.lock().unwrap() = Some(file);

        let q = StreamQuery { source: SourceKind::Video, video: Some("video_2".into()) };
        assert_eq!(
            resolve_descriptor(&st, id, &q).unwrap(),
            SourceDescriptor::VideoFile(PathBuf::from("assets/videos/video_2.mp4"))
        );
        let q = StreamQuery { source: SourceKind::Video, video: None };
        assert_eq!(resolve_descriptor(&st, id, &q).unwrap(), SourceDescriptor::VideoFile(upload));
    }

    #[test]
    fn image_source_is_not_streamable() {
        let (st, id) = state_with_session();
        let q = StreamQuery { source: SourceKind::Image, video: None };
        assert!(matches!(resolve_descriptor(&st, id, &q), Err(DomainError::InvalidInput(_))));
    }
}
