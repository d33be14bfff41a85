use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a session's frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDescriptor {
    ImageFile(PathBuf),
    ImageBytes(Vec<u8>),
    VideoFile(PathBuf),
    Camera(u32),
}

/// Source selection as offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(alias = "image")]
    Image,
    #[serde(alias = "video")]
    Video,
    #[serde(alias = "webcam")]
    Webcam,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Image, SourceKind::Video, SourceKind::Webcam];
}

/// Lifecycle shared by every frame source. Sources only exist once opened,
/// so there is no idle state to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceState {
    Open,
    Exhausted,
    Stopped,
}
