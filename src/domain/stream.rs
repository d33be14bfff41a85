use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::detection::Region;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Read + inference + render time of this frame.
    pub process_ms: f32,
    pub fps_est: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Frame { meta: FrameMeta },
    End { frames: u64 },
    Error { message: String },
}

/// "2 person, 1 dog" style count per label, alphabetical.
pub fn summarize_detections(regions: &[Region]) -> String {
    let mut counts = BTreeMap::new();
    for region in regions {
        *counts.entry(region.label.as_str()).or_insert(0usize) += 1;
    }
    counts
        .iter()
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::Geometry;

    fn region(label: &str) -> Region {
        Region {
            label: label.into(),
            class_id: 0,
            score: 0.9,
            geometry: Geometry::Rect { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0 },
        }
    }

    #[test]
    fn summary_counts_labels() {
        let regions = [region("person"), region("dog"), region("person")];
        assert_eq!(summarize_detections(&regions), "1 dog, 2 person");
        assert_eq!(summarize_detections(&[]), "");
    }

    #[test]
    fn ws_message_carries_type_tag() {
        let json = serde_json::to_value(WsMessage::End { frames: 3 }).unwrap();
        assert_eq!(json["type"], "end");
        assert_eq!(json["frames"], 3);
    }
}
