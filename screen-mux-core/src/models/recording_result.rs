use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::{TrackKind, TrackStats};

/// Result returned when a recording is finalized successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Per-track summary stored in the metadata sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub kind: TrackKind,
    pub stats: TrackStats,
}

/// Metadata stored alongside a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    /// Host-clock anchor of the session, in nanoseconds.
    pub anchor_nanos: i64,
    pub tracks: Vec<TrackInfo>,
}

impl RecordingMetadata {
    pub fn new(
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        anchor_nanos: i64,
        stats: [TrackStats; 3],
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            anchor_nanos,
            tracks: TrackKind::ALL
                .iter()
                .map(|&kind| TrackInfo {
                    kind,
                    stats: stats[kind.index()],
                })
                .collect(),
        }
    }

    pub fn track(&self, kind: TrackKind) -> Option<&TrackInfo> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}
