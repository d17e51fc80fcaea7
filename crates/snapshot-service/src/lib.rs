//! Snapshot service: collects per-frame Visual Page Maps, merges them into
//! one document, and produces token-lean diffs between steps.

use thiserror::Error;

use tabpilot_frame_coordinator::FrameError;

pub mod collect;
pub mod diff;

pub use collect::{collect_all_frames, collect_with_iframe_retry, MergedSnapshot, SnapshotConfig};
pub use diff::{compute_diff, UNCHANGED_MARKER};

/// Errors from snapshot collection.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The top frame produced no usable map; a snapshot cannot exist
    /// without it.
    #[error("top frame produced no visual map: {0}")]
    NoTopFrame(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}
