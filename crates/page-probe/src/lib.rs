//! Per-frame page probe.
//!
//! The probe is the frame-side endpoint of the driver's frame channel. It
//! owns a document model, answers `BuildVisualMap` requests with the
//! spatially sorted Visual Page Map, executes in-frame actions by
//! synthesizing event sequences against the document, and resolves drag
//! coordinates. One probe instance exists per frame; repeated installation
//! is a guarded no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

pub mod actions;
pub mod config;
pub mod dom;
pub mod errors;
pub mod evaluate;
pub mod protocol;
pub mod selector;
pub mod visual_map;

pub use config::ProbeConfig;
pub use dom::{Document, ElementSpec, NodeId, Rect, SelectOption};
pub use errors::ProbeError;
pub use protocol::{
    DragCoords, ProbeAction, ProbeActionResult, ProbeReply, ProbeRequest,
};
pub use visual_map::{VisualElement, MAP_HEADER};

/// Frame-side request handler.
///
/// Wraps the frame's document behind a lock so a host harness can mutate the
/// page (navigation, reactive updates) between probe calls.
pub struct PageProbe {
    doc: Arc<Mutex<Document>>,
    config: ProbeConfig,
    installed: AtomicBool,
}

impl PageProbe {
    pub fn new(doc: Arc<Mutex<Document>>, config: ProbeConfig) -> Self {
        Self {
            doc,
            config,
            installed: AtomicBool::new(false),
        }
    }

    /// Install guard. The first call returns `true`; repeat installs are
    /// no-ops returning `false`, matching the window-scope guard the frame
    /// script uses.
    pub fn install(&self) -> bool {
        !self.installed.swap(true, Ordering::SeqCst)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Shared handle to the underlying document, for harnesses.
    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.doc)
    }

    /// Answer one probe request.
    pub async fn handle(&self, request: ProbeRequest) -> ProbeReply {
        match request {
            ProbeRequest::Ping => ProbeReply::Pong {
                installed: self.is_installed(),
            },
            ProbeRequest::BuildVisualMap => {
                let doc = self.doc.lock().await;
                let map = visual_map::build_map(&doc, &self.config);
                ProbeReply::VisualMap { map }
            }
            ProbeRequest::ExecuteAction { action } => {
                match actions::execute(&self.doc, &self.config, action).await {
                    Ok(result) => ProbeReply::ActionResult { result },
                    Err(err) => ProbeReply::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                    },
                }
            }
            ProbeRequest::DragCoords { from, to } => {
                let mut doc = self.doc.lock().await;
                match actions::drag_coords(&mut doc, &from, &to) {
                    Ok(coords) => ProbeReply::DragCoords { coords },
                    Err(err) => ProbeReply::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                    },
                }
            }
            ProbeRequest::IframeOffset { url } => {
                let doc = self.doc.lock().await;
                match actions::iframe_offset(&doc, &url) {
                    Some((x, y)) => ProbeReply::IframeOffset { x, y, found: true },
                    None => ProbeReply::IframeOffset {
                        x: 0.0,
                        y: 0.0,
                        found: false,
                    },
                }
            }
        }
    }
}
