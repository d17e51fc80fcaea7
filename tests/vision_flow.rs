//! Vision handoff: a text-only planner gets an analyst's description of
//! image-heavy items.

mod common;

use std::sync::Arc;

use async_trait::async_trait;

use tabpilot::{Document, ElementSpec, LoopStatus, MockChatProvider};
use tabpilot_llm_dispatch::{DispatchError, Dispatcher, MessageContent, VisionAnalyst};

use common::quiz_tab;

const FRAME_URL: &str = "https://assess.example.com/embed/attempt";

/// An item whose answer options are images with no text.
fn picture_item_doc() -> Document {
    let mut doc = Document::new(FRAME_URL, "Assessment item", 900, 600);
    let root = doc.root();
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "counter")
            .rect(10.0, 5.0, 200.0, 20.0)
            .text("2 of 10 Items"),
    );
    doc.append(
        root,
        ElementSpec::new("img")
            .attr("class", "figure")
            .rect(10.0, 40.0, 300.0, 200.0),
    );
    doc.append(
        root,
        ElementSpec::new("input")
            .attr("type", "radio")
            .attr("name", "answer")
            .attr("class", "mcq-input")
            .rect(20.0, 260.0, 16.0, 16.0),
    );
    doc.append(
        root,
        ElementSpec::new("button")
            .attr("id", "next")
            .rect(20.0, 500.0, 80.0, 28.0)
            .text("Next"),
    );
    doc
}

struct DescribingVision;

#[async_trait]
impl VisionAnalyst for DescribingVision {
    async fn analyze(&self, _shot: &str, _context: &str) -> Result<String, DispatchError> {
        Ok("The figure shows the Eiffel Tower; the single option is its photo.".to_string())
    }
}

#[tokio::test]
async fn text_only_planner_receives_vision_analysis() {
    let provider = Arc::new(MockChatProvider::new());
    provider.push_ok(
        r#"{"thinking":"the image is the Eiffel Tower, pick the option",
            "actions":[{"type":"click","selector":".mcq-input","frameId":7}],
            "done":true,"summary":"Answered the picture question"}"#,
    );

    let dispatcher =
        Dispatcher::new(provider.clone(), "mock-model").with_vision(Arc::new(DescribingVision));
    let mut driver = tabpilot::Driver::new(
        dispatcher,
        tabpilot::ExecConfig::test(),
        tabpilot::LoopConfig::test(),
        tabpilot::SnapshotConfig::test(),
    );

    let tab = quiz_tab(picture_item_doc());
    let result = driver
        .execute_command(tab.as_ref(), "answer the picture question")
        .await
        .unwrap();
    assert_eq!(result.status, LoopStatus::Completed);

    // A screenshot was captured for the handoff over the debug channel.
    assert!(tab.is_debug_attached());

    // The planner call stayed text-only and carried the analyst's report.
    let requests = provider.requests();
    let user = requests[0].messages.last().unwrap();
    assert!(matches!(user.content, MessageContent::Text(_)));
    let text = user.text();
    assert!(text.contains("=== VISION ANALYSIS ==="));
    assert!(text.contains("Eiffel Tower"));
}
