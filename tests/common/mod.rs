//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tabpilot::harness::{InProcessBrowser, InProcessTab};
use tabpilot::{
    Document, Driver, DriverEvent, ElementSpec, ExecConfig, FrameId, LoopConfig, MockChatProvider,
    SnapshotConfig,
};
use tabpilot_llm_dispatch::Dispatcher;

/// A plain content page: a heading and a link.
pub fn article_doc(url: &str, title: &str) -> Document {
    let mut doc = Document::new(url, title, 1280, 800);
    let root = doc.root();
    doc.append(
        root,
        ElementSpec::new("h1").rect(20.0, 10.0, 600.0, 40.0).text(title),
    );
    doc.append(
        root,
        ElementSpec::new("a")
            .attr("id", "more")
            .attr("href", "/more")
            .rect(20.0, 60.0, 120.0, 20.0)
            .text("Read more"),
    );
    doc
}

/// Quiz portal outer page: banner, iframe element, and a Next button.
pub fn portal_doc(frame_url: &str) -> Document {
    let mut doc = Document::new("https://school.example.com/quiz/attempt", "Unit Quiz", 1280, 800);
    let root = doc.root();
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "banner")
            .rect(0.0, 0.0, 1280.0, 50.0)
            .text("Quiz portal"),
    );
    doc.append(
        root,
        ElementSpec::new("iframe")
            .attr("src", frame_url)
            .rect(100.0, 80.0, 900.0, 600.0),
    );
    doc.append(
        root,
        ElementSpec::new("button")
            .attr("id", "save-exit")
            .rect(20.0, 720.0, 100.0, 28.0)
            .text("Save and exit"),
    );
    doc
}

/// One multiple-choice item inside the assessment frame.
pub fn radio_item_doc(frame_url: &str, item: u32, checked: bool) -> Document {
    let mut doc = Document::new(frame_url, "Assessment item", 900, 600);
    let root = doc.root();
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "counter")
            .rect(10.0, 5.0, 200.0, 20.0)
            .text(&format!("{item} of 10 Items")),
    );
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "stem")
            .rect(10.0, 30.0, 600.0, 30.0)
            .text("Which city is the capital of France?"),
    );
    let mut radio = ElementSpec::new("input")
        .attr("type", "radio")
        .attr("name", "answer")
        .attr("class", "mcq-input")
        .rect(20.0, 70.0, 16.0, 16.0)
        .text("Paris");
    if checked {
        radio = radio.checked(true);
    }
    doc.append(root, radio);
    doc.append(
        root,
        ElementSpec::new("input")
            .attr("type", "radio")
            .attr("name", "answer")
            .attr("id", "opt4")
            .rect(20.0, 100.0, 16.0, 16.0)
            .text("Lyon"),
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

/// A drag-and-drop item: two tiles and a labelled drop zone.
pub fn drag_item_doc(frame_url: &str) -> Document {
    let mut doc = Document::new(frame_url, "Assessment item", 900, 600);
    let root = doc.root();
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "counter")
            .rect(10.0, 5.0, 200.0, 20.0)
            .text("1 of 3 Items"),
    );
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "stem")
            .rect(10.0, 30.0, 600.0, 30.0)
            .text("Drag each capital onto its country"),
    );
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "tile-a")
            .attr("draggable", "true")
            .rect(20.0, 80.0, 80.0, 40.0)
            .text("Paris"),
    );
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("class", "tile-b")
            .attr("draggable", "true")
            .rect(120.0, 80.0, 80.0, 40.0)
            .text("Berlin"),
    );
    doc.append(
        root,
        ElementSpec::new("div")
            .attr("aria-label", "Response input area, 1 out of 3")
            .listener("drop")
            .rect(20.0, 200.0, 200.0, 80.0)
            .text("France"),
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

/// Opt-in tracing for debugging test runs: `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Driver wired to a scripted provider with unpaced test configs.
pub fn scripted_driver(provider: Arc<MockChatProvider>) -> Driver {
    init_tracing();
    let dispatcher = Dispatcher::new(provider, "mock-model");
    Driver::new(
        dispatcher,
        ExecConfig::test(),
        LoopConfig::test(),
        SnapshotConfig::test(),
    )
}

/// Open a quiz tab: portal on top, the item document in frame 7.
pub fn quiz_tab(frame_doc: Document) -> Arc<InProcessTab> {
    let frame_url = frame_doc.url.clone();
    let browser = InProcessBrowser::new();
    let tab = browser.open_tab(portal_doc(&frame_url));
    tab.add_frame(FrameId(7), frame_doc);
    tab
}

/// Drain everything currently queued on a subscription.
pub fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<DriverEvent>) -> Vec<DriverEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
