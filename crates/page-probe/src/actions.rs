//! In-frame action execution.
//!
//! Each action synthesizes the event sequence real pages listen for and
//! applies the matching state changes to the document. Selector-based
//! actions fail with a typed Not-Found error when nothing matches; other
//! failures come back as unsuccessful results so a batch can continue.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ProbeConfig;
use crate::dom::{Document, NodeId};
use crate::errors::ProbeError;
use crate::evaluate;
use crate::protocol::{DragCoords, ProbeAction, ProbeActionResult, ScrollDir};
use crate::selector;

const DEFAULT_SCROLL_AMOUNT: i64 = 600;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;
const DRAG_MOVE_STEPS: usize = 10;
const LABEL_LEN: usize = 40;

/// Execute one in-frame action against the shared document.
pub async fn execute(
    doc: &Arc<Mutex<Document>>,
    config: &ProbeConfig,
    action: ProbeAction,
) -> Result<ProbeActionResult, ProbeError> {
    match action {
        ProbeAction::Click { selector } => click(doc, &selector).await,
        ProbeAction::Type {
            selector,
            text,
            clear,
        } => type_text(doc, config, &selector, &text, clear.unwrap_or(true)).await,
        ProbeAction::Hover { selector } => hover(doc, &selector).await,
        ProbeAction::Scroll {
            direction,
            amount,
            selector,
        } => scroll(doc, direction, amount, selector.as_deref()).await,
        ProbeAction::Extract {
            selector,
            attribute,
        } => extract(doc, &selector, attribute.as_deref()).await,
        ProbeAction::Evaluate { expression } => {
            let doc = doc.lock().await;
            let value = evaluate::evaluate(&doc, &expression, config.max_eval_len)?;
            Ok(ProbeActionResult::ok_with(
                format!("evaluated: {}", short(&value, 80)),
                json!(value),
            ))
        }
        ProbeAction::Keyboard { key } => keyboard(doc, &key).await,
        ProbeAction::Select { selector, value } => select(doc, &selector, &value).await,
        ProbeAction::Wait {
            selector,
            timeout,
            milliseconds,
        } => wait(doc, config, selector.as_deref(), timeout, milliseconds).await,
        ProbeAction::Drag {
            from_selector,
            to_selector,
        } => drag(doc, config, &from_selector, &to_selector).await,
        ProbeAction::Describe { text } => Ok(ProbeActionResult::ok(
            text.unwrap_or_else(|| "noted".to_string()),
        )),
    }
}

async fn click(doc: &Arc<Mutex<Document>>, sel: &str) -> Result<ProbeActionResult, ProbeError> {
    let mut doc = doc.lock().await;
    let id = selector::resolve(&doc, sel)?;
    doc.scroll_into_view(id);

    let rect = doc.node(id).data.rect;
    doc.overlay_rect = Some(rect);
    doc.highlight_count += 1;

    let (cx, cy) = doc.client_center(id);
    for event in ["mouseover", "mousedown", "mouseup", "click"] {
        doc.dispatch_at(id, event, cx, cy);
    }
    doc.focused = Some(id);
    apply_click_state(&mut doc, id);

    doc.overlay_rect = None;
    debug!(selector = sel, "click dispatched");
    Ok(ProbeActionResult::ok(format!("clicked {sel}")))
}

/// Default activation behavior for form controls.
fn apply_click_state(doc: &mut Document, id: NodeId) {
    let (tag, kind, name) = {
        let data = &doc.node(id).data;
        (
            data.tag.clone(),
            data.attrs.get("type").cloned().unwrap_or_default(),
            data.attrs.get("name").cloned(),
        )
    };
    if tag != "INPUT" {
        return;
    }
    match kind.as_str() {
        "radio" => {
            // Check this one, uncheck the rest of its group.
            let peers: Vec<NodeId> = doc
                .walk()
                .into_iter()
                .filter(|&n| {
                    let d = &doc.node(n).data;
                    d.tag == "INPUT"
                        && d.attrs.get("type").map(String::as_str) == Some("radio")
                        && d.attrs.get("name") == name.as_ref()
                })
                .collect();
            for peer in peers {
                doc.node_mut(peer).data.checked = Some(peer == id);
            }
            doc.dispatch(id, "change");
        }
        "checkbox" => {
            let next = !doc.node(id).data.checked.unwrap_or(false);
            doc.node_mut(id).data.checked = Some(next);
            doc.dispatch(id, "change");
        }
        _ => {}
    }
}

async fn type_text(
    doc: &Arc<Mutex<Document>>,
    config: &ProbeConfig,
    sel: &str,
    text: &str,
    clear: bool,
) -> Result<ProbeActionResult, ProbeError> {
    {
        let mut doc = doc.lock().await;
        let id = selector::resolve(&doc, sel)?;
        doc.scroll_into_view(id);
        doc.focused = Some(id);
        doc.dispatch(id, "focus");
        if clear {
            doc.node_mut(id).data.value = Some(String::new());
            doc.dispatch(id, "input");
        }
    }

    for (i, ch) in text.chars().enumerate() {
        {
            let mut doc = doc.lock().await;
            let id = selector::resolve(&doc, sel)?;
            doc.dispatch(id, "keydown");
            let value = doc.node_mut(id).data.value.get_or_insert_with(String::new);
            value.push(ch);
            doc.dispatch(id, "input");
            doc.dispatch(id, "keyup");
        }
        let delay = config.keystroke_delay(i);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    let mut doc = doc.lock().await;
    let id = selector::resolve(&doc, sel)?;
    doc.dispatch(id, "change");
    Ok(ProbeActionResult::ok(format!(
        "typed {} characters into {sel}",
        text.chars().count()
    )))
}

async fn hover(doc: &Arc<Mutex<Document>>, sel: &str) -> Result<ProbeActionResult, ProbeError> {
    let mut doc = doc.lock().await;
    let id = selector::resolve(&doc, sel)?;
    doc.scroll_into_view(id);
    let (cx, cy) = doc.client_center(id);
    for event in ["mouseenter", "mouseover", "mousemove"] {
        doc.dispatch_at(id, event, cx, cy);
    }
    Ok(ProbeActionResult::ok(format!("hovering {sel}")))
}

async fn scroll(
    doc: &Arc<Mutex<Document>>,
    direction: Option<ScrollDir>,
    amount: Option<i64>,
    sel: Option<&str>,
) -> Result<ProbeActionResult, ProbeError> {
    let mut doc = doc.lock().await;
    let direction = direction.unwrap_or(ScrollDir::Down);
    let amount = amount.unwrap_or(DEFAULT_SCROLL_AMOUNT) as f64;
    let (dx, dy) = match direction {
        ScrollDir::Up => (0.0, -amount),
        ScrollDir::Down => (0.0, amount),
        ScrollDir::Left => (-amount, 0.0),
        ScrollDir::Right => (amount, 0.0),
    };

    match sel {
        Some(sel) => {
            let id = selector::resolve(&doc, sel)?;
            let data = &mut doc.node_mut(id).data;
            data.scroll_top = (data.scroll_top + dy).max(0.0);
            data.scroll_left = (data.scroll_left + dx).max(0.0);
            doc.dispatch(id, "scroll");
            Ok(ProbeActionResult::ok(format!("scrolled {sel}")))
        }
        None => {
            let max_y = (doc.content_height() - doc.viewport_h).max(0.0);
            doc.scroll_y = (doc.scroll_y + dy).clamp(0.0, max_y);
            doc.scroll_x = (doc.scroll_x + dx).max(0.0);
            let root = doc.root();
            doc.dispatch(root, "scroll");
            Ok(ProbeActionResult::ok(format!(
                "scrolled window to ({},{})",
                doc.scroll_x.round() as i64,
                doc.scroll_y.round() as i64
            )))
        }
    }
}

async fn extract(
    doc: &Arc<Mutex<Document>>,
    sel: &str,
    attribute: Option<&str>,
) -> Result<ProbeActionResult, ProbeError> {
    let doc = doc.lock().await;
    let found = selector::query_all_str(&doc, sel)?;
    if found.is_empty() {
        return Err(ProbeError::selector_not_found(sel));
    }
    let values: Vec<String> = found
        .iter()
        .map(|&id| match attribute {
            None => doc.text_content(id),
            Some("innerHTML") => doc.inner_html(id),
            Some(attr) => doc.node(id).data.attrs.get(attr).cloned().unwrap_or_default(),
        })
        .collect();
    let summary = short(&values.join(" | "), 200);
    Ok(ProbeActionResult::ok_with(
        format!("extracted {} node(s): {summary}", values.len()),
        json!(values),
    ))
}

async fn keyboard(doc: &Arc<Mutex<Document>>, key: &str) -> Result<ProbeActionResult, ProbeError> {
    let mut doc = doc.lock().await;
    let target = doc.focused.unwrap_or_else(|| doc.root());
    doc.dispatch(target, "keydown");
    if key.eq_ignore_ascii_case("enter") {
        doc.dispatch(target, "keypress");
    }
    doc.dispatch(target, "keyup");
    Ok(ProbeActionResult::ok(format!("pressed {key}")))
}

async fn select(
    doc: &Arc<Mutex<Document>>,
    sel: &str,
    value: &str,
) -> Result<ProbeActionResult, ProbeError> {
    let mut doc = doc.lock().await;
    let id = selector::resolve(&doc, sel)?;
    {
        let data = &mut doc.node_mut(id).data;
        let mut matched = false;
        for option in &mut data.options {
            option.selected = option.value == value || option.text == value;
            matched |= option.selected;
        }
        data.value = Some(value.to_string());
        if !matched && !data.options.is_empty() {
            debug!(selector = sel, value, "select value not among options");
        }
    }
    doc.dispatch(id, "change");
    doc.dispatch(id, "input");
    Ok(ProbeActionResult::ok(format!("selected '{value}' in {sel}")))
}

async fn wait(
    doc: &Arc<Mutex<Document>>,
    config: &ProbeConfig,
    sel: Option<&str>,
    timeout: Option<u64>,
    milliseconds: Option<u64>,
) -> Result<ProbeActionResult, ProbeError> {
    match sel {
        Some(sel) => {
            let deadline = Duration::from_millis(timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS));
            let started = tokio::time::Instant::now();
            loop {
                {
                    let doc = doc.lock().await;
                    if !selector::query_all_str(&doc, sel)?.is_empty() {
                        return Ok(ProbeActionResult::ok(format!("{sel} appeared")));
                    }
                }
                if started.elapsed() >= deadline {
                    return Ok(ProbeActionResult::failed(format!(
                        "timed out waiting for {sel}"
                    )));
                }
                tokio::time::sleep(Duration::from_millis(config.wait_poll_interval_ms)).await;
            }
        }
        None => {
            let ms = milliseconds.unwrap_or(1_000);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ProbeActionResult::ok(format!("waited {ms}ms")))
        }
    }
}

/// Synthesized in-frame drag: pointer+mouse gesture followed by a
/// best-effort HTML5 sequence. Different libraries listen on different
/// subsets, hence both phases.
async fn drag(
    doc: &Arc<Mutex<Document>>,
    config: &ProbeConfig,
    from_sel: &str,
    to_sel: &str,
) -> Result<ProbeActionResult, ProbeError> {
    let (source, target, from, to) = {
        let mut doc = doc.lock().await;
        let source = selector::resolve(&doc, from_sel)?;
        let target = selector::resolve(&doc, to_sel)?;
        doc.scroll_into_view(source);
        let from = doc.client_center(source);
        let to = doc.client_center(target);

        doc.dispatch_at(source, "pointerdown", from.0, from.1);
        doc.dispatch_at(source, "mousedown", from.0, from.1);
        (source, target, from, to)
    };

    step_delay(config).await;

    for i in 1..=DRAG_MOVE_STEPS {
        let t = i as f64 / DRAG_MOVE_STEPS as f64;
        let x = from.0 + ((to.0 - from.0) as f64 * t).round() as i64;
        let y = from.1 + ((to.1 - from.1) as f64 * t).round() as i64;
        {
            let mut doc = doc.lock().await;
            doc.dispatch_at(source, "pointermove", x, y);
            doc.dispatch_at(source, "mousemove", x, y);
        }
        step_delay(config).await;
    }

    {
        let mut doc = doc.lock().await;
        doc.dispatch_at(target, "mouseenter", to.0, to.1);
        doc.dispatch_at(target, "mouseover", to.0, to.1);
        doc.dispatch_at(target, "pointerup", to.0, to.1);
        doc.dispatch_at(target, "mouseup", to.0, to.1);
    }

    step_delay(config).await;

    // HTML5 phase with a fresh DataTransfer equivalent.
    {
        let mut doc = doc.lock().await;
        doc.dispatch_at(source, "dragstart", from.0, from.1);
        doc.dispatch_at(target, "dragenter", to.0, to.1);
        doc.dispatch_at(target, "dragover", to.0, to.1);
        doc.dispatch_at(target, "drop", to.0, to.1);
        doc.dispatch_at(source, "dragend", to.0, to.1);
    }

    Ok(ProbeActionResult::ok(format!(
        "dragged {from_sel} to {to_sel}"
    )))
}

async fn step_delay(config: &ProbeConfig) {
    if config.drag_step_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.drag_step_delay_ms)).await;
    }
}

/// Resolve both endpoints of a drag to client-center coordinates plus short
/// labels, scrolling the source into view first.
pub fn drag_coords(doc: &mut Document, from: &str, to: &str) -> Result<DragCoords, ProbeError> {
    let source = selector::resolve(doc, from)?;
    let target = selector::resolve(doc, to)?;
    doc.scroll_into_view(source);
    let (fx, fy) = doc.client_center(source);
    let (tx, ty) = doc.client_center(target);
    Ok(DragCoords {
        from_x: fx,
        from_y: fy,
        to_x: tx,
        to_y: ty,
        from_label: label_of(doc, source),
        to_label: label_of(doc, target),
    })
}

fn label_of(doc: &Document, id: NodeId) -> String {
    let data = &doc.node(id).data;
    let label = data
        .text
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| data.attrs.get("aria-label").cloned())
        .unwrap_or_else(|| data.tag.to_lowercase());
    short(label.trim(), LABEL_LEN)
}

/// Viewport position of the iframe element carrying `url`, if any.
pub fn iframe_offset(doc: &Document, url: &str) -> Option<(f64, f64)> {
    doc.walk().into_iter().find_map(|id| {
        let data = &doc.node(id).data;
        if data.tag != "IFRAME" {
            return None;
        }
        let src = data.attrs.get("src")?;
        if url.starts_with(src.as_str()) || src.starts_with(url) {
            Some((data.rect.x - doc.scroll_x, data.rect.y - doc.scroll_y))
        } else {
            None
        }
    })
}

fn short(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementSpec;

    fn shared(doc: Document) -> Arc<Mutex<Document>> {
        Arc::new(Mutex::new(doc))
    }

    fn form_doc() -> Document {
        let mut doc = Document::new("https://example.com", "t", 800, 600);
        let root = doc.root();
        doc.append(
            root,
            ElementSpec::new("input")
                .attr("type", "text")
                .attr("id", "q")
                .rect(0.0, 0.0, 200.0, 24.0),
        );
        doc.append(
            root,
            ElementSpec::new("input")
                .attr("type", "radio")
                .attr("name", "answer")
                .attr("id", "a1")
                .rect(0.0, 40.0, 16.0, 16.0),
        );
        doc.append(
            root,
            ElementSpec::new("input")
                .attr("type", "radio")
                .attr("name", "answer")
                .attr("id", "a2")
                .rect(0.0, 60.0, 16.0, 16.0)
                .checked(true),
        );
        doc
    }

    #[tokio::test]
    async fn click_dispatches_full_sequence_and_hides_overlay() {
        let doc = shared(form_doc());
        let result = execute(
            &doc,
            &ProbeConfig::test(),
            ProbeAction::Click {
                selector: "#a1".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(result.success);

        let doc = doc.lock().await;
        let id = selector::resolve(&doc, "#a1").unwrap();
        assert_eq!(
            doc.events_for(id),
            vec!["mouseover", "mousedown", "mouseup", "click", "change"]
        );
        assert!(doc.overlay_rect.is_none());
        assert_eq!(doc.highlight_count, 1);
    }

    #[tokio::test]
    async fn radio_click_moves_the_check_within_the_group() {
        let doc = shared(form_doc());
        execute(
            &doc,
            &ProbeConfig::test(),
            ProbeAction::Click {
                selector: "#a1".to_string(),
            },
        )
        .await
        .unwrap();

        let doc = doc.lock().await;
        let a1 = selector::resolve(&doc, "#a1").unwrap();
        let a2 = selector::resolve(&doc, "#a2").unwrap();
        assert_eq!(doc.node(a1).data.checked, Some(true));
        assert_eq!(doc.node(a2).data.checked, Some(false));
    }

    #[tokio::test]
    async fn typing_appends_per_character_with_events() {
        let doc = shared(form_doc());
        let result = execute(
            &doc,
            &ProbeConfig::test(),
            ProbeAction::Type {
                selector: "#q".to_string(),
                text: "hi".to_string(),
                clear: None,
            },
        )
        .await
        .unwrap();
        assert!(result.success);

        let doc = doc.lock().await;
        let id = selector::resolve(&doc, "#q").unwrap();
        assert_eq!(doc.node(id).data.value.as_deref(), Some("hi"));
        let events = doc.events_for(id);
        // focus, clear input, then keydown/input/keyup per char, then change.
        assert_eq!(events[0], "focus");
        assert_eq!(events.last().copied(), Some("change"));
        assert_eq!(events.iter().filter(|e| **e == "keydown").count(), 2);
        assert_eq!(events.iter().filter(|e| **e == "input").count(), 3);
    }

    #[tokio::test]
    async fn extract_maps_many_nodes() {
        let mut base = Document::new("https://example.com", "t", 800, 600);
        let root = base.root();
        base.append(root, ElementSpec::new("li").attr("class", "r").rect(0.0, 0.0, 10.0, 10.0).text("x"));
        base.append(root, ElementSpec::new("li").attr("class", "r").rect(0.0, 12.0, 10.0, 10.0).text("y"));
        let doc = shared(base);
        let result = execute(
            &doc,
            &ProbeConfig::test(),
            ProbeAction::Extract {
                selector: ".r".to_string(),
                attribute: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(result.payload.unwrap(), json!(["x", "y"]));
    }

    #[tokio::test]
    async fn wait_for_selector_sees_late_mutation() {
        let doc = shared(form_doc());
        let writer = Arc::clone(&doc);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut doc = writer.lock().await;
            let root = doc.root();
            doc.append(
                root,
                ElementSpec::new("div").attr("id", "late").rect(0.0, 0.0, 10.0, 10.0).text("!"),
            );
        });

        let result = execute(
            &doc,
            &ProbeConfig::test(),
            ProbeAction::Wait {
                selector: Some("#late".to_string()),
                timeout: Some(500),
                milliseconds: None,
            },
        )
        .await
        .unwrap();
        handle.await.unwrap();
        assert!(result.success, "{}", result.message);
    }

    #[tokio::test]
    async fn wait_timeout_is_unsuccessful_not_an_error() {
        let doc = shared(form_doc());
        let result = execute(
            &doc,
            &ProbeConfig::test(),
            ProbeAction::Wait {
                selector: Some("#never".to_string()),
                timeout: Some(20),
                milliseconds: None,
            },
        )
        .await
        .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn drag_runs_both_phases_in_order() {
        let mut base = Document::new("https://example.com", "t", 800, 600);
        let root = base.root();
        base.append(
            root,
            ElementSpec::new("div").attr("id", "tile").attr("draggable", "true").rect(0.0, 0.0, 40.0, 40.0),
        );
        base.append(
            root,
            ElementSpec::new("div").attr("id", "zone").listener("drop").rect(200.0, 0.0, 80.0, 80.0),
        );
        let doc = shared(base);
        execute(
            &doc,
            &ProbeConfig::test(),
            ProbeAction::Drag {
                from_selector: "#tile".to_string(),
                to_selector: "#zone".to_string(),
            },
        )
        .await
        .unwrap();

        let doc = doc.lock().await;
        let tile = selector::resolve(&doc, "#tile").unwrap();
        let zone = selector::resolve(&doc, "#zone").unwrap();
        let tile_events = doc.events_for(tile);
        let zone_events = doc.events_for(zone);

        assert_eq!(tile_events[0], "pointerdown");
        assert_eq!(tile_events[1], "mousedown");
        assert_eq!(
            tile_events.iter().filter(|e| **e == "pointermove").count(),
            DRAG_MOVE_STEPS
        );
        assert!(tile_events.contains(&"dragstart"));
        assert_eq!(tile_events.last().copied(), Some("dragend"));
        assert_eq!(zone_events, vec!["mouseenter", "mouseover", "pointerup", "mouseup", "dragenter", "dragover", "drop"]);
    }

    #[tokio::test]
    async fn drag_coords_reports_centers_and_labels() {
        let mut base = Document::new("https://example.com", "t", 800, 600);
        let root = base.root();
        base.append(
            root,
            ElementSpec::new("div").attr("id", "tile").rect(0.0, 0.0, 40.0, 40.0).text("Tile A"),
        );
        base.append(
            root,
            ElementSpec::new("div")
                .attr("id", "zone")
                .attr("aria-label", "Response input area, 1 out of 3")
                .rect(200.0, 100.0, 80.0, 80.0),
        );
        let mut doc = base;
        let coords = drag_coords(&mut doc, "#tile", "#zone").unwrap();
        assert_eq!((coords.from_x, coords.from_y), (20, 20));
        assert_eq!((coords.to_x, coords.to_y), (240, 140));
        assert_eq!(coords.from_label, "Tile A");
        assert!(coords.to_label.starts_with("Response input area"));
    }

    #[tokio::test]
    async fn iframe_offset_matches_by_src_prefix() {
        let mut base = Document::new("https://example.com", "t", 800, 600);
        let root = base.root();
        base.append(
            root,
            ElementSpec::new("iframe")
                .attr("src", "https://quiz.example.com/embed")
                .rect(100.0, 150.0, 600.0, 400.0),
        );
        assert_eq!(
            iframe_offset(&base, "https://quiz.example.com/embed?item=3"),
            Some((100.0, 150.0))
        );
        assert_eq!(iframe_offset(&base, "https://other.example.com/"), None);
    }
}
