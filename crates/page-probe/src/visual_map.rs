//! Visual Page Map construction.
//!
//! The map grammar is fixed: the planner prompt teaches it and the snapshot
//! differ parses it, so every producer and consumer goes through the
//! constants and renderer here.

use serde::{Deserialize, Serialize};

use crate::config::ProbeConfig;
use crate::dom::{Document, NodeId, SelectOption, OVERLAY_ATTR};
use crate::selector;

/// Header opening every per-frame map.
pub const MAP_HEADER: &str = "=== VISUAL PAGE MAP ===";

/// Prefix shared by all iframe section headers in a merged map.
pub const IFRAME_MARKER: &str = "=== IFRAME CONTENT";

/// Header opening a section diff.
pub const DIFF_HEADER: &str = "=== PAGE UPDATE (diff) ===";

/// Section header for one child frame's content in a merged map.
pub fn iframe_header(frame_id: i64) -> String {
    format!("=== IFRAME CONTENT (frameId={frame_id}) ===")
}

/// Tags never emitted into a map. SCRIPT-like tags prune their subtree.
const REJECTED_TAGS: &[&str] = &[
    "SCRIPT", "STYLE", "NOSCRIPT", "SVG", "PATH", "META", "LINK", "BR", "HR", "OPTION",
];

/// Natively interactive element kinds.
const INTERACTIVE_TAGS: &[&str] = &[
    "A", "BUTTON", "INPUT", "SELECT", "TEXTAREA", "SUMMARY", "DETAILS",
];

/// ARIA roles that mark an element interactive.
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "tab", "checkbox", "radio", "option", "menuitem",
];

/// One element of a Visual Page Map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualElement {
    pub tag: String,
    pub selector: String,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub interactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default)]
    pub draggable: bool,
    #[serde(default)]
    pub droptarget: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

/// Walk the document and collect map elements, capped and (y, x) sorted.
pub fn collect_elements(doc: &Document, config: &ProbeConfig) -> Vec<VisualElement> {
    let mut out = Vec::new();
    let mut stack = vec![doc.root()];

    while let Some(id) = stack.pop() {
        if out.len() >= config.max_elements {
            break;
        }
        let data = &doc.node(id).data;

        // Subtree prunes: rejected kinds, display:none, the probe's own
        // overlay.
        if REJECTED_TAGS.contains(&data.tag.as_str())
            || data.style.display_none
            || data.attrs.contains_key(OVERLAY_ATTR)
        {
            continue;
        }

        for &child in doc.node(id).children.iter().rev() {
            stack.push(child);
        }

        if data.style.is_hidden() || data.rect.area() <= 0.0 {
            continue;
        }

        let interactive = is_interactive(doc, id);
        let has_text = data.text.as_ref().is_some_and(|t| !t.trim().is_empty());
        // Images are kept even when bare: the vision-need scorer reads
        // their geometry from the map.
        if !interactive && !has_text && data.tag != "IMG" {
            continue;
        }

        out.push(build_element(doc, id, interactive, config));
    }

    out.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));
    out
}

fn is_interactive(doc: &Document, id: NodeId) -> bool {
    let data = &doc.node(id).data;
    if INTERACTIVE_TAGS.contains(&data.tag.as_str()) {
        return true;
    }
    if data
        .attrs
        .get("role")
        .is_some_and(|r| INTERACTIVE_ROLES.contains(&r.as_str()))
    {
        return true;
    }
    data.listeners.contains("click")
        || data.attrs.contains_key("tabindex")
        || data.attrs.contains_key("draggable")
}

fn build_element(
    doc: &Document,
    id: NodeId,
    interactive: bool,
    config: &ProbeConfig,
) -> VisualElement {
    let data = &doc.node(id).data;
    let rect = data.rect;
    let visible = rect.intersects(&doc.viewport_rect());

    let text = data
        .text
        .as_ref()
        .map(|t| truncate(t.trim(), config.max_text_len))
        .filter(|t| !t.is_empty());

    let value = data
        .value
        .clone()
        .or_else(|| data.attrs.get("value").cloned())
        .map(|v| truncate(&v, config.max_value_len))
        .filter(|v| !v.is_empty());

    let checked = match data.tag.as_str() {
        "INPUT" => {
            let kind = data.attrs.get("type").map(String::as_str).unwrap_or("");
            if kind == "radio" || kind == "checkbox" {
                Some(data.checked.unwrap_or(data.attrs.contains_key("checked")))
            } else {
                None
            }
        }
        _ => None,
    };

    let mut options = data.options.clone();
    options.truncate(config.max_options);

    VisualElement {
        tag: data.tag.clone(),
        selector: selector::selector_for(doc, id),
        x: rect.x.round() as i64,
        y: rect.y.round() as i64,
        w: rect.w.round().max(0.0) as i64,
        h: rect.h.round().max(0.0) as i64,
        visible,
        text,
        interactive,
        input_type: if data.tag == "INPUT" {
            data.attrs.get("type").cloned()
        } else {
            None
        },
        value,
        placeholder: data.attrs.get("placeholder").cloned(),
        aria_label: data.attrs.get("aria-label").cloned(),
        checked,
        draggable: data.attrs.get("draggable").is_some_and(|v| v != "false")
            || data.listeners.contains("dragstart"),
        droptarget: data.listeners.contains("drop")
            || data.listeners.contains("dragover")
            || data.attrs.contains_key("aria-dropeffect"),
        disabled: data.attrs.contains_key("disabled"),
        href: if data.tag == "A" {
            data.attrs.get("href").cloned()
        } else {
            None
        },
        options,
    }
}

/// Render one frame's full map document.
pub fn build_map(doc: &Document, config: &ProbeConfig) -> String {
    let elements = collect_elements(doc, config);
    let mut out = String::new();
    out.push_str(MAP_HEADER);
    out.push('\n');
    out.push_str(&format!(
        "Viewport {}x{}, scroll ({},{}), {} elements\n",
        doc.viewport_w.round() as i64,
        doc.viewport_h.round() as i64,
        doc.scroll_x.round() as i64,
        doc.scroll_y.round() as i64,
        elements.len(),
    ));
    for element in &elements {
        out.push_str(&render_element(element));
        out.push('\n');
    }
    out
}

/// Render one element line of the fixed grammar.
pub fn render_element(el: &VisualElement) -> String {
    let mut line = String::from("[");
    if el.interactive {
        line.push('*');
    }
    line.push_str(&el.tag);
    if let Some(ref input_type) = el.input_type {
        line.push_str(&format!("[{input_type}]"));
    }
    line.push_str(&format!("] @({},{} {}x{})", el.x, el.y, el.w, el.h));
    if !el.visible {
        line.push_str(" [offscreen]");
    }
    line.push_str(&format!(" sel=\"{}\"", el.selector));
    if let Some(ref text) = el.text {
        line.push_str(&format!(" \"{}\"", sanitize(text)));
    }
    if let Some(ref value) = el.value {
        line.push_str(&format!(" value=\"{}\"", sanitize(value)));
    }
    if let Some(ref placeholder) = el.placeholder {
        line.push_str(&format!(" placeholder=\"{}\"", sanitize(placeholder)));
    }
    if let Some(ref aria) = el.aria_label {
        if el.text.as_deref() != Some(aria.as_str()) {
            line.push_str(&format!(" aria=\"{}\"", sanitize(aria)));
        }
    }
    if let Some(ref href) = el.href {
        line.push_str(&format!(" href=\"{href}\""));
    }
    match el.checked {
        Some(true) => line.push_str(" [checked]"),
        Some(false) => line.push_str(" [unchecked]"),
        None => {}
    }
    if el.disabled {
        line.push_str(" [disabled]");
    }
    if el.draggable {
        line.push_str(" [draggable]");
    }
    if el.droptarget {
        line.push_str(" [droptarget]");
    }
    if !el.options.is_empty() {
        let rendered: Vec<String> = el
            .options
            .iter()
            .map(|o| {
                let marker = if o.selected { "*" } else { "" };
                format!("{}:\"{}\"{}", o.value, sanitize(&o.text), marker)
            })
            .collect();
        line.push_str(&format!(" options=[{}]", rendered.join(",")));
    }
    line
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn sanitize(s: &str) -> String {
    s.replace('"', "'").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementSpec;

    fn quiz_doc() -> Document {
        let mut doc = Document::new("https://quiz.example.com/item/3", "Quick Check", 1280, 800);
        let root = doc.root();
        doc.append(
            root,
            ElementSpec::new("h1").rect(20.0, 10.0, 400.0, 30.0).text("Question 3"),
        );
        doc.append(
            root,
            ElementSpec::new("input")
                .attr("type", "radio")
                .attr("id", "opt3")
                .attr("class", "mcq-input")
                .rect(20.0, 60.0, 16.0, 16.0)
                .text("Paris"),
        );
        doc.append(
            root,
            ElementSpec::new("button")
                .attr("id", "next")
                .rect(20.0, 120.0, 80.0, 28.0)
                .text("Next"),
        );
        doc.append(
            root,
            ElementSpec::new("script").rect(0.0, 0.0, 1.0, 1.0).text("var x;"),
        );
        doc.append(
            root,
            ElementSpec::new("div").rect(0.0, 2000.0, 100.0, 40.0).text("Footer"),
        );
        doc
    }

    #[test]
    fn map_starts_with_header_and_summary() {
        let doc = quiz_doc();
        let map = build_map(&doc, &ProbeConfig::test());
        let mut lines = map.lines();
        assert_eq!(lines.next().unwrap(), MAP_HEADER);
        assert!(lines.next().unwrap().starts_with("Viewport 1280x800"));
    }

    #[test]
    fn rejected_tags_are_absent() {
        let doc = quiz_doc();
        let map = build_map(&doc, &ProbeConfig::test());
        assert!(!map.contains("SCRIPT"));
    }

    #[test]
    fn radio_line_matches_grammar() {
        let doc = quiz_doc();
        let map = build_map(&doc, &ProbeConfig::test());
        let radio_line = map
            .lines()
            .find(|l| l.contains("#opt3"))
            .expect("radio emitted");
        assert!(radio_line.starts_with("[*INPUT[radio]]"), "{radio_line}");
        assert!(radio_line.contains("sel=\"#opt3\""));
        assert!(radio_line.contains("\"Paris\""));
        assert!(radio_line.contains("[unchecked]"));
    }

    #[test]
    fn offscreen_elements_are_marked() {
        let doc = quiz_doc();
        let map = build_map(&doc, &ProbeConfig::test());
        let footer = map.lines().find(|l| l.contains("Footer")).unwrap();
        assert!(footer.contains("[offscreen]"));
    }

    #[test]
    fn elements_sorted_by_y_then_x() {
        let mut doc = Document::new("https://example.com", "t", 800, 600);
        let root = doc.root();
        doc.append(root, ElementSpec::new("span").rect(300.0, 50.0, 10.0, 10.0).text("b"));
        doc.append(root, ElementSpec::new("span").rect(10.0, 50.0, 10.0, 10.0).text("a"));
        doc.append(root, ElementSpec::new("span").rect(10.0, 10.0, 10.0, 10.0).text("top"));
        let elements = collect_elements(&doc, &ProbeConfig::test());
        let ys: Vec<i64> = elements.iter().map(|e| e.y).collect();
        let mut sorted = ys.clone();
        sorted.sort();
        assert_eq!(ys, sorted);
        assert_eq!(elements[1].text.as_deref(), Some("a"));
        assert_eq!(elements[2].text.as_deref(), Some("b"));
    }

    #[test]
    fn hidden_elements_are_filtered() {
        let mut doc = Document::new("https://example.com", "t", 800, 600);
        let root = doc.root();
        doc.append(root, ElementSpec::new("div").rect(0.0, 0.0, 10.0, 10.0).text("gone").hidden());
        doc.append(
            root,
            ElementSpec::new("div").rect(0.0, 0.0, 10.0, 10.0).text("ghost").invisible(),
        );
        doc.append(
            root,
            ElementSpec::new("div").rect(0.0, 20.0, 10.0, 10.0).text("faded").transparent(),
        );
        doc.append(root, ElementSpec::new("div").rect(0.0, 40.0, 10.0, 10.0).text("kept"));
        let elements = collect_elements(&doc, &ProbeConfig::test());
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].text.as_deref(), Some("kept"));
    }

    #[test]
    fn display_none_prunes_subtree_but_visibility_does_not() {
        let mut doc = Document::new("https://example.com", "t", 800, 600);
        let root = doc.root();
        let gone = doc.append(root, ElementSpec::new("div").rect(0.0, 0.0, 50.0, 50.0).hidden());
        doc.append(gone, ElementSpec::new("span").rect(0.0, 0.0, 10.0, 10.0).text("buried"));
        let ghost =
            doc.append(root, ElementSpec::new("div").rect(0.0, 60.0, 50.0, 50.0).invisible());
        doc.append(ghost, ElementSpec::new("span").rect(0.0, 60.0, 10.0, 10.0).text("shown"));
        let elements = collect_elements(&doc, &ProbeConfig::test());
        let texts: Vec<_> = elements.iter().filter_map(|e| e.text.as_deref()).collect();
        assert_eq!(texts, vec!["shown"]);
    }

    #[test]
    fn select_options_render_with_selection_marker() {
        let mut doc = Document::new("https://example.com", "t", 800, 600);
        let root = doc.root();
        doc.append(
            root,
            ElementSpec::new("select")
                .attr("id", "country")
                .rect(0.0, 0.0, 120.0, 24.0)
                .option("fr", "France", true)
                .option("de", "Germany", false),
        );
        let map = build_map(&doc, &ProbeConfig::test());
        let line = map.lines().find(|l| l.contains("#country")).unwrap();
        assert!(line.contains("options=[fr:\"France\"*,de:\"Germany\"]"), "{line}");
    }

    #[test]
    fn element_cap_is_enforced() {
        let mut doc = Document::new("https://example.com", "t", 800, 600);
        let root = doc.root();
        for i in 0..600 {
            doc.append(
                root,
                ElementSpec::new("p")
                    .rect(0.0, i as f64 * 12.0, 100.0, 10.0)
                    .text(&format!("line {i}")),
            );
        }
        let elements = collect_elements(&doc, &ProbeConfig::default());
        assert_eq!(elements.len(), 500);
    }
}
