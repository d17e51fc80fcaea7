//! In-process document model the probe operates on.
//!
//! An arena tree of elements with the properties the map builder and the
//! action layer care about: tags, attributes, boxes, computed-style
//! visibility, form state, and bound listeners. Hosts that bridge to a live
//! browser never construct one of these; the in-process harness and the
//! tests do.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub type NodeId = usize;

/// Attribute marking the probe's own highlight overlay; such elements are
/// filtered out of every map and never receive events.
pub const OVERLAY_ATTR: &str = "data-tabpilot-overlay";

/// Document-coordinate bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

/// One `<option>` of a selection control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
    pub selected: bool,
}

/// Computed-style flags the map filter inspects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleFlags {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub opacity_zero: bool,
}

impl StyleFlags {
    pub fn is_hidden(&self) -> bool {
        self.display_none || self.visibility_hidden || self.opacity_zero
    }
}

/// Element payload.
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// Uppercased element kind.
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub rect: Rect,
    pub style: StyleFlags,
    /// Direct-child text, trimmed.
    pub text: Option<String>,
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub options: Vec<SelectOption>,
    /// Event types with a bound handler (`click`, `drop`, ...).
    pub listeners: BTreeSet<String>,
    pub scroll_top: f64,
    pub scroll_left: f64,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: ElementData,
}

/// Record of one synthetic event dispatched into the page.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub target: NodeId,
    pub name: String,
    pub client_x: Option<i64>,
    pub client_y: Option<i64>,
}

/// Builder-style description of an element to insert.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    data: ElementData,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            data: ElementData {
                tag: tag.to_uppercase(),
                ..Default::default()
            },
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.data.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, w: f64, h: f64) -> Self {
        self.data.rect = Rect::new(x, y, w, h);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.data.text = Some(text.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.data.value = Some(value.to_string());
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.data.checked = Some(checked);
        self
    }

    pub fn option(mut self, value: &str, text: &str, selected: bool) -> Self {
        self.data.options.push(SelectOption {
            value: value.to_string(),
            text: text.to_string(),
            selected,
        });
        self
    }

    pub fn listener(mut self, event: &str) -> Self {
        self.data.listeners.insert(event.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.data.style.display_none = true;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.data.style.visibility_hidden = true;
        self
    }

    pub fn transparent(mut self) -> Self {
        self.data.style.opacity_zero = true;
        self
    }
}

/// One frame's document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    pub url: String,
    pub title: String,
    pub viewport_w: f64,
    pub viewport_h: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub focused: Option<NodeId>,
    /// Synthetic events dispatched so far, in order.
    pub events: Vec<EventRecord>,
    /// Highlight overlay state: currently shown rect, and a counter of
    /// show/hide cycles.
    pub overlay_rect: Option<Rect>,
    pub highlight_count: u32,
}

impl Document {
    /// Create a document with a BODY root spanning the viewport.
    pub fn new(url: &str, title: &str, viewport_w: u32, viewport_h: u32) -> Self {
        let body = Node {
            id: 0,
            parent: None,
            children: Vec::new(),
            data: ElementData {
                tag: "BODY".to_string(),
                rect: Rect::new(0.0, 0.0, viewport_w as f64, viewport_h as f64),
                ..Default::default()
            },
        };
        Self {
            nodes: vec![body],
            url: url.to_string(),
            title: title.to_string(),
            viewport_w: viewport_w as f64,
            viewport_h: viewport_h as f64,
            scroll_x: 0.0,
            scroll_y: 0.0,
            focused: None,
            events: Vec::new(),
            overlay_rect: None,
            highlight_count: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert an element under `parent`, returning its id.
    pub fn append(&mut self, parent: NodeId, spec: ElementSpec) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            children: Vec::new(),
            data: spec.data,
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Remove a node and its subtree.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent {
            self.nodes[parent].children.retain(|&c| c != id);
        }
        // Arena slots are not reclaimed; detached subtrees simply become
        // unreachable from the root walk.
        self.nodes[id].parent = None;
    }

    /// Depth-first walk of the reachable tree, root first.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.nodes[id].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// 1-based position of a node among same-tag siblings.
    pub fn nth_of_type(&self, id: NodeId) -> usize {
        let tag = &self.nodes[id].data.tag;
        match self.nodes[id].parent {
            Some(parent) => {
                let mut n = 0;
                for &sibling in &self.nodes[parent].children {
                    if self.nodes[sibling].data.tag == *tag {
                        n += 1;
                        if sibling == id {
                            return n;
                        }
                    }
                }
                n.max(1)
            }
            None => 1,
        }
    }

    /// Collected text of a subtree: direct text of each node, document order,
    /// single-space joined.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut stack = vec![id];
        while let Some(nid) = stack.pop() {
            if let Some(ref text) = self.nodes[nid].data.text {
                if !text.trim().is_empty() {
                    parts.push(text.trim().to_string());
                }
            }
            for &child in self.nodes[nid].children.iter().rev() {
                stack.push(child);
            }
        }
        parts.join(" ")
    }

    /// Cheap markup serialization of a subtree.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.nodes[id].children {
            self.serialize_into(child, &mut out);
        }
        out
    }

    fn serialize_into(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        let tag = node.data.tag.to_lowercase();
        out.push('<');
        out.push_str(&tag);
        for (name, value) in &node.data.attrs {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
        out.push('>');
        if let Some(ref text) = node.data.text {
            out.push_str(text);
        }
        for &child in &node.children {
            self.serialize_into(child, out);
        }
        out.push_str(&format!("</{tag}>"));
    }

    /// Total scrollable height: the lowest box edge in the document.
    pub fn content_height(&self) -> f64 {
        self.walk()
            .iter()
            .map(|&id| {
                let r = &self.nodes[id].data.rect;
                r.y + r.h
            })
            .fold(self.viewport_h, f64::max)
    }

    /// Current viewport rectangle in document coordinates.
    pub fn viewport_rect(&self) -> Rect {
        Rect::new(self.scroll_x, self.scroll_y, self.viewport_w, self.viewport_h)
    }

    /// Scroll so the element's center sits inside the viewport.
    pub fn scroll_into_view(&mut self, id: NodeId) {
        let rect = self.nodes[id].data.rect;
        if rect.intersects(&self.viewport_rect()) {
            return;
        }
        let (_, cy) = rect.center();
        self.scroll_y = (cy - self.viewport_h / 2.0).max(0.0);
        let (cx, _) = rect.center();
        if cx < self.scroll_x || cx > self.scroll_x + self.viewport_w {
            self.scroll_x = (cx - self.viewport_w / 2.0).max(0.0);
        }
    }

    /// Client (viewport-relative) coordinates of an element's center.
    pub fn client_center(&self, id: NodeId) -> (i64, i64) {
        let (cx, cy) = self.nodes[id].data.rect.center();
        ((cx - self.scroll_x).round() as i64, (cy - self.scroll_y).round() as i64)
    }

    /// Record a synthetic event without coordinates.
    pub fn dispatch(&mut self, target: NodeId, name: &str) {
        self.events.push(EventRecord {
            target,
            name: name.to_string(),
            client_x: None,
            client_y: None,
        });
    }

    /// Record a synthetic pointer event at client coordinates.
    pub fn dispatch_at(&mut self, target: NodeId, name: &str, client_x: i64, client_y: i64) {
        self.events.push(EventRecord {
            target,
            name: name.to_string(),
            client_x: Some(client_x),
            client_y: Some(client_y),
        });
    }

    /// Names of events dispatched at `target`, in order. Test helper.
    pub fn events_for(&self, target: NodeId) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.target == target)
            .map(|e| e.name.as_str())
            .collect()
    }
}
