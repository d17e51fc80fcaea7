//! Section diffing between consecutive merged maps.
//!
//! Quiz iframes swap one item at a time while the outer page stays put, so
//! later steps send a diff: unchanged sections collapse to a one-line
//! summary, changed sections replay in full. Applying a diff section-wise
//! over the previous full map must reproduce the new element set exactly.

use tabpilot_page_probe::visual_map::{DIFF_HEADER, MAP_HEADER};

/// Returned when no element line changed anywhere in the document.
pub const UNCHANGED_MARKER: &str = "[Page unchanged]";

const KEY_CONTROLS_CAP: usize = 10;

#[derive(Debug, Clone, PartialEq)]
struct Section {
    header: String,
    lines: Vec<String>,
}

impl Section {
    fn element_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|l| l.starts_with('['))
            .collect()
    }
}

fn split_sections(map: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for line in map.lines() {
        if line.starts_with("===") {
            sections.push(Section {
                header: line.to_string(),
                lines: Vec::new(),
            });
        } else if let Some(current) = sections.last_mut() {
            current.lines.push(line.to_string());
        }
        // Text before the first header would be malformed input; dropped.
    }
    sections
}

/// Compute the token-lean update between two merged maps.
pub fn compute_diff(old_map: &str, new_map: &str) -> String {
    let old_sections = split_sections(old_map);
    let new_sections = split_sections(new_map);

    let same_structure = old_sections.len() == new_sections.len()
        && old_sections
            .iter()
            .zip(&new_sections)
            .all(|(a, b)| a.header == b.header);

    let changed: Vec<bool> = new_sections
        .iter()
        .map(|section| {
            match old_sections.iter().find(|o| o.header == section.header) {
                Some(old) => old.element_lines() != section.element_lines(),
                None => true,
            }
        })
        .collect();

    if same_structure && changed.iter().all(|c| !c) {
        return UNCHANGED_MARKER.to_string();
    }

    let mut out = String::new();
    out.push_str(DIFF_HEADER);
    out.push('\n');
    out.push_str("Previous selectors remain valid.\n");

    for (section, &is_changed) in new_sections.iter().zip(&changed) {
        out.push_str(&section.header);
        out.push('\n');
        if is_changed {
            for line in &section.lines {
                out.push_str(line);
                out.push('\n');
            }
        } else {
            let count = section.element_lines().len();
            if section.header == MAP_HEADER {
                out.push_str(&format!("[Outer page: {count} elements unchanged]\n"));
                if let Some(controls) = key_controls(&section.lines) {
                    out.push_str(&controls);
                    out.push('\n');
                }
            } else {
                out.push_str(&format!("[Iframe: {count} unchanged]\n"));
            }
        }
    }
    out
}

/// Planner-readable pointer to the main page's interactive elements, used
/// when the outer section is summarized away.
fn key_controls(lines: &[String]) -> Option<String> {
    let mut entries = Vec::new();
    for line in lines {
        if !line.starts_with("[*") {
            continue;
        }
        let Some(sel) = quoted_field(line, "sel=\"") else {
            continue;
        };
        let label = label_after_selector(line)
            .or_else(|| quoted_field(line, "aria=\""))
            .unwrap_or_else(|| "control".to_string());
        entries.push(format!("\"{label}\" sel=\"{sel}\""));
        if entries.len() >= KEY_CONTROLS_CAP {
            break;
        }
    }
    if entries.is_empty() {
        None
    } else {
        Some(format!("Key controls: {}", entries.join(" | ")))
    }
}

fn quoted_field(line: &str, prefix: &str) -> Option<String> {
    let start = line.find(prefix)? + prefix.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// The first bare quoted string after the selector field is the element's
/// visible text.
fn label_after_selector(line: &str) -> Option<String> {
    let sel_start = line.find("sel=\"")? + 5;
    let sel_end = sel_start + line[sel_start..].find('"')?;
    let rest = &line[sel_end + 1..];
    let open = rest.find(" \"")? + 2;
    let close = open + rest[open..].find('"')?;
    Some(rest[open..close].to_string())
}
