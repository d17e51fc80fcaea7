//! Quiz oracle: decides when a page is an assessment, derives a stable key
//! for the current question, extracts its text, and flags image-dependent
//! items for the vision handoff.
//!
//! Everything here is a pure function over the Visual Page Map text plus
//! the URL/title, so the loop can call it every step without side effects.

use once_cell::sync::Lazy;
use regex::Regex;

use tabpilot_core_types::PageContext;
use tabpilot_page_probe::visual_map::IFRAME_MARKER;

/// Detector threshold: a score at or above this switches the loop into
/// quiz mode.
pub const DETECT_THRESHOLD: u32 = 4;

/// Map tokens with their weights. Presence-scored, not occurrence-scored.
const MAP_TOKENS: &[(&str, u32)] = &[
    ("lrn_assess", 3),
    ("mcq-input", 3),
    ("Quick Check", 2),
    ("INPUT[radio]", 1),
    ("INPUT[checkbox]", 1),
    ("Item ", 1),
    ("question", 1),
    ("[unchecked]", 1),
];

/// URL/title keywords, each worth 2.
const PAGE_KEYWORDS: &[&str] = &["quiz", "assessment", "test", "exam", "survey"];

static ITEMS_COUNTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s+of\s+\d+\s+Items").expect("counter pattern"));

static ELEMENT_GEOMETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\(-?\d+,-?\d+ (\d+)x(\d+)\)").expect("geometry pattern"));

/// Texts that are assessment chrome, not question content.
const CHROME_PREFIXES: &[&str] = &[
    "Next",
    "Submit",
    "Currently contains",
    "Select to move",
];

/// Score the page context against the quiz token table.
pub fn score(ctx: &PageContext) -> u32 {
    let mut total = 0;
    let lowered = ctx.visual_map.to_lowercase();
    for (token, weight) in MAP_TOKENS {
        // Class names and grammar markers are literal; "question" is prose.
        let hit = if *token == "question" {
            lowered.contains(token)
        } else {
            ctx.visual_map.contains(token)
        };
        if hit {
            total += weight;
        }
    }

    let haystack = format!("{} {}", ctx.url, ctx.title).to_lowercase();
    for keyword in PAGE_KEYWORDS {
        if haystack.contains(keyword) {
            total += 2;
        }
    }
    total
}

/// True when the detector score clears the threshold.
pub fn detect(ctx: &PageContext) -> bool {
    score(ctx) >= DETECT_THRESHOLD
}

/// The iframe section of a merged map, header included, if present.
pub fn iframe_section(map: &str) -> Option<&str> {
    let start = map.find(IFRAME_MARKER)?;
    let section = &map[start..];
    let header_end = section.find('\n').map(|i| i + 1).unwrap_or(section.len());
    let body = &section[header_end..];
    match body.find("\n===") {
        Some(end) => Some(&section[..header_end + end]),
        None => Some(section),
    }
}

/// A key identifying the current quiz item that survives intra-item state
/// changes (tile placements, checks). Prefers the `N of M Items` counter;
/// falls back to the head of the iframe section.
pub fn stable_question_key(map: &str) -> Option<String> {
    if let Some(m) = ITEMS_COUNTER.find(map) {
        return Some(m.as_str().to_string());
    }
    let section = iframe_section(map)?;
    Some(section.chars().take(80).collect())
}

/// The question's labelled texts: first 15 meaningful labels of the iframe
/// section, pipe-joined, chrome dropped.
pub fn extract_question_text(map: &str) -> Option<String> {
    let section = iframe_section(map)?;
    let mut texts = Vec::new();
    for line in section.lines().filter(|l| l.starts_with('[')) {
        let Some(label) = element_label(line) else {
            continue;
        };
        let trimmed = label.trim();
        if trimmed.is_empty()
            || CHROME_PREFIXES.iter().any(|p| trimmed.starts_with(p))
            || ITEMS_COUNTER.is_match(trimmed)
        {
            continue;
        }
        texts.push(trimmed.to_string());
        if texts.len() >= 15 {
            break;
        }
    }
    if texts.is_empty() {
        None
    } else {
        Some(texts.join(" | "))
    }
}

/// True when the iframe carries image content the map cannot express: any
/// IMG of at least 50x50 with fewer than 10 characters of accompanying
/// text.
pub fn needs_vision(map: &str) -> bool {
    let Some(section) = iframe_section(map) else {
        return false;
    };
    section
        .lines()
        .filter(|l| l.starts_with("[IMG]") || l.starts_with("[*IMG]"))
        .any(|line| {
            let Some(caps) = ELEMENT_GEOMETRY.captures(line) else {
                return false;
            };
            let w: i64 = caps[1].parse().unwrap_or(0);
            let h: i64 = caps[2].parse().unwrap_or(0);
            let text_len = element_label(line).map(|t| t.chars().count()).unwrap_or(0);
            w >= 50 && h >= 50 && text_len < 10
        })
}

/// The visible-text field of one element line: the first bare quoted string
/// after the selector, falling back to the aria label.
fn element_label(line: &str) -> Option<String> {
    let sel_start = line.find("sel=\"")? + 5;
    let sel_end = sel_start + line[sel_start..].find('"')?;
    let rest = &line[sel_end + 1..];
    if let Some(open) = rest.find(" \"") {
        let open = open + 2;
        if let Some(len) = rest[open..].find('"') {
            return Some(rest[open..open + len].to_string());
        }
    }
    let aria_start = line.find("aria=\"")? + 6;
    let aria_end = aria_start + line[aria_start..].find('"')?;
    Some(line[aria_start..aria_end].to_string())
}
