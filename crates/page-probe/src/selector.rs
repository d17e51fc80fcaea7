//! CSS-subset selector engine.
//!
//! Covers exactly the surface the generator emits and the planner echoes
//! back: `tag`, `#id`, `.class`, `[attr]`, `[attr="value"]`,
//! `:nth-of-type(n)`, compounds of those, and child (`>`) / descendant
//! combinators.

use crate::dom::{Document, NodeId};
use crate::errors::ProbeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    Tag(String),
    Id(String),
    Class(String),
    AttrPresent(String),
    AttrEquals(String, String),
    NthOfType(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compound {
    pub parts: Vec<SimpleSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub first: Compound,
    pub rest: Vec<(Combinator, Compound)>,
}

/// Parse a selector string.
pub fn parse(input: &str) -> Result<Selector, ProbeError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ProbeError::BadRequest(format!(
            "empty selector: '{input}'"
        )));
    }

    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut expect_compound = true;
    for token in tokens {
        match token {
            Token::Combinator(c) => {
                if expect_compound {
                    return Err(ProbeError::BadRequest(format!(
                        "dangling combinator in '{input}'"
                    )));
                }
                combinators.push(c);
                expect_compound = true;
            }
            Token::Compound(text) => {
                // Adjacent compounds separated by whitespace only.
                if !expect_compound {
                    combinators.push(Combinator::Descendant);
                }
                compounds.push(parse_compound(&text)?);
                expect_compound = false;
            }
        }
    }
    if expect_compound {
        return Err(ProbeError::BadRequest(format!(
            "selector ends with a combinator: '{input}'"
        )));
    }

    let mut iter = compounds.into_iter();
    let first = iter.next().expect("at least one compound");
    let rest = combinators.into_iter().zip(iter).collect();
    Ok(Selector { first, rest })
}

enum Token {
    Compound(String),
    Combinator(Combinator),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ProbeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut in_quotes = false;
    let mut in_parens = false;

    for ch in input.chars() {
        match ch {
            '"' if in_brackets => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '[' if !in_quotes => {
                in_brackets = true;
                current.push(ch);
            }
            ']' if !in_quotes => {
                in_brackets = false;
                current.push(ch);
            }
            '(' if !in_quotes && !in_brackets => {
                in_parens = true;
                current.push(ch);
            }
            ')' if !in_quotes && !in_brackets => {
                in_parens = false;
                current.push(ch);
            }
            '>' if !in_quotes && !in_brackets && !in_parens => {
                if !current.trim().is_empty() {
                    tokens.push(Token::Compound(current.trim().to_string()));
                    current.clear();
                }
                tokens.push(Token::Combinator(Combinator::Child));
            }
            c if c.is_whitespace() && !in_quotes && !in_brackets && !in_parens => {
                if !current.is_empty() {
                    tokens.push(Token::Compound(current.clone()));
                    current.clear();
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes || in_brackets || in_parens {
        return Err(ProbeError::BadRequest(format!(
            "unterminated selector: '{input}'"
        )));
    }
    if !current.is_empty() {
        tokens.push(Token::Compound(current));
    }
    Ok(tokens)
}

fn parse_compound(input: &str) -> Result<Compound, ProbeError> {
    let mut parts = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '#' => {
                chars.next();
                parts.push(SimpleSelector::Id(take_ident(&mut chars)));
            }
            '.' => {
                chars.next();
                parts.push(SimpleSelector::Class(take_ident(&mut chars)));
            }
            '[' => {
                chars.next();
                let mut body = String::new();
                let mut quoted = false;
                for c in chars.by_ref() {
                    match c {
                        '"' => {
                            quoted = !quoted;
                            body.push(c);
                        }
                        ']' if !quoted => break,
                        c => body.push(c),
                    }
                }
                parts.push(parse_attr(&body, input)?);
            }
            ':' => {
                chars.next();
                let name = take_ident(&mut chars);
                if name != "nth-of-type" {
                    return Err(ProbeError::BadRequest(format!(
                        "unsupported pseudo-class ':{name}' in '{input}'"
                    )));
                }
                if chars.next() != Some('(') {
                    return Err(ProbeError::BadRequest(format!(
                        "expected '(' after nth-of-type in '{input}'"
                    )));
                }
                let mut digits = String::new();
                for c in chars.by_ref() {
                    if c == ')' {
                        break;
                    }
                    digits.push(c);
                }
                let n: usize = digits.trim().parse().map_err(|_| {
                    ProbeError::BadRequest(format!(
                        "bad nth-of-type argument '{digits}' in '{input}'"
                    ))
                })?;
                parts.push(SimpleSelector::NthOfType(n));
            }
            _ => {
                let tag = take_ident(&mut chars);
                if tag.is_empty() {
                    return Err(ProbeError::BadRequest(format!(
                        "unparseable selector fragment in '{input}'"
                    )));
                }
                parts.push(SimpleSelector::Tag(tag.to_lowercase()));
            }
        }
    }

    if parts.is_empty() {
        return Err(ProbeError::BadRequest(format!(
            "empty compound in '{input}'"
        )));
    }
    Ok(Compound { parts })
}

fn parse_attr(body: &str, whole: &str) -> Result<SimpleSelector, ProbeError> {
    match body.split_once('=') {
        Some((name, value)) => {
            let name = name.trim().to_string();
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            if name.is_empty() {
                return Err(ProbeError::BadRequest(format!(
                    "attribute selector missing name in '{whole}'"
                )));
            }
            Ok(SimpleSelector::AttrEquals(name, value.to_string()))
        }
        None => {
            let name = body.trim().to_string();
            if name.is_empty() {
                return Err(ProbeError::BadRequest(format!(
                    "empty attribute selector in '{whole}'"
                )));
            }
            Ok(SimpleSelector::AttrPresent(name))
        }
    }
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            ident.push(c);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

fn matches_compound(doc: &Document, id: NodeId, compound: &Compound) -> bool {
    let data = &doc.node(id).data;
    compound.parts.iter().all(|part| match part {
        SimpleSelector::Tag(tag) => data.tag.eq_ignore_ascii_case(tag),
        SimpleSelector::Id(want) => data.attrs.get("id").is_some_and(|v| v == want),
        SimpleSelector::Class(want) => data
            .attrs
            .get("class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == want)),
        SimpleSelector::AttrPresent(name) => data.attrs.contains_key(name),
        SimpleSelector::AttrEquals(name, want) => {
            data.attrs.get(name).is_some_and(|v| v == want)
        }
        SimpleSelector::NthOfType(n) => doc.nth_of_type(id) == *n,
    })
}

/// True when `id` matches the full selector chain.
pub fn matches(doc: &Document, id: NodeId, selector: &Selector) -> bool {
    let Some((_, last)) = selector
        .rest
        .last()
        .map(|(c, comp)| (*c, comp))
        .or(Some((Combinator::Descendant, &selector.first)))
    else {
        return false;
    };
    if !matches_compound(doc, id, last) {
        return false;
    }

    // Walk the chain right-to-left through ancestors.
    let mut chain: Vec<(Combinator, &Compound)> = Vec::with_capacity(selector.rest.len() + 1);
    chain.push((Combinator::Descendant, &selector.first));
    for (c, comp) in &selector.rest {
        chain.push((*c, comp));
    }

    fn ancestors_match(
        doc: &Document,
        node: NodeId,
        chain: &[(Combinator, &Compound)],
        idx: usize,
    ) -> bool {
        if idx == 0 {
            return true;
        }
        let (combinator_into_current, _) = chain[idx];
        let (_, parent_compound) = chain[idx - 1];
        match combinator_into_current {
            Combinator::Child => match doc.node(node).parent {
                Some(parent) => {
                    matches_compound(doc, parent, parent_compound)
                        && ancestors_match(doc, parent, chain, idx - 1)
                }
                None => false,
            },
            Combinator::Descendant => {
                let mut cursor = doc.node(node).parent;
                while let Some(ancestor) = cursor {
                    if matches_compound(doc, ancestor, parent_compound)
                        && ancestors_match(doc, ancestor, chain, idx - 1)
                    {
                        return true;
                    }
                    cursor = doc.node(ancestor).parent;
                }
                false
            }
        }
    }

    ancestors_match(doc, id, &chain, chain.len() - 1)
}

/// All matches in document order.
pub fn query_all(doc: &Document, selector: &Selector) -> Vec<NodeId> {
    doc.walk()
        .into_iter()
        .filter(|&id| matches(doc, id, selector))
        .collect()
}

/// Parse then match; convenience for callers holding selector strings.
pub fn query_all_str(doc: &Document, selector: &str) -> Result<Vec<NodeId>, ProbeError> {
    Ok(query_all(doc, &parse(selector)?))
}

/// First match, or a typed Not-Found error.
pub fn resolve(doc: &Document, selector: &str) -> Result<NodeId, ProbeError> {
    query_all_str(doc, selector)?
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::selector_not_found(selector))
}

/// Generate a selector that resolves to exactly `id` in this document.
///
/// Preference order: `#id`, a globally unique class, unique
/// `[aria-label="…"]`, `[data-testid="…"]`, unique `[name="…"]`, then an
/// `nth-of-type` path. The path starts at the nearest four ancestors and
/// grows toward the body until it is unique, so the capture-time uniqueness
/// invariant always holds.
pub fn selector_for(doc: &Document, id: NodeId) -> String {
    let data = &doc.node(id).data;

    if let Some(id_attr) = data.attrs.get("id") {
        if !id_attr.is_empty() && is_plain_ident(id_attr) {
            let candidate = format!("#{id_attr}");
            if resolves_uniquely_to(doc, &candidate, id) {
                return candidate;
            }
        }
    }

    if let Some(classes) = data.attrs.get("class") {
        for class in classes.split_whitespace() {
            if !is_plain_ident(class) {
                continue;
            }
            let candidate = format!(".{class}");
            if resolves_uniquely_to(doc, &candidate, id) {
                return candidate;
            }
        }
    }

    for attr in ["aria-label", "data-testid", "name"] {
        if let Some(value) = data.attrs.get(attr) {
            if value.is_empty() || value.contains('"') {
                continue;
            }
            let candidate = format!("[{attr}=\"{value}\"]");
            if resolves_uniquely_to(doc, &candidate, id) {
                return candidate;
            }
        }
    }

    nth_of_type_path(doc, id)
}

fn is_plain_ident(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        && !value.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn resolves_uniquely_to(doc: &Document, selector: &str, id: NodeId) -> bool {
    match query_all_str(doc, selector) {
        Ok(found) => found.len() == 1 && found[0] == id,
        Err(_) => false,
    }
}

fn nth_of_type_path(doc: &Document, id: NodeId) -> String {
    // Segments from the body's child down to the node itself.
    let mut chain = Vec::new();
    let mut cursor = Some(id);
    while let Some(node) = cursor {
        if node == doc.root() {
            break;
        }
        let data = &doc.node(node).data;
        chain.push(format!(
            "{}:nth-of-type({})",
            data.tag.to_lowercase(),
            doc.nth_of_type(node)
        ));
        cursor = doc.node(node).parent;
    }
    chain.reverse();

    if chain.is_empty() {
        return "body".to_string();
    }

    let max_suffix = chain.len().min(4);
    for take in 1..=max_suffix {
        let candidate = chain[chain.len() - take..].join(" > ");
        if resolves_uniquely_to(doc, &candidate, id) {
            return candidate;
        }
    }
    // Anchor at the body to force uniqueness.
    format!("body > {}", chain.join(" > "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, ElementSpec};

    fn sample() -> Document {
        let mut doc = Document::new("https://example.com", "Example", 800, 600);
        let root = doc.root();
        let form = doc.append(
            root,
            ElementSpec::new("form").attr("id", "login").rect(0.0, 0.0, 400.0, 200.0),
        );
        doc.append(
            form,
            ElementSpec::new("input")
                .attr("type", "text")
                .attr("name", "user")
                .rect(10.0, 10.0, 200.0, 24.0),
        );
        doc.append(
            form,
            ElementSpec::new("input")
                .attr("type", "password")
                .attr("name", "pass")
                .rect(10.0, 44.0, 200.0, 24.0),
        );
        let buttons = doc.append(form, ElementSpec::new("div").rect(10.0, 80.0, 380.0, 40.0));
        doc.append(
            buttons,
            ElementSpec::new("button")
                .attr("class", "btn primary")
                .rect(10.0, 80.0, 80.0, 30.0)
                .text("Sign in"),
        );
        doc.append(
            buttons,
            ElementSpec::new("button")
                .attr("class", "btn")
                .attr("aria-label", "Cancel sign in")
                .rect(100.0, 80.0, 80.0, 30.0)
                .text("Cancel"),
        );
        doc
    }

    #[test]
    fn id_selector_resolves() {
        let doc = sample();
        let found = query_all_str(&doc, "#login").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(doc.node(found[0]).data.tag, "FORM");
    }

    #[test]
    fn attribute_and_tag_compound() {
        let doc = sample();
        let found = query_all_str(&doc, "input[name=\"pass\"]").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            doc.node(found[0]).data.attrs.get("type").unwrap(),
            "password"
        );
    }

    #[test]
    fn child_combinator_restricts_depth() {
        let doc = sample();
        // Buttons are grandchildren of the form, not children.
        assert!(query_all_str(&doc, "form > button").unwrap().is_empty());
        assert_eq!(query_all_str(&doc, "form button").unwrap().len(), 2);
        assert_eq!(query_all_str(&doc, "form > div > button").unwrap().len(), 2);
    }

    #[test]
    fn nth_of_type_matches_position() {
        let doc = sample();
        let found = query_all_str(&doc, "button:nth-of-type(2)").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(doc.text_content(found[0]), "Cancel");
    }

    #[test]
    fn class_selector_matches_token_not_substring() {
        let doc = sample();
        assert_eq!(query_all_str(&doc, ".btn").unwrap().len(), 2);
        assert_eq!(query_all_str(&doc, ".primary").unwrap().len(), 1);
        assert!(query_all_str(&doc, ".prim").unwrap().is_empty());
    }

    #[test]
    fn generation_prefers_id_then_class_then_aria() {
        let doc = sample();
        let form = query_all_str(&doc, "form").unwrap()[0];
        assert_eq!(selector_for(&doc, form), "#login");

        let primary = query_all_str(&doc, ".primary").unwrap()[0];
        assert_eq!(selector_for(&doc, primary), ".primary");

        let cancel = query_all_str(&doc, "[aria-label=\"Cancel sign in\"]").unwrap()[0];
        assert_eq!(selector_for(&doc, cancel), "[aria-label=\"Cancel sign in\"]");
    }

    #[test]
    fn generation_falls_back_to_unique_nth_path() {
        let doc = sample();
        let user = query_all_str(&doc, "input[name=\"user\"]").unwrap()[0];
        // Unique via [name="user"], so no path needed.
        assert_eq!(selector_for(&doc, user), "[name=\"user\"]");

        // Strip distinguishing attributes to force the path fallback.
        let mut doc = sample();
        let inputs = query_all_str(&doc, "input").unwrap();
        for input in inputs {
            doc.node_mut(input).data.attrs.remove("name");
        }
        let first = query_all_str(&doc, "input").unwrap()[0];
        let generated = selector_for(&doc, first);
        let found = query_all_str(&doc, &generated).unwrap();
        assert_eq!(found, vec![first], "generated '{generated}' must be unique");
    }

    #[test]
    fn every_generated_selector_is_unique_at_capture() {
        let doc = sample();
        for id in doc.walk() {
            if id == doc.root() {
                continue;
            }
            let sel = selector_for(&doc, id);
            let found = query_all_str(&doc, &sel).unwrap();
            assert_eq!(found, vec![id], "selector '{sel}' is not unique");
        }
    }

    #[test]
    fn malformed_selectors_error() {
        let doc = sample();
        assert!(query_all_str(&doc, "div >").is_err());
        assert!(query_all_str(&doc, "[unclosed").is_err());
        assert!(query_all_str(&doc, "p:first-child").is_err());
    }
}
