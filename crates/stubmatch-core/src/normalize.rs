//! Canonical line-oriented rendering of bodies for diffing
//!
//! JSON is re-serialized with 2-space indentation and sorted keys; XML is
//! re-serialized with 2-space indentation, then every line is trimmed and
//! blanks are dropped. Anything that fails to parse falls back to its raw
//! lines (trimmed, blanks dropped).

use crate::body::BodyType;
use crate::xml;

/// Render `text` as canonical lines for the given body type.
#[must_use]
pub fn pretty_lines(text: &str, body_type: BodyType) -> Vec<String> {
    let rendered = match body_type {
        BodyType::Json => pretty_json(text),
        BodyType::Xml => pretty_xml(text),
        BodyType::Text => None,
    };

    match rendered {
        Some(lines) => lines,
        None => raw_lines(text),
    }
}

/// [`pretty_lines`] joined with newlines.
#[must_use]
pub fn pretty_print(text: &str, body_type: BodyType) -> String {
    pretty_lines(text, body_type).join("\n")
}

fn pretty_json(text: &str) -> Option<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let pretty = serde_json::to_string_pretty(&value).ok()?;
    Some(pretty.lines().map(str::to_string).collect())
}

fn pretty_xml(text: &str) -> Option<Vec<String>> {
    let doc = xml::parse(text.trim()).ok()?;
    let pretty = xml::render_pretty(doc.root_element());
    Some(trimmed_non_blank(&pretty))
}

fn raw_lines(text: &str) -> Vec<String> {
    trimmed_non_blank(text)
}

fn trimmed_non_blank(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
