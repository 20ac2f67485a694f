//! XML tree helpers shared by comparison, normalization and SOAP extraction
//!
//! Documents are parsed namespace-aware with `roxmltree`. Comments and
//! processing instructions are dropped, adjacent text runs are merged and
//! trimmed, and whitespace-only text disappears.

use std::collections::BTreeSet;

use quick_xml::escape::escape;
use roxmltree::{Document, Node};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A child node that survives normalization.
#[derive(Debug, Clone)]
pub enum Child<'a, 'input> {
    Element(Node<'a, 'input>),
    /// Merged, trimmed, non-empty text
    Text(String),
}

/// Parse a document (DTDs rejected).
///
/// # Errors
///
/// Returns the parser error if the text is not well-formed XML.
pub fn parse(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    Document::parse(text)
}

/// Element and text children after normalization.
#[must_use]
pub fn significant_children<'a, 'input>(node: Node<'a, 'input>) -> Vec<Child<'a, 'input>> {
    let mut out = Vec::new();
    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            flush_text(&mut text, &mut out);
            out.push(Child::Element(child));
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }
    flush_text(&mut text, &mut out);
    out
}

fn flush_text(buf: &mut String, out: &mut Vec<Child<'_, '_>>) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        out.push(Child::Text(trimmed.to_string()));
    }
    buf.clear();
}

/// Concatenated text of all descendants, trimmed.
#[must_use]
pub fn text_content(node: Node<'_, '_>) -> String {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    text.trim().to_string()
}

/// First child element with the given local name, any namespace.
#[must_use]
pub fn child_by_local_name<'a, 'input>(
    node: Node<'a, 'input>,
    local: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == local)
}

/// Serialize an element subtree on a single line.
///
/// The element carries every namespace declaration its subtree needs, so it
/// can be re-parsed on its own.
#[must_use]
pub fn render_compact(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    write_element(node, 0, None, true, &mut out);
    out
}

/// Serialize an element subtree with 2-space indentation.
#[must_use]
pub fn render_pretty(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    write_element(node, 0, Some("  "), true, &mut out);
    out
}

fn write_element(
    node: Node<'_, '_>,
    depth: usize,
    indent: Option<&str>,
    fragment_root: bool,
    out: &mut String,
) {
    let name = element_name(node);
    pad(out, depth, indent);
    out.push('<');
    out.push_str(&name);

    for (prefix, uri) in declarations(node, fragment_root) {
        match prefix {
            Some(p) => out.push_str(&format!(" xmlns:{p}=\"{}\"", escape(uri.as_str()))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape(uri.as_str()))),
        }
    }

    let mut attrs: Vec<(String, &str)> = node
        .attributes()
        .map(|a| (attribute_name(node, a.namespace(), a.name()), a.value()))
        .collect();
    attrs.sort();
    for (attr_name, value) in attrs {
        out.push_str(&format!(" {attr_name}=\"{}\"", escape(value)));
    }

    let children = significant_children(node);
    match children.as_slice() {
        [] => out.push_str("/>"),
        [Child::Text(text)] => {
            out.push('>');
            out.push_str(&escape(text.as_str()));
            out.push_str(&format!("</{name}>"));
        }
        _ => {
            out.push('>');
            for child in &children {
                newline(out, indent);
                match child {
                    Child::Element(el) => write_element(*el, depth + 1, indent, false, out),
                    Child::Text(text) => {
                        pad(out, depth + 1, indent);
                        out.push_str(&escape(text.as_str()));
                    }
                }
            }
            newline(out, indent);
            pad(out, depth, indent);
            out.push_str(&format!("</{name}>"));
        }
    }
}

fn pad(out: &mut String, depth: usize, indent: Option<&str>) {
    if let Some(unit) = indent {
        out.push_str(&unit.repeat(depth));
    }
}

fn newline(out: &mut String, indent: Option<&str>) {
    if indent.is_some() {
        out.push('\n');
    }
}

fn element_name(node: Node<'_, '_>) -> String {
    let local = node.tag_name().name();
    match node.tag_name().namespace() {
        Some(uri) => match element_prefix(node, uri) {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        },
        None => local.to_string(),
    }
}

/// Prefix bound to `uri`; `None` when the default namespace covers it.
fn element_prefix(node: Node<'_, '_>, uri: &str) -> Option<String> {
    let mut prefixed = None;
    for ns in node.namespaces() {
        if ns.uri() != uri {
            continue;
        }
        match ns.name() {
            None => return None,
            Some(p) if prefixed.is_none() => prefixed = Some(p.to_string()),
            Some(_) => {}
        }
    }
    prefixed
}

fn attribute_name(node: Node<'_, '_>, namespace: Option<&str>, local: &str) -> String {
    let Some(uri) = namespace else {
        return local.to_string();
    };
    if uri == XML_NS {
        return format!("xml:{local}");
    }
    let prefix = node
        .namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name());
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

/// Namespace declarations to emit on `node`, sorted by prefix.
///
/// A fragment root declares every in-scope namespace its subtree uses;
/// nested elements declare only what their parent did not.
fn declarations(node: Node<'_, '_>, fragment_root: bool) -> Vec<(Option<String>, String)> {
    let own = in_scope(node);
    let selected: BTreeSet<(Option<String>, String)> = if fragment_root {
        let used = used_namespaces(node);
        own.into_iter()
            .filter(|(_, uri)| used.contains(uri))
            .collect()
    } else {
        let inherited = node
            .parent_element()
            .map(in_scope)
            .unwrap_or_default();
        own.difference(&inherited).cloned().collect()
    };
    selected.into_iter().collect()
}

fn in_scope(node: Node<'_, '_>) -> BTreeSet<(Option<String>, String)> {
    node.namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect()
}

fn used_namespaces(node: Node<'_, '_>) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    for el in node.descendants().filter(|n| n.is_element()) {
        if let Some(uri) = el.tag_name().namespace() {
            used.insert(uri.to_string());
        }
        for attr in el.attributes() {
            if let Some(uri) = attr.namespace() {
                used.insert(uri.to_string());
            }
        }
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_drop_comments_and_blank_text() {
        let doc = parse("<a>\n  <!-- note -->\n  <b/>\n  hello <!-- x --> world\n</a>").unwrap();
        let children = significant_children(doc.root_element());
        assert_eq!(children.len(), 2);
        assert!(matches!(children[0], Child::Element(_)));
        match &children[1] {
            Child::Text(t) => assert_eq!(t, "hello  world"),
            Child::Element(_) => panic!("expected text"),
        }
    }

    #[test]
    fn compact_render_keeps_used_namespaces_only() {
        let doc = parse(
            r#"<s:Envelope xmlns:s="urn:env" xmlns:m="urn:msg"><s:Body><m:ping id="1">x</m:ping></s:Body></s:Envelope>"#,
        )
        .unwrap();
        let body = child_by_local_name(doc.root_element(), "Body").unwrap();
        let payload = body.first_element_child().unwrap();
        assert_eq!(
            render_compact(payload),
            r#"<m:ping xmlns:m="urn:msg" id="1">x</m:ping>"#
        );
    }

    #[test]
    fn pretty_render_indents_nested_elements() {
        let doc = parse("<a><b>1</b><c><d/></c></a>").unwrap();
        assert_eq!(
            render_pretty(doc.root_element()),
            "<a>\n  <b>1</b>\n  <c>\n    <d/>\n  </c>\n</a>"
        );
    }

    #[test]
    fn attributes_are_sorted_and_escaped() {
        let doc = parse(r#"<a z="2" b="&lt;&amp;"/>"#).unwrap();
        assert_eq!(
            render_compact(doc.root_element()),
            r#"<a b="&lt;&amp;" z="2"/>"#
        );
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let doc = parse("<t> <u>admin</u><p>secret</p> </t>").unwrap();
        assert_eq!(text_content(doc.root_element()), "adminsecret");
    }

    #[test]
    fn default_namespace_is_declared_without_prefix() {
        let doc = parse(r#"<a xmlns="urn:x"><b/></a>"#).unwrap();
        assert_eq!(
            render_compact(doc.root_element()),
            r#"<a xmlns="urn:x"><b/></a>"#
        );
    }
}
