//! Format-aware body equivalence
//!
//! Every parse or comparison failure is absorbed here and reported as
//! "not equal" / "not well-formed". Nothing in this module returns a parser
//! error to its caller.

use roxmltree::Node;

use crate::body::BodyType;
use crate::xml::{self, Child};

/// Compare a stub's request template with an actual request body.
///
/// - both JSON → structural tree equality (object key order ignored)
/// - both XML → namespace-aware DOM equality (whitespace, comments,
///   attribute order ignored)
/// - otherwise → trimmed text equality
///
/// Malformed JSON/XML never equals anything, itself included.
#[must_use]
pub fn bodies_equal(template: &str, actual: &str) -> bool {
    let expected = template.trim();
    let actual = actual.trim();

    match (BodyType::classify(expected), BodyType::classify(actual)) {
        (BodyType::Json, BodyType::Json) => json_equal(expected, actual),
        (BodyType::Xml, BodyType::Xml) => xml_equal(expected, actual),
        _ => expected == actual,
    }
}

/// Structural JSON equality; `false` if either side fails to parse.
#[must_use]
pub fn json_equal(expected: &str, actual: &str) -> bool {
    let parsed = (
        serde_json::from_str::<serde_json::Value>(expected),
        serde_json::from_str::<serde_json::Value>(actual),
    );
    match parsed {
        (Ok(e), Ok(a)) => e == a,
        _ => false,
    }
}

/// Deep XML equality; `false` if either side fails to parse.
#[must_use]
pub fn xml_equal(expected: &str, actual: &str) -> bool {
    let (Ok(e), Ok(a)) = (xml::parse(expected), xml::parse(actual)) else {
        return false;
    };
    elements_equal(e.root_element(), a.root_element())
}

fn elements_equal(a: Node<'_, '_>, b: Node<'_, '_>) -> bool {
    if a.tag_name().namespace() != b.tag_name().namespace()
        || a.tag_name().name() != b.tag_name().name()
    {
        return false;
    }

    if sorted_attributes(a) != sorted_attributes(b) {
        return false;
    }

    let left = xml::significant_children(a);
    let right = xml::significant_children(b);
    left.len() == right.len()
        && left.iter().zip(&right).all(|pair| match pair {
            (Child::Element(x), Child::Element(y)) => elements_equal(*x, *y),
            (Child::Text(x), Child::Text(y)) => x == y,
            _ => false,
        })
}

fn sorted_attributes<'a>(node: Node<'a, '_>) -> Vec<(Option<&'a str>, &'a str, &'a str)> {
    let mut attrs: Vec<_> = node
        .attributes()
        .map(|a| (a.namespace(), a.name(), a.value()))
        .collect();
    attrs.sort_unstable();
    attrs
}

/// The actual body did not parse as the format its template implies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request body is not well-formed {expected}")]
pub struct MalformedBody {
    pub expected: BodyType,
}

/// Check that `actual` parses as the type detected from `template`.
///
/// Blank templates and blank bodies always pass: a missing body is a
/// content mismatch, not a format error.
///
/// # Errors
///
/// Returns [`MalformedBody`] if a JSON/XML template is paired with a body
/// that does not parse as that format.
pub fn validate_well_formed(actual: &str, template: &str) -> Result<(), MalformedBody> {
    if template.trim().is_empty() || actual.trim().is_empty() {
        return Ok(());
    }

    let expected = BodyType::classify(template);
    let ok = match expected {
        BodyType::Json => serde_json::from_str::<serde_json::Value>(actual).is_ok(),
        BodyType::Xml => xml::parse(actual.trim()).is_ok(),
        BodyType::Text => true,
    };

    if ok {
        Ok(())
    } else {
        Err(MalformedBody { expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn json_key_order_ignored() {
        assert!(bodies_equal(
            r#"{"a":1,"b":[1,2]}"#,
            r#"{ "b": [1, 2], "a": 1 }"#
        ));
    }

    #[test]
    fn json_array_order_matters() {
        assert!(!bodies_equal(r#"{"a":[1,2]}"#, r#"{"a":[2,1]}"#));
    }

    #[test]
    fn json_value_difference_detected() {
        assert!(!bodies_equal(r#"{"id":1}"#, r#"{"id":2}"#));
    }

    #[test]
    fn malformed_json_never_equal() {
        assert!(!bodies_equal(r#"{"id":"#, r#"{"id":"#));
        assert!(!bodies_equal(r#"{"id":1}"#, r#"{"id":1"#));
    }

    #[test]
    fn xml_whitespace_and_comments_ignored() {
        let a = "<order><id>1</id><item sku=\"x\" qty=\"2\"/></order>";
        let b = concat!(
            "<order>\n  <!-- the id -->\n  <id> 1 </id>\n",
            "  <item qty=\"2\" sku=\"x\"></item>\n</order>"
        );
        assert!(bodies_equal(a, b));
    }

    #[test]
    fn xml_namespace_prefix_irrelevant_but_uri_matters() {
        let a = r#"<a:ping xmlns:a="urn:svc"/>"#;
        let b = r#"<b:ping xmlns:b="urn:svc"/>"#;
        let c = r#"<b:ping xmlns:b="urn:other"/>"#;
        assert!(bodies_equal(a, b));
        assert!(!bodies_equal(a, c));
    }

    #[test]
    fn xml_child_order_matters() {
        assert!(!bodies_equal("<a><b/><c/></a>", "<a><c/><b/></a>"));
    }

    #[test]
    fn xml_text_difference_detected() {
        assert!(!bodies_equal("<a>1</a>", "<a>2</a>"));
    }

    #[test]
    fn malformed_xml_never_equal() {
        assert!(!bodies_equal("<a>", "<a>"));
    }

    #[test]
    fn text_compared_trimmed() {
        assert!(bodies_equal("  hello\n", "hello"));
        assert!(!bodies_equal("hello", "Hello"));
    }

    #[test]
    fn mixed_types_never_equal() {
        assert!(!bodies_equal(r#"{"a":1}"#, "<a>1</a>"));
    }

    #[test]
    fn well_formed_follows_template_type() {
        assert!(validate_well_formed(r#"{"id":2}"#, r#"{"id":1}"#).is_ok());
        assert_eq!(
            validate_well_formed("not json", r#"{"id":1}"#),
            Err(MalformedBody {
                expected: BodyType::Json
            })
        );
        assert!(validate_well_formed("<a>", "<a/>").is_err());
        assert!(validate_well_formed("anything", "plain").is_ok());
    }

    #[test]
    fn well_formed_passes_blank_sides() {
        assert!(validate_well_formed("", r#"{"id":1}"#).is_ok());
        assert!(validate_well_formed("{oops", "").is_ok());
    }

    fn json_object(entries: &[(String, i64)]) -> String {
        let body: Vec<String> = entries
            .iter()
            .map(|(k, v)| format!("\"{k}\":{v}"))
            .collect();
        format!("{{{}}}", body.join(","))
    }

    proptest! {
        #[test]
        fn json_equality_is_order_independent(
            map in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8)
        ) {
            let forward: Vec<(String, i64)> = map.clone().into_iter().collect();
            let mut reversed = forward.clone();
            reversed.reverse();
            prop_assert!(bodies_equal(&json_object(&forward), &json_object(&reversed)));
        }

        #[test]
        fn xml_equality_ignores_formatting(
            children in proptest::collection::vec(("[a-w][a-z]{0,5}", "[a-z0-9]{1,6}"), 0..6),
            attr in "[a-z0-9]{0,4}",
        ) {
            let compact: String = children
                .iter()
                .map(|(name, text)| format!("<{name}>{text}</{name}>"))
                .collect();
            let spaced: String = children
                .iter()
                .map(|(name, text)| format!("\n  <!-- c -->\n  <{name}>  {text}\n  </{name}>"))
                .collect();
            let a = format!("<root id=\"{attr}\" kind=\"k\">{compact}</root>");
            let b = format!("<root kind=\"k\" id=\"{attr}\">{spaced}\n</root>");
            prop_assert!(bodies_equal(&a, &b));
        }

        #[test]
        fn comparator_fails_closed(tail in "[a-z:\"]{1,8}") {
            let json = format!("{{{tail}");
            let xml = format!("<{tail}");
            prop_assert!(
                !bodies_equal(&json, &json),
                "malformed json compared equal: {}",
                json
            );
            prop_assert!(
                !bodies_equal(&xml, &xml),
                "malformed xml compared equal: {}",
                xml
            );
            prop_assert!(
                validate_well_formed(&json, "{}").is_err(),
                "malformed json accepted: {}",
                json
            );
            prop_assert!(
                validate_well_formed(&xml, "<a/>").is_err(),
                "malformed xml accepted: {}",
                xml
            );
        }
    }
}
