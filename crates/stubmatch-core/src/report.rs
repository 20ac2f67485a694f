//! Side-by-side mismatch report
//!
//! Renders why a request did not match its closest stub:
//!
//! ```text
//!                                               Request was not matched
//!                                               ======================
//!
//! -----------------------------------------------------------------------...
//! | Closest stub                                            | Request     ...
//! -----------------------------------------------------------------------...
//! | POST                                                    | POST        ...
//! | [path] orders                                           | orders      ...
//! | X-Key [contains] : abc                                  | -           ... <<<<< Header missing |
//! -----------------------------------------------------------------------...
//!
//! Body does not match
//! -----------------------------------------------------------------------...
//! [equalToJson]
//! {                                                          | {
//!   "id": 1                                                  |   "id": 2          <<<<< Body does not match
//! }                                                          | }
//! ```
//!
//! Output is deterministic: same input, same lines.

use crate::body::BodyType;
use crate::compare::bodies_equal;
use crate::normalize::pretty_lines;
use crate::stub::KeyValue;

/// Width of each column in the method/path/header table
const TABLE_COL: usize = 55;

/// Width of each column in a body diff block
const BODY_COL: usize = 58;

/// Width of a horizontal rule (two body columns plus separator)
const RULE_WIDTH: usize = BODY_COL * 2 + 3;

const BANNER: &str = "Request was not matched";
const BODY_MARKER: &str = "<<<<< Body does not match";

/// One expected header that the request did not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDiff {
    pub key: String,
    pub expected: String,
    /// Value the request carried, `None` when the header was absent
    pub actual: Option<String>,
}

impl HeaderDiff {
    /// Two-column rendering with a trailing reason marker.
    #[must_use]
    pub fn render(&self) -> String {
        let left = format!("{} [contains] : {}", self.key, self.expected);
        match &self.actual {
            None => format!(
                "{left:<TABLE_COL$} | {:<TABLE_COL$} <<<<< Header missing",
                "-"
            ),
            Some(actual) => format!(
                "{left:<TABLE_COL$} | {:<TABLE_COL$} <<<<< Header does not match",
                format!("{}: {actual}", self.key)
            ),
        }
    }
}

/// Compare actual headers with the expected list.
///
/// Keys are looked up case-insensitively (first occurrence wins); values
/// must match exactly. Headers that match produce no entry.
#[must_use]
pub fn compare_headers(actual: &[(String, String)], expected: &[KeyValue]) -> Vec<HeaderDiff> {
    expected
        .iter()
        .filter_map(|want| {
            let found = actual
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&want.key))
                .map(|(_, v)| v);
            match found {
                Some(value) if *value == want.value => None,
                other => Some(HeaderDiff {
                    key: want.key.clone(),
                    expected: want.value.clone(),
                    actual: other.cloned(),
                }),
            }
        })
        .collect()
}

/// Everything the report needs about the closest stub and the request.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub expected_method: &'a str,
    pub expected_path: &'a str,
    pub actual_method: &'a str,
    pub actual_path: &'a str,
    pub header_diffs: &'a [HeaderDiff],
    /// Request template of the stub, if any
    pub expected_body: Option<&'a str>,
    pub actual_body: &'a str,
}

/// Rendered report, one entry per output line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MismatchReport {
    lines: Vec<String>,
}

impl MismatchReport {
    /// Build the report for a request that failed content validation.
    ///
    /// The body block is emitted only when a non-blank template exists and
    /// the actual body is not equivalent to it.
    #[must_use]
    pub fn build(input: &ReportInput<'_>) -> Self {
        let rule = "-".repeat(RULE_WIDTH);
        let mut lines = vec![
            format!("{BANNER:>69}"),
            format!("{:>68}", "=".repeat(22)),
            String::new(),
            rule.clone(),
            table_row("Closest stub", "Request"),
            rule.clone(),
            table_row(input.expected_method, input.actual_method),
            table_row(
                &format!("[path] {}", input.expected_path),
                input.actual_path,
            ),
        ];

        lines.extend(
            input
                .header_diffs
                .iter()
                .map(|d| format!("| {} |", d.render())),
        );
        lines.push(rule.clone());

        if let Some(template) = input.expected_body.filter(|t| !t.trim().is_empty()) {
            if !bodies_equal(template, input.actual_body) {
                lines.push(String::new());
                lines.push("Body does not match".to_string());
                lines.push(rule);
                body_block(template, input.actual_body, &mut lines);
            }
        }

        Self { lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl std::fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn table_row(left: &str, right: &str) -> String {
    format!("| {left:<TABLE_COL$} | {right:<TABLE_COL$} |")
}

fn body_block(expected: &str, actual: &str, lines: &mut Vec<String>) {
    let expected_type = BodyType::classify(expected);
    let actual_type = if actual.trim().is_empty() {
        expected_type
    } else {
        BodyType::classify(actual)
    };

    let left = pretty_lines(expected, expected_type);
    let right = pretty_lines(actual, actual_type);

    if expected_type == actual_type {
        lines.push(format!("[equalTo{}]", expected_type.label()));
        for (exp, act) in paired(&left, &right) {
            let row = format!("{exp:<BODY_COL$} | {act:<BODY_COL$}");
            if exp.trim() == act.trim() {
                lines.push(row.trim_end().to_string());
            } else {
                lines.push(format!("{row}   {BODY_MARKER}"));
            }
        }
    } else {
        let heading = format!("[equalTo{}]", expected_type.tag());
        lines.push(format!("{heading:<BODY_COL$}| [actual{}]", actual_type.tag()));
        for (exp, act) in paired(&left, &right) {
            let row = format!("{exp:<BODY_COL$} | {act:<BODY_COL$}");
            lines.push(row.trim_end().to_string());
        }
        lines.push(format!("{BODY_MARKER:>RULE_WIDTH$}"));
    }
}

/// Zip two line lists, padding the shorter one with empty lines.
fn paired<'a>(left: &'a [String], right: &'a [String]) -> impl Iterator<Item = (&'a str, &'a str)> {
    let len = left.len().max(right.len());
    (0..len).map(move |i| {
        (
            left.get(i).map_or("", String::as_str),
            right.get(i).map_or("", String::as_str),
        )
    })
}
