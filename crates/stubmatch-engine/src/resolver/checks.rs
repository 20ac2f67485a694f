//! Request-side validation checks
//!
//! No I/O. Each check returns the rejection for its terminal state, or
//! `Ok(())` to continue.

use tracing::debug;

use stubmatch_core::{
    HeaderDiff, IncomingRequest, MismatchKind, MismatchReport, Rejection, ReportInput,
    StubDefinition, bodies_equal, compare_headers, validate_well_formed,
};

/// Every expected query key must be present with an equal first value.
pub(super) fn check_query(
    request: &IncomingRequest,
    stub: &StubDefinition,
) -> Result<(), Rejection> {
    let missing: Vec<String> = stub
        .expected_query()
        .into_iter()
        .filter(|want| request.query_first(&want.key) != Some(want.value.as_str()))
        .map(|want| want.key)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(Rejection::new(
        MismatchKind::QueryMismatch,
        format!(
            "Missing or invalid query parameters: {}",
            missing.join(", ")
        ),
    ))
}

/// Every expected cookie must be present with an equal value.
pub(super) fn check_cookies(
    request: &IncomingRequest,
    stub: &StubDefinition,
) -> Result<(), Rejection> {
    let missing: Vec<String> = stub
        .expected_cookies()
        .into_iter()
        .filter(|want| request.cookie(&want.key) != Some(want.value.as_str()))
        .map(|want| want.key)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(Rejection::new(
        MismatchKind::CookieMismatch,
        format!("Missing or invalid cookies: {}", missing.join(", ")),
    ))
}

/// The body must parse as the format of the stub's template.
pub(super) fn check_format(body: &str, stub: &StubDefinition) -> Result<(), Rejection> {
    let Some(template) = stub.request_template() else {
        debug!("no request template, format check skipped");
        return Ok(());
    };
    validate_well_formed(body, template).map_err(|e| {
        debug!(error = %e, "format check failed");
        Rejection::new(MismatchKind::FormatInvalid, "Request body format invalid")
    })
}

/// Headers and body as seen by the content check, after any SOAP unwrap.
pub(super) struct ContentInput<'a> {
    pub(super) stub: &'a StubDefinition,
    pub(super) method: &'a str,
    pub(super) route: &'a str,
    pub(super) headers: &'a [(String, String)],
    pub(super) body: &'a str,
}

/// Compare headers and body against the stub; `Some(report)` on mismatch.
pub(super) fn check_content(input: &ContentInput<'_>) -> Option<MismatchReport> {
    let stub = input.stub;
    let header_diffs: Vec<HeaderDiff> = compare_headers(input.headers, &stub.expected_headers());
    let template = stub.request_template();
    let body_matches = template.is_none_or(|t| bodies_equal(t, input.body));

    debug!(
        header_diffs = header_diffs.len(),
        has_template = template.is_some(),
        body_matches,
        "content check"
    );

    if body_matches && header_diffs.is_empty() {
        return None;
    }

    Some(MismatchReport::build(&ReportInput {
        expected_method: &stub.method,
        expected_path: &stub.path,
        actual_method: input.method,
        actual_path: input.route,
        header_diffs: &header_diffs,
        expected_body: template,
        actual_body: input.body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_lists_every_missing_key() {
        let stub = StubDefinition::new("GET", "x")
            .with_query_param("a", "1")
            .with_query_param("b", "2")
            .with_query_param("c", "3");
        let req = IncomingRequest::new("GET", "/x?a=1&b=9&b=2");

        let err = check_query(&req, &stub).unwrap_err();
        assert_eq!(err.kind, MismatchKind::QueryMismatch);
        assert_eq!(err.status, 400);
        assert_eq!(err.message, "Missing or invalid query parameters: b, c");
    }

    #[test]
    fn query_duplicates_last_expectation_wins() {
        let stub = StubDefinition::new("GET", "x")
            .with_query_param("a", "1")
            .with_query_param("a", "2");
        assert!(check_query(&IncomingRequest::new("GET", "/x?a=2"), &stub).is_ok());
    }

    #[test]
    fn cookies_checked_exactly() {
        let stub = StubDefinition::new("GET", "x").with_cookie("session", "abc");
        let ok = IncomingRequest::new("GET", "/x").with_cookie_header("session=abc");
        let bad = IncomingRequest::new("GET", "/x").with_cookie("session", "ABC");

        assert!(check_cookies(&ok, &stub).is_ok());
        let err = check_cookies(&bad, &stub).unwrap_err();
        assert_eq!(err.message, "Missing or invalid cookies: session");
    }

    #[test]
    fn format_follows_template() {
        let stub = StubDefinition::new("POST", "x").with_request_body(r#"{"id":1}"#);
        assert!(check_format(r#"{"id":5}"#, &stub).is_ok());
        let err = check_format("<id>5</id>", &stub).unwrap_err();
        assert_eq!(err.kind, MismatchKind::FormatInvalid);
        assert_eq!(err.message, "Request body format invalid");
        assert!(check_format("anything", &StubDefinition::new("POST", "x")).is_ok());
    }

    #[test]
    fn content_without_expectations_matches() {
        let stub = StubDefinition::new("GET", "x");
        let input = ContentInput {
            stub: &stub,
            method: "GET",
            route: "x",
            headers: &[],
            body: "ignored",
        };
        assert!(check_content(&input).is_none());
    }

    #[test]
    fn content_header_diff_produces_report() {
        let stub = StubDefinition::new("GET", "x").with_header("X-Key", "abc");
        let headers = vec![("x-key".to_string(), "nope".to_string())];
        let input = ContentInput {
            stub: &stub,
            method: "GET",
            route: "x",
            headers: &headers,
            body: "",
        };
        let report = check_content(&input).unwrap();
        assert!(report.render().contains("Header does not match"));
    }
}
