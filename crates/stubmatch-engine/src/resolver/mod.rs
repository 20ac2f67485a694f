//! Stub resolution state machine
//!
//! ```text
//! lookup ─► query ─► cookies ─► format ─► [SOAP unwrap] ─► content ─► matched
//!   │         │         │          │            │              │
//!  404       400       400        400      fault 400/500    400 (+fault for SOAP)
//! ```
//!
//! Lookup is a linear scan over one snapshot of the stub list: first stub
//! whose method and path equal the request's (case-insensitive) wins. There
//! is no ranking and no wildcard matching.

mod checks;
mod shape;

use std::sync::Arc;

use tracing::{debug, info, warn};

use stubmatch_core::{
    AuditSink, CredentialSource, EngineConfig, IncomingRequest, MismatchKind, NoopAuditLog,
    Rejection, StubDefinition, StubSource, ValidationOutcome,
};

use crate::soap::SoapEnvelopeProcessor;

use checks::{ContentInput, check_content, check_cookies, check_format, check_query};
use shape::ResponseShape;

/// Resolves requests against the configured stubs.
pub struct StubResolver {
    config: EngineConfig,
    stubs: Arc<dyn StubSource>,
    audit: Arc<dyn AuditSink>,
    credentials: Arc<dyn CredentialSource>,
}

impl std::fmt::Debug for StubResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StubResolver {
    /// Resolver without auditing; WS-Security credentials come from `config`.
    #[must_use]
    pub fn new(config: EngineConfig, stubs: Arc<dyn StubSource>) -> Self {
        let credentials: Arc<dyn CredentialSource> = Arc::new(config.clone());
        Self {
            config,
            stubs,
            audit: Arc::new(NoopAuditLog),
            credentials,
        }
    }

    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve one request. The outcome is recorded with the audit sink
    /// before it is returned.
    pub fn resolve(&self, request: &IncomingRequest) -> ValidationOutcome {
        let route = request.route_path(&self.config.mount_prefix);
        info!(method = request.method(), path = %route, "request received");

        let stubs = self.stubs.find_all();
        let outcome = match stubs
            .iter()
            .find(|stub| stub.matches_route(request.method(), &route))
        {
            Some(stub) => self.validate(request, &route, stub),
            None => ValidationOutcome::Unmatched(Rejection::new(
                MismatchKind::NotConfigured,
                format!("No matching API found for {} {route}", request.method()),
            )),
        };

        self.report(request, &route, &outcome);
        outcome
    }

    fn validate(
        &self,
        request: &IncomingRequest,
        route: &str,
        stub: &StubDefinition,
    ) -> ValidationOutcome {
        debug!(stub = %stub.label(), "candidate stub");
        let shape = ResponseShape::of(stub);

        let precheck = check_query(request, stub)
            .and_then(|()| check_cookies(request, stub))
            .and_then(|()| check_format(request.body(), stub));
        if let Err(rejection) = precheck {
            return ValidationOutcome::Unmatched(rejection.with_stub(stub.clone()));
        }

        let mut headers = request.headers().to_vec();
        let mut body = request.body().to_string();
        let mut soap_headers = None;

        if shape == ResponseShape::Soap && stub.request_template().is_some() {
            let processor = SoapEnvelopeProcessor::new(
                self.credentials.ws_security(),
                self.config.require_ws_security,
            );
            match processor.unwrap(request.body()) {
                Ok(ctx) => {
                    headers = ctx
                        .headers
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .chain(headers)
                        .collect();
                    body = ctx.body;
                    soap_headers = Some(ctx.headers);
                }
                Err(err) => {
                    return ValidationOutcome::Unmatched(ResponseShape::envelope_error(stub, &err));
                }
            }
        }

        let input = ContentInput {
            stub,
            method: request.method(),
            route,
            headers: &headers,
            body: &body,
        };
        if let Some(report) = check_content(&input) {
            return ValidationOutcome::Unmatched(shape.content_mismatch(stub, report));
        }

        if shape == ResponseShape::Soap && soap_headers.is_none() {
            soap_headers = Some(Default::default());
        }
        ValidationOutcome::Matched(shape.matched(stub, soap_headers))
    }

    fn report(&self, request: &IncomingRequest, route: &str, outcome: &ValidationOutcome) {
        let recorded = match outcome {
            ValidationOutcome::Matched(m) => {
                info!(
                    method = request.method(),
                    path = %route,
                    stub = %m.stub.label(),
                    status = m.status,
                    "request matched"
                );
                self.audit.log_matched(request, &m.stub, &m.body, m.status)
            }
            ValidationOutcome::Unmatched(r) => {
                warn!(
                    method = request.method(),
                    path = %route,
                    reason = r.reason(),
                    status = r.status,
                    "request not matched: {}",
                    r.message
                );
                let diagnostic = r.diagnostic();
                self.audit.log_unmatched(
                    request,
                    r.stub.as_ref(),
                    r.reason(),
                    Some(&diagnostic),
                    r.status,
                )
            }
        };

        if let Err(e) = recorded {
            warn!(error = %e, "failed to record audit entry");
        }
    }
}
