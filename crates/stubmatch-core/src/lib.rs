//! stubmatch-core: Data model, body comparison and mismatch reporting for API stubs
//!
//! This crate holds everything about stub matching that does not depend on a
//! transport: stub definitions and their store, format-aware body
//! comparison, canonical pretty-printing, the side-by-side mismatch report,
//! the outcome taxonomy and the audit log.

pub mod audit;
pub mod body;
pub mod compare;
pub mod config;
pub mod normalize;
pub mod outcome;
pub mod report;
pub mod request;
pub mod schema;
pub mod store;
pub mod stub;
pub mod xml;

pub use audit::{
    AuditError, AuditSink, JsonlAuditLog, MatchStatus, MemoryAuditLog, NoopAuditLog, RequestLog,
};
pub use body::{BodyType, UnsupportedFormat};
pub use compare::{MalformedBody, bodies_equal, validate_well_formed};
pub use config::{ConfigError, CredentialSource, EngineConfig, WsSecurityCredentials};
pub use normalize::{pretty_lines, pretty_print};
pub use outcome::{ContentType, MatchedResponse, MismatchKind, Rejection, ValidationOutcome};
pub use report::{HeaderDiff, MismatchReport, ReportInput, compare_headers};
pub use request::{IncomingRequest, route_path};
pub use store::{StoreError, StubSource, StubStore};
pub use stub::{KeyValue, PayloadError, Protocol, StubDefinition};
