//! stubmatch-engine: Stub resolution with SOAP envelope and WS-Security handling

pub mod resolver;
pub mod soap;

pub use resolver::StubResolver;
pub use soap::{
    SOAP_ENV_NS, SoapContext, SoapEnvelopeProcessor, SoapError, build_fault, wrap_response,
};
