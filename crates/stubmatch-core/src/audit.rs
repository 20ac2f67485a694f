//! Request audit log
//!
//! One [`RequestLog`] is recorded per resolved request, matched or not.
//! Sinks: [`MemoryAuditLog`] keeps entries for inspection, [`JsonlAuditLog`]
//! appends one JSON object per line, with sensitive headers and
//! WS-Security passwords masked.

use std::collections::{BTreeMap, VecDeque};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::IncomingRequest;
use crate::stub::StubDefinition;

/// Headers that should be masked in audit files.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-auth-token",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

/// Mask value for redacted headers.
const MASK: &str = "***";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Matched,
    Unmatched,
}

/// A single audited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLog {
    /// Assigned by the sink, monotonically increasing from 1
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    /// Raw path with query string
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub request_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_name: Option<String>,
    pub match_status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_match_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    pub status_code: u16,
}

impl RequestLog {
    fn base(request: &IncomingRequest, stub: Option<&StubDefinition>, status_code: u16) -> Self {
        Self {
            id: 0,
            timestamp: Utc::now(),
            method: request.method().to_string(),
            url: request.url(),
            headers: request
                .headers()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            request_body: request.body().to_string(),
            expected_request_body: stub.and_then(|s| s.request_body.clone()),
            stub_id: stub.and_then(|s| s.id),
            stub_name: stub.map(StubDefinition::label),
            match_status: MatchStatus::Unmatched,
            reason: None,
            non_match_report: None,
            response_body: None,
            status_code,
        }
    }

    /// Entry for a request served by `stub`.
    #[must_use]
    pub fn matched(
        request: &IncomingRequest,
        stub: &StubDefinition,
        response_body: &str,
        status_code: u16,
    ) -> Self {
        Self {
            match_status: MatchStatus::Matched,
            response_body: Some(response_body.to_string()),
            ..Self::base(request, Some(stub), status_code)
        }
    }

    /// Entry for a rejected request.
    #[must_use]
    pub fn unmatched(
        request: &IncomingRequest,
        stub: Option<&StubDefinition>,
        reason: &str,
        report: Option<&str>,
        status_code: u16,
    ) -> Self {
        Self {
            reason: Some(reason.to_string()),
            non_match_report: report.map(str::to_string),
            ..Self::base(request, stub, status_code)
        }
    }

    /// Copy with sensitive header values and UsernameToken passwords in the
    /// request body replaced by `***`.
    #[must_use]
    pub fn masked(&self) -> Self {
        let mut out = self.clone();
        for (name, value) in &mut out.headers {
            if is_sensitive(name) {
                *value = MASK.to_string();
            }
        }
        out.request_body = mask_passwords(&out.request_body);
        out
    }
}

/// Replace the text of every `Password` element, whatever its prefix.
fn mask_passwords(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some((text_start, text_end)) = next_password(rest) {
        out.push_str(&rest[..text_start]);
        out.push_str(MASK);
        rest = &rest[text_end..];
    }
    out.push_str(rest);
    out
}

/// Byte range of the text inside the next `<Password>` or `<p:Password ...>`.
fn next_password(s: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(lt) = s[from..].find('<').map(|i| i + from) {
        let gt = lt + s[lt..].find('>')?;
        let tag = &s[lt + 1..gt];
        let name = tag
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        let local = name.rsplit(':').next().unwrap_or_default();
        if local == "Password" && !tag.ends_with('/') {
            let close = format!("</{name}>");
            let text_end = gt + 1 + s[gt + 1..].find(&close)?;
            return Some((gt + 1, text_end));
        }
        from = gt + 1;
    }
    None
}

fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name))
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Receiver of one record per resolved request.
pub trait AuditSink: Send + Sync {
    /// Store an entry. The sink assigns `id`.
    ///
    /// # Errors
    ///
    /// Returns error if the entry cannot be persisted.
    fn record(&self, entry: RequestLog) -> Result<(), AuditError>;

    /// Record a request served by `stub`.
    ///
    /// # Errors
    ///
    /// Same as [`AuditSink::record`].
    fn log_matched(
        &self,
        request: &IncomingRequest,
        stub: &StubDefinition,
        response_body: &str,
        status_code: u16,
    ) -> Result<(), AuditError> {
        self.record(RequestLog::matched(
            request,
            stub,
            response_body,
            status_code,
        ))
    }

    /// Record a rejected request.
    ///
    /// # Errors
    ///
    /// Same as [`AuditSink::record`].
    fn log_unmatched(
        &self,
        request: &IncomingRequest,
        stub: Option<&StubDefinition>,
        reason: &str,
        report: Option<&str>,
        status_code: u16,
    ) -> Result<(), AuditError> {
        self.record(RequestLog::unmatched(
            request,
            stub,
            reason,
            report,
            status_code,
        ))
    }
}

/// Sink that drops every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditLog;

impl AuditSink for NoopAuditLog {
    fn record(&self, _entry: RequestLog) -> Result<(), AuditError> {
        Ok(())
    }
}

/// In-memory audit log, unbounded unless built with [`MemoryAuditLog::with_capacity`].
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<VecDeque<RequestLog>>,
    next_id: AtomicU64,
    capacity: Option<usize>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` entries, dropping the oldest first.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// All entries, oldest first.
    pub fn list(&self) -> Vec<RequestLog> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<RequestLog> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, mut entry: RequestLog) -> Result<(), AuditError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entry.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        entries.push_back(entry);
        if let Some(capacity) = self.capacity {
            while entries.len() > capacity {
                entries.pop_front();
            }
        }
        Ok(())
    }
}

/// Append-only JSONL audit file.
///
/// Each entry is serialized and written under one lock, so concurrent
/// requests never interleave partial lines.
pub struct JsonlAuditLog {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    next_id: AtomicU64,
    mask_headers: bool,
}

impl std::fmt::Debug for JsonlAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlAuditLog")
            .field("next_id", &self.next_id)
            .field("mask_headers", &self.mask_headers)
            .finish_non_exhaustive()
    }
}

impl JsonlAuditLog {
    pub fn new(writer: Box<dyn Write + Send>, mask_headers: bool) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            next_id: AtomicU64::new(0),
            mask_headers,
        }
    }

    /// Open (or create) `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns error if the file or its parent directory cannot be created.
    pub fn open(path: &Path, mask_headers: bool) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuditError::Io(format!("create {}: {e}", parent.display())))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AuditError::Io(format!("open {}: {e}", path.display())))?;
        Ok(Self::new(Box::new(file), mask_headers))
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, mut entry: RequestLog) -> Result<(), AuditError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        entry.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let line = if self.mask_headers {
            serde_json::to_string(&entry.masked())
        } else {
            serde_json::to_string(&entry)
        }
        .map_err(|e| AuditError::Serialize(e.to_string()))?;

        let io = |e: std::io::Error| AuditError::Io(e.to_string());
        writer.write_all(line.as_bytes()).map_err(io)?;
        writer.write_all(b"\n").map_err(io)?;
        writer.flush().map_err(io)
    }
}
