//! Stub storage: copy-on-write snapshots under a single writer
//!
//! Readers take an `Arc<[StubDefinition]>` snapshot and keep it for the whole
//! request. Writers build a new list and swap it in, so a reader never sees
//! a half-applied mutation.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::stub::{PayloadError, StubDefinition};

/// Read side of the stub configuration, as seen by the resolver.
pub trait StubSource: Send + Sync {
    /// Immutable snapshot of every stub, in lookup order.
    fn find_all(&self) -> Arc<[StubDefinition]>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("stub '{stub}': {source}")]
    InvalidPayload {
        stub: String,
        #[source]
        source: PayloadError,
    },

    #[error("stub id {0} not found")]
    NotFound(u64),
}

/// In-memory stub store.
#[derive(Debug, Default)]
pub struct StubStore {
    snapshot: RwLock<Arc<[StubDefinition]>>,
    writer: Mutex<()>,
}

impl StubStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `stubs`, ids assigned where missing. Payloads are not
    /// validated; use [`StubStore::save`] or [`StubStore::load`] for that.
    pub fn with_stubs(stubs: Vec<StubDefinition>) -> Self {
        let store = Self::new();
        store.install(assign_ids(stubs));
        store
    }

    /// Load and validate a stub file (`.yaml`/`.yml` or `.json`).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or a stub payload
    /// does not match its declared format.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let stubs = read_stub_file(path)?;
        let store = Self::new();
        store.replace_all(stubs)?;
        info!(path = %path.display(), count = store.len(), "loaded stubs");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.find_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find_by_id(&self, id: u64) -> Option<StubDefinition> {
        self.find_all().iter().find(|s| s.id == Some(id)).cloned()
    }

    /// Insert or replace a stub, returning its id.
    ///
    /// A stub without an id (or with an unknown one) is appended; the next
    /// free id is assigned when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] if a payload does not parse as
    /// its declared format.
    pub fn save(&self, mut stub: StubDefinition) -> Result<u64, StoreError> {
        validate(&stub)?;
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut stubs = self.find_all().to_vec();
        let id = match stub.id {
            Some(id) => id,
            None => next_id(&stubs),
        };
        stub.id = Some(id);

        match stubs.iter_mut().find(|s| s.id == Some(id)) {
            Some(existing) => *existing = stub,
            None => stubs.push(stub),
        }
        self.install(stubs);
        debug!(id, "saved stub");
        Ok(id)
    }

    /// Remove a stub by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no stub has this id.
    pub fn delete(&self, id: u64) -> Result<StubDefinition, StoreError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut stubs = self.find_all().to_vec();
        let pos = stubs
            .iter()
            .position(|s| s.id == Some(id))
            .ok_or(StoreError::NotFound(id))?;
        let removed = stubs.remove(pos);
        self.install(stubs);
        debug!(id, "deleted stub");
        Ok(removed)
    }

    pub fn clear(&self) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.install(Vec::new());
    }

    /// Replace the whole set atomically. Nothing changes if any stub is
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPayload`] for the first invalid stub.
    pub fn replace_all(&self, stubs: Vec<StubDefinition>) -> Result<(), StoreError> {
        for stub in &stubs {
            validate(stub)?;
        }
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.install(assign_ids(stubs));
        Ok(())
    }

    fn install(&self, stubs: Vec<StubDefinition>) {
        let next: Arc<[StubDefinition]> = stubs.into();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl StubSource for StubStore {
    fn find_all(&self) -> Arc<[StubDefinition]> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Parse a stub file by extension: YAML for `.yaml`/`.yml`, JSON otherwise.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn read_stub_file(path: &Path) -> Result<Vec<StubDefinition>, StoreError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;

    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    if is_yaml {
        serde_yml::from_str(&content).map_err(|e| StoreError::Parse(e.to_string()))
    } else {
        serde_json::from_str(&content).map_err(|e| StoreError::Parse(e.to_string()))
    }
}

fn validate(stub: &StubDefinition) -> Result<(), StoreError> {
    stub.validate_payloads()
        .map_err(|source| StoreError::InvalidPayload {
            stub: stub.label(),
            source,
        })
}

fn next_id(stubs: &[StubDefinition]) -> u64 {
    stubs
        .iter()
        .filter_map(|s| s.id)
        .max()
        .map_or(1, |max| max + 1)
}

fn assign_ids(mut stubs: Vec<StubDefinition>) -> Vec<StubDefinition> {
    let mut next = next_id(&stubs);
    for stub in &mut stubs {
        if stub.id.is_none() {
            stub.id = Some(next);
            next += 1;
        }
    }
    stubs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ping() -> StubDefinition {
        StubDefinition::new("GET", "ping").with_response(200, r#"{"ok":true}"#)
    }

    #[test]
    fn save_assigns_ids_and_upserts() {
        let store = StubStore::new();
        let a = store.save(ping()).unwrap();
        let b = store.save(ping().with_name("second")).unwrap();
        assert_eq!((a, b), (1, 2));

        let mut updated = ping().with_name("renamed");
        updated.id = Some(a);
        assert_eq!(store.save(updated).unwrap(), a);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_id(a).unwrap().name, "renamed");
    }

    #[test]
    fn snapshot_survives_later_mutation() {
        let store = StubStore::new();
        store.save(ping()).unwrap();
        let snapshot = store.find_all();
        store.clear();
        assert_eq!(snapshot.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn delete_unknown_id_fails() {
        let store = StubStore::with_stubs(vec![ping()]);
        assert!(matches!(store.delete(9), Err(StoreError::NotFound(9))));
        assert_eq!(store.delete(1).unwrap().path, "ping");
        assert!(store.is_empty());
    }

    #[test]
    fn invalid_payload_rejected_without_changes() {
        let store = StubStore::with_stubs(vec![ping()]);
        let mut bad = StubDefinition::new("POST", "x").with_request_body(r#"{"id":1}"#);
        bad.request_body = Some("{broken".into());

        let err = store.save(bad.clone()).unwrap_err();
        assert!(err.to_string().contains("requestBody is not valid JSON"));
        assert!(store.replace_all(vec![ping(), bad]).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "- method: GET\n  path: ping\n  responseBody: '{{\"ok\":true}}'\n- method: POST\n  path: echo\n  requestFormat: text\n  requestBody: hello"
        )
        .unwrap();

        let store = StubStore::load(file.path()).unwrap();
        let all = store.find_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, Some(1));
        assert_eq!(all[1].request_template(), Some("hello"));
    }

    #[test]
    fn load_json_file_with_bad_format_fails() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"method":"GET","path":"x","responseFormat":"csv","responseBody":"a,b"}}]"#
        )
        .unwrap();

        let err = StubStore::load(file.path()).unwrap_err();
        assert!(matches!(err, StoreError::Parse(ref m) if m.contains("Unsupported format")));
    }

    #[test]
    fn concurrent_readers_see_whole_sets() {
        let store = Arc::new(StubStore::new());
        std::thread::scope(|scope| {
            let writer = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..50 {
                    let set = vec![
                        ping().with_name(format!("a{i}")),
                        ping().with_name(format!("b{i}")),
                    ];
                    writer.replace_all(set).unwrap();
                }
            });
            for _ in 0..4 {
                let reader = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..200 {
                        let snapshot = reader.find_all();
                        assert!(snapshot.is_empty() || snapshot.len() == 2);
                    }
                });
            }
        });
    }
}
