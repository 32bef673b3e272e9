//! Shared test doubles: a scripted task manager and an in-memory remote endpoint.

use crate::error::{Error, Result, TransferError};
use crate::task_manager::TaskSource;
use crate::transfer::{RemoteSession, SessionConnector};
use crate::types::{
    FileValidationStatus, OutputFile, Payload, TaskId, TaskSnapshot, TaskStatus, TaskTimestamp,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const TEST_TIMESTAMP: &str = "2022-04-27T10:10Z";

/// SUCCESS snapshot whose outputs are `TYPE_0`, `TYPE_1`, ... with the given statuses
pub(crate) fn snapshot(statuses: &[FileValidationStatus]) -> TaskSnapshot {
    let outputs: Vec<(String, FileValidationStatus)> = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| (format!("TYPE_{i}"), *status))
        .collect();
    let outputs: Vec<(&str, FileValidationStatus)> =
        outputs.iter().map(|(t, s)| (t.as_str(), *s)).collect();
    snapshot_with(TaskStatus::Success, &outputs)
}

/// Snapshot with an explicit status and named outputs
pub(crate) fn snapshot_with(
    status: TaskStatus,
    outputs: &[(&str, FileValidationStatus)],
) -> TaskSnapshot {
    TaskSnapshot {
        id: TaskId::new(uuid::Uuid::from_u128(0x1fdd_a469_53e9_4d63_a533_b935_cffd_d2f6)),
        timestamp: TaskTimestamp::from(TEST_TIMESTAMP),
        status,
        inputs: vec![],
        outputs: outputs
            .iter()
            .map(|(file_type, status)| OutputFile::new(*file_type, *status))
            .collect(),
    }
}

/// Zip archive holding `entries` in order
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Scripted answer to one `fetch_snapshot` call
pub(crate) enum SnapshotReply {
    Snapshot(TaskSnapshot),
    Empty,
    Unavailable,
}

/// [`TaskSource`] answering from a script and counting calls
///
/// Snapshot replies are consumed in order (an exhausted script answers
/// "no data"). Payloads are looked up by file type; anything unregistered
/// answers `RemoteUnavailable`.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    snapshots: Mutex<VecDeque<SnapshotReply>>,
    bundle: Mutex<Option<Payload>>,
    files: Mutex<HashMap<String, Payload>>,
    panic_on_bundle: AtomicBool,
    snapshot_calls: AtomicU32,
    bundle_calls: AtomicU32,
    file_requests: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_snapshots(&self, replies: impl IntoIterator<Item = SnapshotReply>) {
        self.snapshots.lock().unwrap().extend(replies);
    }

    pub(crate) fn set_bundle(&self, file_name: &str, bytes: &[u8]) {
        *self.bundle.lock().unwrap() = Some(Payload {
            file_name: file_name.to_string(),
            bytes: bytes.to_vec(),
        });
    }

    pub(crate) fn set_file(&self, file_type: &str, file_name: &str, bytes: &[u8]) {
        self.files.lock().unwrap().insert(
            file_type.to_string(),
            Payload {
                file_name: file_name.to_string(),
                bytes: bytes.to_vec(),
            },
        );
    }

    pub(crate) fn panic_on_bundle(&self) {
        self.panic_on_bundle.store(true, Ordering::SeqCst);
    }

    pub(crate) fn snapshot_calls(&self) -> u32 {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn bundle_calls(&self) -> u32 {
        self.bundle_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn file_requests(&self) -> Vec<String> {
        self.file_requests.lock().unwrap().clone()
    }

    fn unavailable(timestamp: &TaskTimestamp, what: &str) -> Error {
        Error::RemoteUnavailable {
            url: format!("memory://tasks/{}/{}", timestamp, what),
            reason: "HTTP 404 Not Found".to_string(),
        }
    }
}

#[async_trait]
impl TaskSource for ScriptedSource {
    async fn fetch_snapshot(&self, timestamp: &TaskTimestamp) -> Result<Option<TaskSnapshot>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        match self.snapshots.lock().unwrap().pop_front() {
            Some(SnapshotReply::Snapshot(snapshot)) => Ok(Some(snapshot)),
            Some(SnapshotReply::Empty) | None => Ok(None),
            Some(SnapshotReply::Unavailable) => Err(Self::unavailable(timestamp, "")),
        }
    }

    async fn fetch_bundle(&self, timestamp: &TaskTimestamp) -> Result<Payload> {
        self.bundle_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_bundle.load(Ordering::SeqCst) {
            panic!("bundle endpoint exploded");
        }
        self.bundle
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Self::unavailable(timestamp, "outputs"))
    }

    async fn fetch_by_file_type(
        &self,
        timestamp: &TaskTimestamp,
        file_type: &str,
    ) -> Result<Payload> {
        self.file_requests.lock().unwrap().push(file_type.to_string());
        self.files
            .lock()
            .unwrap()
            .get(file_type)
            .cloned()
            .ok_or_else(|| Self::unavailable(timestamp, file_type))
    }
}

#[derive(Default)]
struct MemoryState {
    base_directory: String,
    files: HashMap<String, Vec<u8>>,
    stored: Vec<String>,
    directories: BTreeSet<String>,
    refuse_connections: bool,
    refuse_first: u32,
    reject_login: bool,
    fail_make_directory: bool,
    require_directories: bool,
    failing_stores: HashSet<String>,
    connects: u32,
    closes: u32,
}

/// In-memory remote endpoint implementing the transfer capability traits
///
/// Clones share state, so a test keeps one handle for assertions and hands
/// another to the adapter. Paths are recorded as `<base>/<relative path>`.
#[derive(Clone, Default)]
pub(crate) struct MemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemote {
    pub(crate) fn new(base_directory: &str) -> Self {
        let remote = Self::default();
        remote.state.lock().unwrap().base_directory = base_directory.to_string();
        remote
    }

    pub(crate) fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connections = true;
    }

    pub(crate) fn refuse_first_connects(&self, count: u32) {
        self.state.lock().unwrap().refuse_first = count;
    }

    pub(crate) fn reject_login(&self) {
        self.state.lock().unwrap().reject_login = true;
    }

    pub(crate) fn fail_make_directory(&self) {
        self.state.lock().unwrap().fail_make_directory = true;
    }

    /// Refuse stores into a subdirectory that was never created, like a real server
    pub(crate) fn require_directories(&self) {
        self.state.lock().unwrap().require_directories = true;
    }

    /// Make every store of `relative_path` fail
    pub(crate) fn fail_store_of(&self, relative_path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_stores
            .insert(relative_path.to_string());
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    /// Successfully stored paths, in store order
    pub(crate) fn stored_paths(&self) -> Vec<String> {
        self.state.lock().unwrap().stored.clone()
    }

    pub(crate) fn has_directory(&self, path: &str) -> bool {
        self.state.lock().unwrap().directories.contains(path)
    }

    pub(crate) fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub(crate) fn closes(&self) -> u32 {
        self.state.lock().unwrap().closes
    }
}

impl SessionConnector for MemoryRemote {
    fn open(&self) -> std::result::Result<Box<dyn RemoteSession>, TransferError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;

        if state.refuse_connections || state.refuse_first >= state.connects {
            return Err(TransferError::Connect {
                host: "memory:21".to_string(),
                reason: "connection refused".to_string(),
            });
        }

        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            authenticated: false,
        }))
    }

    fn describe(&self) -> String {
        "memory://remote".to_string()
    }
}

struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    authenticated: bool,
}

impl MemorySession {
    fn ensure_authenticated(&self, path: &str) -> std::result::Result<(), TransferError> {
        if self.authenticated {
            Ok(())
        } else {
            Err(TransferError::Navigate {
                path: path.to_string(),
                reason: "not logged in".to_string(),
            })
        }
    }
}

impl RemoteSession for MemorySession {
    fn authenticate(&mut self) -> std::result::Result<(), TransferError> {
        if self.state.lock().unwrap().reject_login {
            return Err(TransferError::Authentication {
                user: "farao".to_string(),
                reason: "530 Login incorrect".to_string(),
            });
        }
        self.authenticated = true;
        Ok(())
    }

    fn navigate(&mut self) -> std::result::Result<(), TransferError> {
        let base = self.state.lock().unwrap().base_directory.clone();
        self.ensure_authenticated(&base)
    }

    fn make_directory(&mut self, path: &str) -> std::result::Result<(), TransferError> {
        self.ensure_authenticated(path)?;
        let mut state = self.state.lock().unwrap();
        if state.fail_make_directory {
            return Err(TransferError::MakeDirectory {
                path: path.to_string(),
                reason: "550 File exists".to_string(),
            });
        }
        let full = format!("{}/{}", state.base_directory, path);
        state.directories.insert(full);
        Ok(())
    }

    fn store(&mut self, path: &str, bytes: &[u8]) -> std::result::Result<(), TransferError> {
        self.ensure_authenticated(path)?;
        let mut state = self.state.lock().unwrap();
        if state.failing_stores.contains(path) {
            return Err(TransferError::Store {
                file_name: path.to_string(),
                reason: "552 Storage exceeded".to_string(),
            });
        }
        let full = format!("{}/{}", state.base_directory, path);
        if state.require_directories
            && let Some((parent, _)) = full.rsplit_once('/')
            && parent != state.base_directory
            && !state.directories.contains(parent)
        {
            return Err(TransferError::Store {
                file_name: path.to_string(),
                reason: "553 No such directory".to_string(),
            });
        }
        state.files.insert(full.clone(), bytes.to_vec());
        state.stored.push(full);
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closes += 1;
    }
}
