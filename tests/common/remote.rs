//! In-memory remote endpoint built on the public transfer traits

use export_worker::{RemoteSession, SessionConnector, TransferError};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    directories: BTreeSet<String>,
    failing: HashSet<String>,
    refuse: bool,
    connects: u32,
}

/// Remote endpoint keeping files in memory, keyed by their path under the base directory
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<Mutex<State>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse = true;
    }

    pub fn fail_store_of(&self, path: &str) {
        self.state.lock().unwrap().failing.insert(path.to_string());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn has_directory(&self, path: &str) -> bool {
        self.state.lock().unwrap().directories.contains(path)
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }
}

impl SessionConnector for InMemoryRemote {
    fn open(&self) -> Result<Box<dyn RemoteSession>, TransferError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.refuse {
            return Err(TransferError::Connect {
                host: "memory".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(Box::new(Session {
            state: self.state.clone(),
        }))
    }

    fn describe(&self) -> String {
        "memory://integration".to_string()
    }
}

struct Session {
    state: Arc<Mutex<State>>,
}

impl RemoteSession for Session {
    fn authenticate(&mut self) -> Result<(), TransferError> {
        Ok(())
    }

    fn navigate(&mut self) -> Result<(), TransferError> {
        Ok(())
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransferError> {
        self.state
            .lock()
            .unwrap()
            .directories
            .insert(path.to_string());
        Ok(())
    }

    fn store(&mut self, path: &str, bytes: &[u8]) -> Result<(), TransferError> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(path) {
            return Err(TransferError::Store {
                file_name: path.to_string(),
                reason: "552 Storage exceeded".to_string(),
            });
        }
        state.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) {}
}
