//! Persisted run state

use crate::{RunId, SagaRun};

/// Run state storage.
///
/// One record per run, keyed by run id. The engine saves after every
/// state transition, before the next side-effecting call, so a crash
/// mid-saga resumes from the last recorded outcome rather than
/// re-running or skipping a step.
pub trait RunStore: Send + Sync + 'static {
    /// Persist the full run record, replacing any previous version
    fn save(&self, run: &SagaRun) -> Result<(), StoreError>;
    /// Load a run record by id
    fn load(&self, run_id: &RunId) -> Result<Option<SagaRun>, StoreError>;
    /// All run ids known to the store
    fn list_runs(&self) -> Result<Vec<RunId>, StoreError>;
}

/// Run store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying storage failed
    #[error("storage error: {0}")]
    Storage(Box<str>),
}

/// In-memory run store, the default for tests and single-process use
pub struct InMemoryRunStore {
    data: std::sync::RwLock<std::collections::HashMap<RunId, SagaRun>>,
}

impl InMemoryRunStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            data: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl RunStore for InMemoryRunStore {
    fn save(&self, run: &SagaRun) -> Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        data.insert(run.id().clone(), run.clone());
        Ok(())
    }

    fn load(&self, run_id: &RunId) -> Result<Option<SagaRun>, StoreError> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.get(run_id).cloned())
    }

    fn list_runs(&self) -> Result<Vec<RunId>, StoreError> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.keys().cloned().collect())
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;

    #[test]
    fn test_save_and_load() {
        let store = InMemoryRunStore::new();
        let run = SagaRun::new(RunId::new("r1"), "trip", Context::new());

        store.save(&run).unwrap();
        let loaded = store.load(run.id()).unwrap().unwrap();
        assert_eq!(loaded.id(), run.id());
        assert_eq!(loaded.definition_name(), "trip");

        assert!(store.load(&RunId::new("missing")).unwrap().is_none());
        assert_eq!(store.list_runs().unwrap(), vec![RunId::new("r1")]);
    }
}
