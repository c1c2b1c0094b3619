/// Shared memory for the agents of one strand: a latest-value map plus an
/// append-only journal.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub key: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    short_term: HashMap<String, Value>,
    long_term: Vec<HistoryEntry>,
    context: HashMap<String, Value>,
}

/// Point-in-time copy of a memory instance, suitable for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub short_term: BTreeMap<String, Value>,
    pub long_term: Vec<HistoryEntry>,
    pub context: BTreeMap<String, Value>,
}

/// Cloning yields another handle to the same store. Every operation takes
/// the single inner lock, so access is serialized even when agents run on
/// separate threads.
#[derive(Debug, Clone, Default)]
pub struct SharedMemory {
    state: Arc<Mutex<MemoryState>>,
}

impl SharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value. `persistent` additionally appends it to the journal.
    pub fn store(&self, key: impl Into<String>, value: Value, persistent: bool) {
        let key = key.into();
        let mut state = self.lock();

        if persistent {
            // Journal timestamps never go backwards, even if the wall clock does.
            let now = Utc::now();
            let timestamp = state
                .long_term
                .last()
                .map(|last| last.timestamp.max(now))
                .unwrap_or(now);
            state.long_term.push(HistoryEntry {
                key: key.clone(),
                value: value.clone(),
                timestamp,
            });
        }

        state.short_term.insert(key, value);
    }

    pub fn retrieve(&self, key: &str) -> Option<Value> {
        self.lock().short_term.get(key).cloned()
    }

    /// All journal entries recorded under `key`, oldest first.
    pub fn search_history(&self, key: &str) -> Vec<HistoryEntry> {
        self.lock()
            .long_term
            .iter()
            .filter(|entry| entry.key == key)
            .cloned()
            .collect()
    }

    pub fn set_context(&self, key: impl Into<String>, value: Value) {
        self.lock().context.insert(key.into(), value);
    }

    pub fn context(&self, key: &str) -> Option<Value> {
        self.lock().context.get(key).cloned()
    }

    pub fn history_len(&self) -> usize {
        self.lock().long_term.len()
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let state = self.lock();
        MemorySnapshot {
            short_term: state
                .short_term
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            long_term: state.long_term.clone(),
            context: state
                .context
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// True when both handles point at the same underlying store.
    pub fn same_store(&self, other: &SharedMemory) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_and_retrieve() {
        let memory = SharedMemory::new();
        memory.store("ticket", json!({"id": 7}), true);

        assert_eq!(memory.retrieve("ticket"), Some(json!({"id": 7})));
        let history = memory.search_history("ticket");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, json!({"id": 7}));
    }

    #[test]
    fn test_transient_store_skips_journal() {
        let memory = SharedMemory::new();
        memory.store("scratch", json!(1), false);
        memory.store("scratch", json!(2), false);

        assert_eq!(memory.retrieve("scratch"), Some(json!(2)));
        assert!(memory.search_history("scratch").is_empty());
        assert_eq!(memory.history_len(), 0);
    }

    #[test]
    fn test_journal_keeps_every_persistent_write() {
        let memory = SharedMemory::new();
        memory.store("k", json!("first"), true);
        memory.store("other", json!(true), true);
        memory.store("k", json!("second"), true);

        assert_eq!(memory.retrieve("k"), Some(json!("second")));
        let history = memory.search_history("k");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value, json!("first"));
        assert_eq!(history[1].value, json!("second"));
        assert!(history[1].timestamp >= history[0].timestamp);
    }

    #[test]
    fn test_clones_share_state() {
        let memory = SharedMemory::new();
        let handle = memory.clone();
        handle.set_context("tenant", json!("acme"));
        handle.store("seen", json!(true), false);

        assert!(memory.same_store(&handle));
        assert!(!memory.same_store(&SharedMemory::new()));
        assert_eq!(memory.context("tenant"), Some(json!("acme")));
        assert_eq!(memory.snapshot().short_term.get("seen"), Some(&json!(true)));
    }
}
