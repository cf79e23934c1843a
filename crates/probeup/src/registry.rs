//! Check registry - which paths are being checked, and by which task.
//!
//! Existence changes only come from the dispatcher, one command at a time;
//! workers never look paths up here, they keep an `Arc` to their own task.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::scheduler::CheckTask;

/// Authoritative mapping from path to its check task
#[derive(Debug, Default)]
pub struct CheckRegistry {
    tasks: Mutex<HashMap<String, Arc<CheckTask>>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` unless its path is already registered
    pub fn insert_if_absent(&self, task: Arc<CheckTask>) -> bool {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(task.path()) {
            return false;
        }
        tasks.insert(task.path().to_string(), task);
        true
    }

    /// Unregister `path`, returning its task if it was registered
    pub fn remove_if_present(&self, path: &str) -> Option<Arc<CheckTask>> {
        self.tasks.lock().remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.tasks.lock().contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<Arc<CheckTask>> {
        self.tasks.lock().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Registered paths, in no particular order
    pub fn paths(&self) -> Vec<String> {
        self.tasks.lock().keys().cloned().collect()
    }

    /// Remove every task, used at shutdown
    pub fn drain(&self) -> Vec<Arc<CheckTask>> {
        self.tasks.lock().drain().map(|(_, task)| task).collect()
    }
}
