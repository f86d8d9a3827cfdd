//! In-memory process engine.
//!
//! Holds process trees, wait points and dead-letter work in a single
//! `parking_lot` mutex. Failures can be injected to exercise the retry and
//! error paths of callers.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use mtaops_protocols::engine::{ProcessDescription, ProcessEngine, Variables};
use mtaops_protocols::error::EngineError;

use crate::deletion::{delete_with_retry, DeletionPolicy};

#[derive(Debug, Clone)]
struct ProcessInstance {
    definition_key: String,
    parent: Option<String>,
    seq: u64,
    variables: Variables,
    at_wait_point: bool,
}

#[derive(Debug, Clone)]
struct HistoricProcess {
    started_at: DateTime<Utc>,
    finished: bool,
}

#[derive(Default)]
struct EngineState {
    next_seq: u64,
    active: HashMap<String, ProcessInstance>,
    historic: HashMap<String, HistoricProcess>,
    dead_letters: Vec<(String, String)>,
    triggered: Vec<(String, Variables)>,
    moved: Vec<(String, u32)>,
    deleted_trees: Vec<(String, String)>,
    deleted_history: Vec<String>,
    pending_delete_conflicts: u32,
    failing_moves: HashSet<String>,
}

impl EngineState {
    fn descendants(&self, root_id: &str) -> Vec<String> {
        let mut found: Vec<(u64, String)> = Vec::new();
        let mut frontier = vec![root_id.to_string()];
        while let Some(parent) = frontier.pop() {
            for (id, instance) in &self.active {
                if instance.parent.as_deref() == Some(parent.as_str()) {
                    found.push((instance.seq, id.clone()));
                    frontier.push(id.clone());
                }
            }
        }
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }
}

/// [`ProcessEngine`] backed by in-process maps.
pub struct InMemoryProcessEngine {
    state: Mutex<EngineState>,
    deletion: DeletionPolicy,
}

impl InMemoryProcessEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            deletion: DeletionPolicy::default(),
        }
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion = policy;
        self
    }

    /// Register a running root process.
    pub fn add_process(&self, process_id: &str, definition_key: &str, variables: Variables) {
        self.insert(process_id, definition_key, None, variables);
    }

    /// Register a running sub-process under `parent_id`.
    pub fn add_sub_process(&self, parent_id: &str, process_id: &str) {
        let key = self
            .state
            .lock()
            .active
            .get(parent_id)
            .map(|p| p.definition_key.clone())
            .unwrap_or_default();
        self.insert(process_id, &key, Some(parent_id.to_string()), Variables::new());
    }

    fn insert(&self, process_id: &str, definition_key: &str, parent: Option<String>, variables: Variables) {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.active.insert(
            process_id.to_string(),
            ProcessInstance {
                definition_key: definition_key.to_string(),
                parent,
                seq,
                variables,
                at_wait_point: false,
            },
        );
        state.historic.insert(
            process_id.to_string(),
            HistoricProcess {
                started_at: Utc::now(),
                finished: false,
            },
        );
    }

    /// Park an execution at a wait point.
    pub fn park_at_wait_point(&self, execution_id: &str) {
        if let Some(instance) = self.state.lock().active.get_mut(execution_id) {
            instance.at_wait_point = true;
        }
    }

    pub fn add_dead_letter(&self, process_id: &str, work_id: &str) {
        self.state
            .lock()
            .dead_letters
            .push((process_id.to_string(), work_id.to_string()));
    }

    /// Record a finished process in history.
    pub fn add_finished_history(&self, process_id: &str, started_at: DateTime<Utc>) {
        self.state.lock().historic.insert(
            process_id.to_string(),
            HistoricProcess {
                started_at,
                finished: true,
            },
        );
    }

    /// Fail the next `count` tree deletions with an optimistic-lock conflict.
    pub fn fail_next_deletions(&self, count: u32) {
        self.state.lock().pending_delete_conflicts = count;
    }

    /// Make every `move_to_executable` of `work_id` fail.
    pub fn fail_moves_of(&self, work_id: &str) {
        self.state.lock().failing_moves.insert(work_id.to_string());
    }

    /// Executions triggered so far, in call order.
    pub fn triggered(&self) -> Vec<(String, Variables)> {
        self.state.lock().triggered.clone()
    }

    /// Work items moved to executable so far, in call order.
    pub fn moved_work(&self) -> Vec<(String, u32)> {
        self.state.lock().moved.clone()
    }

    /// Trees deleted so far with their reasons.
    pub fn deleted_trees(&self) -> Vec<(String, String)> {
        self.state.lock().deleted_trees.clone()
    }

    pub fn deleted_history(&self) -> Vec<String> {
        self.state.lock().deleted_history.clone()
    }

    pub fn has_history(&self, process_id: &str) -> bool {
        self.state.lock().historic.contains_key(process_id)
    }

    pub fn variable(&self, execution_id: &str, name: &str) -> Option<serde_json::Value> {
        self.state
            .lock()
            .active
            .get(execution_id)
            .and_then(|i| i.variables.get(name).cloned())
    }

    fn delete_tree_once(&self, process_id: &str, reason: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.pending_delete_conflicts > 0 {
            state.pending_delete_conflicts -= 1;
            return Err(EngineError::OptimisticLock(format!(
                "execution tree of {} modified concurrently",
                process_id
            )));
        }
        if !state.active.contains_key(process_id) {
            return Ok(());
        }
        let mut doomed = state.descendants(process_id);
        doomed.push(process_id.to_string());
        for id in &doomed {
            state.active.remove(id);
            if let Some(history) = state.historic.get_mut(id) {
                history.finished = true;
            }
        }
        state.dead_letters.retain(|(pid, _)| !doomed.contains(pid));
        state.deleted_trees.push((process_id.to_string(), reason.to_string()));
        Ok(())
    }
}

impl Default for InMemoryProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessEngine for InMemoryProcessEngine {
    async fn start_process(&self, definition_key: &str, variables: Variables) -> Result<String, EngineError> {
        let process_id = uuid::Uuid::new_v4().to_string();
        self.insert(&process_id, definition_key, None, variables);
        Ok(process_id)
    }

    async fn describe_process(&self, process_id: &str) -> Result<Option<ProcessDescription>, EngineError> {
        let state = self.state.lock();
        Ok(state.active.get(process_id).map(|instance| ProcessDescription {
            process_id: process_id.to_string(),
            definition_key: instance.definition_key.clone(),
            variables: instance.variables.clone(),
        }))
    }

    async fn active_sub_executions(&self, root_id: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.state.lock().descendants(root_id))
    }

    async fn historic_sub_executions(&self, root_id: &str) -> Result<Vec<String>, EngineError> {
        // Deleted trees drop their parent links, so only live descendants
        // can be walked here.
        Ok(self.state.lock().descendants(root_id))
    }

    async fn executions_at_wait_point(&self, process_id: &str) -> Result<Vec<String>, EngineError> {
        let state = self.state.lock();
        Ok(state
            .active
            .get(process_id)
            .filter(|i| i.at_wait_point)
            .map(|_| vec![process_id.to_string()])
            .unwrap_or_default())
    }

    async fn trigger_at_wait_point(&self, execution_id: &str, variables: Variables) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let instance = state
            .active
            .get_mut(execution_id)
            .filter(|i| i.at_wait_point)
            .ok_or_else(|| EngineError::NotFound(execution_id.to_string()))?;
        instance.at_wait_point = false;
        instance.variables.extend(variables.clone());
        state.triggered.push((execution_id.to_string(), variables));
        Ok(())
    }

    async fn dead_letter_work(&self, process_id: &str) -> Result<Vec<String>, EngineError> {
        let state = self.state.lock();
        Ok(state
            .dead_letters
            .iter()
            .filter(|(pid, _)| pid == process_id)
            .map(|(_, work)| work.clone())
            .collect())
    }

    async fn move_to_executable(&self, work_id: &str, retries: u32) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.failing_moves.contains(work_id) {
            return Err(EngineError::ApiError {
                status: 500,
                message: format!("cannot move {}", work_id),
            });
        }
        let before = state.dead_letters.len();
        state.dead_letters.retain(|(_, work)| work != work_id);
        if state.dead_letters.len() == before {
            return Err(EngineError::NotFound(work_id.to_string()));
        }
        state.moved.push((work_id.to_string(), retries));
        Ok(())
    }

    async fn delete_execution_tree(&self, process_id: &str, reason: &str) -> Result<(), EngineError> {
        delete_with_retry(process_id, &self.deletion, || async {
            self.delete_tree_once(process_id, reason)
        })
        .await
    }

    async fn is_finished(&self, root_id: &str) -> Result<bool, EngineError> {
        Ok(!self.state.lock().active.contains_key(root_id))
    }

    async fn get_variable(&self, execution_id: &str, name: &str) -> Result<Option<serde_json::Value>, EngineError> {
        let state = self.state.lock();
        let instance = state
            .active
            .get(execution_id)
            .ok_or_else(|| EngineError::NotFound(execution_id.to_string()))?;
        Ok(instance.variables.get(name).cloned())
    }

    async fn set_variable(&self, execution_id: &str, name: &str, value: serde_json::Value) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let instance = state
            .active
            .get_mut(execution_id)
            .ok_or_else(|| EngineError::NotFound(execution_id.to_string()))?;
        instance.variables.insert(name.to_string(), value);
        Ok(())
    }

    async fn finished_processes_started_before(
        &self,
        cutoff: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, EngineError> {
        let state = self.state.lock();
        let mut finished: Vec<_> = state
            .historic
            .iter()
            .filter(|(_, h)| h.finished && h.started_at < cutoff)
            .map(|(id, h)| (h.started_at, id.clone()))
            .collect();
        finished.sort();
        Ok(finished.into_iter().skip(offset).take(limit).map(|(_, id)| id).collect())
    }

    async fn delete_historic_data(&self, process_id: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.historic.remove(process_id);
        state.deleted_history.push(process_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
