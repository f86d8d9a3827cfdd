//! Operation records and their state machine.
//!
//! An operation is one user-triggered deploy or undeploy run, tracked from
//! the moment it starts until its row is reclaimed by cleanup.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of process an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessType {
    /// Regular deployment.
    Deploy,
    /// Blue-green deployment.
    BlueGreenDeploy,
    /// Undeployment.
    Undeploy,
    /// Deployment triggered through a transport service.
    CtsDeploy,
}

impl ProcessType {
    pub const ALL: [ProcessType; 4] = [
        ProcessType::Deploy,
        ProcessType::BlueGreenDeploy,
        ProcessType::Undeploy,
        ProcessType::CtsDeploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Deploy => "DEPLOY",
            ProcessType::BlueGreenDeploy => "BLUE_GREEN_DEPLOY",
            ProcessType::Undeploy => "UNDEPLOY",
            ProcessType::CtsDeploy => "CTS_DEPLOY",
        }
    }

    /// Process definition key of the engine-side workflow for this type.
    pub fn definition_key(&self) -> &'static str {
        match self {
            ProcessType::Deploy => "xs2-deploy",
            ProcessType::BlueGreenDeploy => "xs2-bg-deploy",
            ProcessType::Undeploy => "xs2-undeploy",
            ProcessType::CtsDeploy => "CTS_DEPLOY",
        }
    }

    /// Reverse of [`ProcessType::definition_key`].
    pub fn from_definition_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.definition_key() == key)
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown process type: {}", s))
    }
}

/// Lifecycle state of an operation.
///
/// ```text
///            start
///   (none) ────────> RUNNING ──────────> FINISHED
///                     │  ▲  │
///        wait point   │  │  │ uncaught failure
///                     ▼  │  ▼
///          ACTION_REQUIRED  ERROR
///              (resume)       (retry)
///
///   any non-final state ──abort──> ABORTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Running,
    Finished,
    Error,
    Aborted,
    ActionRequired,
}

impl OperationState {
    pub const ALL: [OperationState; 5] = [
        OperationState::Running,
        OperationState::Finished,
        OperationState::Error,
        OperationState::Aborted,
        OperationState::ActionRequired,
    ];

    /// State a freshly started operation is created in.
    pub fn initial() -> Self {
        OperationState::Running
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Running => "RUNNING",
            OperationState::Finished => "FINISHED",
            OperationState::Error => "ERROR",
            OperationState::Aborted => "ABORTED",
            OperationState::ActionRequired => "ACTION_REQUIRED",
        }
    }

    /// Terminal states never transition again.
    pub fn is_final(&self) -> bool {
        matches!(self, OperationState::Finished | OperationState::Aborted)
    }

    pub fn final_states() -> Vec<OperationState> {
        Self::ALL.into_iter().filter(|s| s.is_final()).collect()
    }

    pub fn non_final_states() -> Vec<OperationState> {
        Self::ALL.into_iter().filter(|s| !s.is_final()).collect()
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        use OperationState::*;
        match (self, next) {
            (Running, Finished | Error | ActionRequired | Aborted) => true,
            (ActionRequired, Running | Aborted) => true,
            (Error, Running | Aborted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown operation state: {}", s))
    }
}

/// A persisted operation record. Exactly one row exists per `process_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Root process id in the workflow engine; primary key.
    pub process_id: String,
    pub process_type: ProcessType,
    pub state: OperationState,
    pub space_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mta_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub user: String,
    /// True only while a mutating action runs for this operation.
    pub has_acquired_lock: bool,
    /// Set once by inactive-operation cleanup; never reverts.
    pub cleaned_up: bool,
}

impl Operation {
    /// Create a RUNNING operation started now.
    pub fn new(
        process_id: impl Into<String>,
        process_type: ProcessType,
        space_id: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            process_type,
            state: OperationState::initial(),
            space_id: space_id.into(),
            mta_id: None,
            namespace: None,
            started_at: Utc::now(),
            ended_at: None,
            user: user.into(),
            has_acquired_lock: false,
            cleaned_up: false,
        }
    }

    pub fn with_mta_id(mut self, mta_id: impl Into<String>) -> Self {
        self.mta_id = Some(mta_id.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_state(mut self, state: OperationState) -> Self {
        self.state = state;
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    /// Whether two operations touch the same deployed MTA.
    pub fn targets_same_mta(&self, other: &Operation) -> bool {
        self.mta_id.is_some()
            && self.mta_id == other.mta_id
            && self.space_id == other.space_id
            && self.namespace == other.namespace
    }
}

/// Sort order for operation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationOrder {
    #[default]
    ProcessIdAsc,
    StartedAtAsc,
    StartedAtDesc,
}

/// Filter over persisted operations.
///
/// Every `None` field matches anything; set fields are combined with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationFilter {
    pub process_id: Option<String>,
    pub process_type: Option<ProcessType>,
    pub space_id: Option<String>,
    pub mta_id: Option<String>,
    pub namespace: Option<String>,
    pub user: Option<String>,
    pub acquired_lock: Option<bool>,
    /// Any-of state filter. Empty matches every state.
    #[serde(default)]
    pub states: Vec<OperationState>,
    pub cleaned_up: Option<bool>,
    pub started_before: Option<DateTime<Utc>>,
    pub started_after: Option<DateTime<Utc>>,
    pub ended_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    #[serde(default)]
    pub order: OperationOrder,
}

impl OperationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_id(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = Some(process_id.into());
        self
    }

    pub fn process_type(mut self, process_type: ProcessType) -> Self {
        self.process_type = Some(process_type);
        self
    }

    pub fn space_id(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    pub fn mta_id(mut self, mta_id: impl Into<String>) -> Self {
        self.mta_id = Some(mta_id.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn acquired_lock(mut self, acquired: bool) -> Self {
        self.acquired_lock = Some(acquired);
        self
    }

    pub fn states(mut self, states: impl IntoIterator<Item = OperationState>) -> Self {
        self.states = states.into_iter().collect();
        self
    }

    pub fn in_final_state(self) -> Self {
        self.states(OperationState::final_states())
    }

    pub fn in_non_final_state(self) -> Self {
        self.states(OperationState::non_final_states())
    }

    pub fn cleaned_up(mut self, cleaned_up: bool) -> Self {
        self.cleaned_up = Some(cleaned_up);
        self
    }

    pub fn started_before(mut self, time: DateTime<Utc>) -> Self {
        self.started_before = Some(time);
        self
    }

    pub fn started_after(mut self, time: DateTime<Utc>) -> Self {
        self.started_after = Some(time);
        self
    }

    pub fn ended_before(mut self, time: DateTime<Utc>) -> Self {
        self.ended_before = Some(time);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order(mut self, order: OperationOrder) -> Self {
        self.order = order;
        self
    }

    /// Row-level predicate. Ordering and paging are applied by the store.
    pub fn matches(&self, op: &Operation) -> bool {
        fn eq<T: PartialEq>(want: &Option<T>, have: &T) -> bool {
            want.as_ref().is_none_or(|w| w == have)
        }

        eq(&self.process_id, &op.process_id)
            && eq(&self.process_type, &op.process_type)
            && eq(&self.space_id, &op.space_id)
            && eq(&self.user, &op.user)
            && eq(&self.acquired_lock, &op.has_acquired_lock)
            && eq(&self.cleaned_up, &op.cleaned_up)
            && self.mta_id.as_ref().is_none_or(|m| op.mta_id.as_ref() == Some(m))
            && self.namespace.as_ref().is_none_or(|n| op.namespace.as_ref() == Some(n))
            && (self.states.is_empty() || self.states.contains(&op.state))
            && self.started_before.is_none_or(|t| op.started_at < t)
            && self.started_after.is_none_or(|t| op.started_at > t)
            && self
                .ended_before
                .is_none_or(|t| op.ended_at.is_some_and(|ended| ended < t))
    }

    /// Sort and page an already-filtered set the way a query would.
    pub fn apply_order_and_paging(&self, mut ops: Vec<Operation>) -> Vec<Operation> {
        match self.order {
            OperationOrder::ProcessIdAsc => ops.sort_by(|a, b| a.process_id.cmp(&b.process_id)),
            OperationOrder::StartedAtAsc => ops.sort_by(|a, b| {
                a.started_at.cmp(&b.started_at).then_with(|| a.process_id.cmp(&b.process_id))
            }),
            OperationOrder::StartedAtDesc => ops.sort_by(|a, b| {
                b.started_at.cmp(&a.started_at).then_with(|| a.process_id.cmp(&b.process_id))
            }),
        }
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        ops.into_iter().skip(offset).take(limit).collect()
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
