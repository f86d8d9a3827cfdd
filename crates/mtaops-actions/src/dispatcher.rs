//! Action registry and dispatch.
//!
//! Actions are registered explicitly at construction time, keyed by their
//! [`ActionId`]. Lookup of an unknown id fails before any store is touched.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use mtaops_protocols::error::ActionError;

use crate::action::{ActionId, ProcessAction};
use crate::context::ActionContext;
use crate::process::{AbortAction, ResumeAction, RetryAction, StartAction};

/// Routes external action ids to their [`ProcessAction`].
pub struct ActionDispatcher {
    actions: DashMap<ActionId, Arc<dyn ProcessAction>>,
}

impl ActionDispatcher {
    /// Dispatcher with no actions registered.
    pub fn empty() -> Self {
        Self { actions: DashMap::new() }
    }

    /// Dispatcher with Start, Resume, Retry and Abort bound to `ctx`.
    pub fn new(ctx: Arc<ActionContext>) -> Self {
        let dispatcher = Self::empty();
        dispatcher.register(Arc::new(StartAction::new(ctx.clone())));
        dispatcher.register(Arc::new(ResumeAction::new(ctx.clone())));
        dispatcher.register(Arc::new(RetryAction::new(ctx.clone())));
        dispatcher.register(Arc::new(AbortAction::new(ctx)));
        dispatcher
    }

    /// Register `action`, replacing any action with the same id.
    pub fn register(&self, action: Arc<dyn ProcessAction>) {
        let id = action.action_id();
        if self.actions.insert(id, action).is_some() {
            debug!("Replaced action {}", id);
        }
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.actions.contains_key(&id)
    }

    /// Registered ids in declaration order.
    pub fn list_ids(&self) -> Vec<ActionId> {
        ActionId::ALL.into_iter().filter(|id| self.contains(*id)).collect()
    }

    /// Resolve an external action id.
    pub fn get_action(&self, id: &str) -> Result<Arc<dyn ProcessAction>, ActionError> {
        let action_id = ActionId::parse(id)?;
        self.actions
            .get(&action_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ActionError::IllegalState(format!("Unsupported action: {}", id)))
    }

    /// Resolve `id` and run it for `process_id` on behalf of `user`.
    pub async fn execute(&self, id: &str, user: &str, process_id: &str) -> Result<(), ActionError> {
        let action = self.get_action(id)?;
        info!("{} requested {} of {}", user, id, process_id);
        action.execute(user, process_id).await
    }
}
