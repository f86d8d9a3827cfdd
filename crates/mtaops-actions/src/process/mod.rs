//! Start, Resume, Retry and Abort.
//!
//! Every action except Abort runs its body between `acquire_lock` and an
//! unconditional lock release, so the lock flag is down again once the call
//! returns, whatever the outcome.

use std::collections::HashSet;
use std::future::Future;

use serde_json::Value;
use tracing::{info, warn};

use mtaops_protocols::engine::{variables, Variables};
use mtaops_protocols::error::ActionError;
use mtaops_protocols::operation::{Operation, OperationState};

use crate::context::ActionContext;

mod abort;
mod resume;
mod retry;
mod start;

pub use abort::{AbortAction, ABORT_REASON};
pub use resume::ResumeAction;
pub use retry::RetryAction;
pub use start::StartAction;

/// Root plus its active sub-executions, outermost first.
pub(crate) async fn discover_executions(ctx: &ActionContext, root_id: &str) -> Result<Vec<String>, ActionError> {
    let mut executions = vec![root_id.to_string()];
    executions.extend(ctx.engine.active_sub_executions(root_id).await?);
    Ok(executions)
}

/// Run `body` holding the lock of `process_id`. The lock is always released.
pub(crate) async fn with_lock<T, F, Fut>(ctx: &ActionContext, process_id: &str, body: F) -> Result<T, ActionError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ActionError>>,
{
    ctx.conflict.acquire_lock(process_id).await?;
    let result = body().await;
    ctx.conflict.attempt_to_release_lock(process_id).await;
    result
}

/// Reject actions that would move a final operation back to RUNNING.
pub(crate) fn ensure_not_final(operation: &Operation) -> Result<(), ActionError> {
    if operation.is_final() {
        return Err(ActionError::InvalidTransition {
            from: operation.state,
            to: OperationState::Running,
        });
    }
    Ok(())
}

/// Signal every execution of the tree parked at a wait point, on behalf of
/// `user`. Returns how many were signalled.
pub(crate) async fn continue_at_wait_points(
    ctx: &ActionContext,
    user: &str,
    process_id: &str,
) -> Result<usize, ActionError> {
    let mut seen = HashSet::new();
    let mut waiting = Vec::new();
    for execution in discover_executions(ctx, process_id).await? {
        for parked in ctx.engine.executions_at_wait_point(&execution).await? {
            if seen.insert(parked.clone()) {
                waiting.push(parked);
            }
        }
    }

    if waiting.is_empty() {
        warn!("Operation {} is not waiting at any wait point", process_id);
        return Ok(0);
    }

    rebind_user(ctx, user, process_id).await?;

    let mut vars = Variables::new();
    vars.insert(variables::USER.to_string(), Value::String(user.to_string()));
    for execution in &waiting {
        ctx.engine.trigger_at_wait_point(execution, vars.clone()).await?;
    }
    Ok(waiting.len())
}

/// Bind the root execution to `user`, dropping the cached session of the
/// previous user. No-op when the user is unchanged.
async fn rebind_user(ctx: &ActionContext, user: &str, root_id: &str) -> Result<(), ActionError> {
    let previous = ctx
        .engine
        .get_variable(root_id, variables::USER)
        .await?
        .and_then(|v| v.as_str().map(str::to_string));

    if previous.as_deref() == Some(user) {
        return Ok(());
    }
    if let Some(old) = &previous {
        ctx.sessions.release(old);
    }
    ctx.engine
        .set_variable(root_id, variables::USER, Value::String(user.to_string()))
        .await?;
    info!(
        "Operation {} now acts on behalf of {} (was {})",
        root_id,
        user,
        previous.as_deref().unwrap_or("nobody")
    );
    Ok(())
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
