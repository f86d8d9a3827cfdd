//! Builds the cleaner chain from configuration.

use std::sync::Arc;

use chrono::Duration;

use mtaops_actions::ProcessAction;
use mtaops_config::{CleanupConfig, OperationsStrategy};
use mtaops_protocols::engine::ProcessEngine;
use mtaops_store::StoreSet;

use crate::artifacts::{
    FilesCleaner, HistoricOperationEventsCleaner, ProcessLogsCleaner, ProgressMessagesCleaner,
    StepAnalyticsCleaner, TokenCleaner,
};
use crate::cleaner::Cleaner;
use crate::coordinator::CleanupCoordinator;
use crate::engine_data::{AbortedOperationsCleaner, HistoricEngineDataCleaner};
use crate::operations::{
    ActiveOperationsCleaner, ExpiredOperationsCleaner, InactiveOperationsCleaner, OperationsCleaner,
};

/// The cleaner chain in registration order.
pub fn build_cleaners(
    config: &CleanupConfig,
    stores: &StoreSet,
    engine: Arc<dyn ProcessEngine>,
    abort: Arc<dyn ProcessAction>,
) -> Vec<Arc<dyn Cleaner>> {
    let mut cleaners: Vec<Arc<dyn Cleaner>> = Vec::new();

    match config.operations_strategy {
        OperationsStrategy::Active => {
            cleaners.push(Arc::new(ActiveOperationsCleaner::new(stores.operations.clone(), abort)));
        }
        OperationsStrategy::Paginated => {
            cleaners.push(Arc::new(
                OperationsCleaner::new(stores.operations.clone(), abort).with_page_size(config.page_size),
            ));
        }
    }
    cleaners.push(Arc::new(TokenCleaner::new(stores.tokens.clone())));

    cleaners.push(Arc::new(InactiveOperationsCleaner::new(
        stores.operations.clone(),
        stores.progress_messages.clone(),
        stores.process_logs.clone(),
    )));
    cleaners.push(Arc::new(FilesCleaner::new(stores.files.clone())));
    cleaners.push(Arc::new(ProcessLogsCleaner::new(stores.process_logs.clone())));
    cleaners.push(Arc::new(ProgressMessagesCleaner::new(stores.progress_messages.clone())));
    cleaners.push(Arc::new(StepAnalyticsCleaner::new(stores.analytics.clone())));
    cleaners.push(Arc::new(HistoricOperationEventsCleaner::new(stores.events.clone())));

    cleaners.push(Arc::new(HistoricEngineDataCleaner::new(engine.clone(), config.page_size)));
    cleaners.push(Arc::new(
        AbortedOperationsCleaner::new(engine, stores.events.clone())
            .with_grace(Duration::minutes(i64::from(config.aborted_grace_minutes))),
    ));

    if config.operations_strategy == OperationsStrategy::Active {
        cleaners.push(Arc::new(ExpiredOperationsCleaner::new(stores.operations.clone())));
    }
    cleaners
}

/// Coordinator over [`build_cleaners`].
pub fn build_coordinator(
    config: &CleanupConfig,
    stores: &StoreSet,
    engine: Arc<dyn ProcessEngine>,
    abort: Arc<dyn ProcessAction>,
) -> CleanupCoordinator {
    CleanupCoordinator::new(build_cleaners(config, stores, engine, abort))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtaops_actions::{AbortAction, ActionContext, WorkerPool};
    use mtaops_engine::InMemoryProcessEngine;

    fn coordinator_for(strategy: OperationsStrategy) -> CleanupCoordinator {
        let stores = StoreSet::in_memory();
        let engine: Arc<dyn ProcessEngine> = Arc::new(InMemoryProcessEngine::new());
        let ctx = Arc::new(ActionContext::new(&stores, engine.clone(), Arc::new(WorkerPool::new(1))));
        let config = CleanupConfig {
            operations_strategy: strategy,
            ..CleanupConfig::default()
        };
        build_coordinator(&config, &stores, engine, Arc::new(AbortAction::new(ctx)))
    }

    #[test]
    fn test_active_strategy_chain() {
        let coordinator = coordinator_for(OperationsStrategy::Active);
        assert_eq!(
            coordinator.cleaner_names(),
            vec![
                "active-operations",
                "tokens",
                "inactive-operations",
                "files",
                "process-logs",
                "progress-messages",
                "step-analytics",
                "historic-operation-events",
                "historic-engine-data",
                "aborted-operations",
                "expired-operations",
            ]
        );
    }

    #[test]
    fn test_paginated_strategy_replaces_operation_cleaners() {
        let names = coordinator_for(OperationsStrategy::Paginated)
            .cleaner_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        assert_eq!(names[0], "operations");
        assert!(!names.iter().any(|n| n == "active-operations" || n == "expired-operations"));
        assert_eq!(names.len(), 10);
    }
}
