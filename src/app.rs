//! Composition root: binds stores, the engine client, actions and cleanup.

use std::sync::Arc;

use tracing::info;

use mtaops_actions::{
    AbortAction, ActionContext, ActionDispatcher, EngineSignalHandler, OperationLauncher, WorkerPool,
};
use mtaops_cleanup::{build_coordinator, CleanupCoordinator};
use mtaops_config::Config;
use mtaops_engine::RestProcessEngine;
use mtaops_protocols::engine::ProcessEngine;
use mtaops_store::StoreSet;

pub(crate) struct App {
    pub config: Config,
    pub stores: StoreSet,
    pub workers: Arc<WorkerPool>,
    pub dispatcher: ActionDispatcher,
    pub launcher: OperationLauncher,
    pub signals: EngineSignalHandler,
    pub coordinator: Arc<CleanupCoordinator>,
}

impl App {
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let stores = if config.database.is_in_memory() {
            StoreSet::sqlite_in_memory().await?
        } else {
            let path = config.database.resolved_path();
            info!("Using database {}", path.display());
            StoreSet::sqlite(path).await?
        };

        let engine: Arc<dyn ProcessEngine> = Arc::new(RestProcessEngine::from_config(&config.engine)?);
        info!("Bound process engine at {}", config.engine.base_url);
        Ok(Self::assemble(config, stores, engine))
    }

    /// Wire actions and cleanup over already-built stores and engine.
    pub fn assemble(config: Config, stores: StoreSet, engine: Arc<dyn ProcessEngine>) -> Self {
        let workers = Arc::new(WorkerPool::new(config.actions.max_workers as usize));
        let ctx = Arc::new(ActionContext::new(&stores, engine.clone(), workers.clone()));
        let dispatcher = ActionDispatcher::new(ctx.clone());
        let launcher = OperationLauncher::new(ctx.clone());
        let signals = EngineSignalHandler::new(ctx.clone());
        let abort = Arc::new(AbortAction::new(ctx));
        let coordinator = Arc::new(build_coordinator(&config.cleanup, &stores, engine, abort));

        Self {
            config,
            stores,
            workers,
            dispatcher,
            launcher,
            signals,
            coordinator,
        }
    }

    /// Wait for queued background work before exiting.
    pub async fn shutdown(&self) {
        self.workers.shutdown().await;
    }
}
