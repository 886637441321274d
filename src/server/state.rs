use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::notification::DispatchCoordinator;
use crate::scheduler::Scheduler;
use crate::storage::Backends;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub coordinator: Arc<DispatchCoordinator>,
    pub scheduler: Arc<Scheduler>,
    /// Storage backend actually in use ("memory" or "postgres")
    pub storage_backend: &'static str,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, backends: &Backends) -> Self {
        let coordinator = Arc::new(DispatchCoordinator::new(
            backends,
            settings.dispatch.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            coordinator.clone(),
            settings.scheduler.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            coordinator,
            scheduler,
            storage_backend: backends.kind,
            start_time: Instant::now(),
        }
    }
}
