use eventface_core::BatchOrchestrator;
use eventface_store::Store;

/// Shared application state.
pub struct AppState<F, D> {
    /// Runs the per-image pipeline over batches; also used for enrolment.
    pub orchestrator: BatchOrchestrator<F, D>,
    /// Identity registry and event results.
    pub store: Store,
}

impl<F, D> AppState<F, D> {
    pub fn new(orchestrator: BatchOrchestrator<F, D>, store: Store) -> Self {
        Self {
            orchestrator,
            store,
        }
    }
}
