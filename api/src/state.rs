use std::sync::Arc;

use orbiter_dispatcher::PodDispatcher;
use orbiter_store::Store;
use tokio::sync::Notify;

/// Shared application state every handler is built from. Cheap to clone:
/// every field is itself a handle over shared state.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub dispatcher: PodDispatcher,
    pub waker: Arc<Notify>,
}

impl AppState {
    pub fn new(store: Store, dispatcher: PodDispatcher, waker: Arc<Notify>) -> Self {
        Self {
            store,
            dispatcher,
            waker,
        }
    }

    /// Pushes a wake to the reconciler pool so a mutation doesn't have to
    /// wait out the fixed tick to be picked up (spec §4.6).
    pub fn trigger_reconcile(&self) {
        self.waker.notify_one();
    }
}
