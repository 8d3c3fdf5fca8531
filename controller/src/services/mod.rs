pub mod actions;
pub mod planner;
pub mod reconcile;

pub use reconcile::{reconcile_service, ReconcileContext};
