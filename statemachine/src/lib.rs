pub mod error;
pub mod transition;

use chrono::Utc;
use orbiter_store::{HasMeta, Store};
use orbiter_types::{Pod, PodStatus};
use uuid::Uuid;

pub use error::TransitionError;
pub use transition::edge_allowed;

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Store(#[from] orbiter_store::Error),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl ApplyError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApplyError::Store(orbiter_store::Error::Conflict))
    }
}

/// Validates and applies pod status transitions against the store,
/// enforcing the terminal-state and incarnation-sealing rules of spec §4.4.
#[derive(Clone)]
pub struct PodStateMachine {
    store: Store,
}

impl PodStateMachine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Applies a node-reported transition. `reported_incarnation` must
    /// match the pod's current incarnation or the report is rejected as a
    /// stale replay. Re-delivering the same `(incarnation, status)` after
    /// it has already been applied is a no-op (idempotence, spec §8).
    pub async fn apply(
        &self,
        pod_id: Uuid,
        reported_incarnation: u64,
        to: PodStatus,
        message: Option<String>,
    ) -> Result<Pod, ApplyError> {
        let current = self.store.pods.get_by_id(pod_id).await?;

        if current.incarnation == reported_incarnation && current.status == to {
            return Ok(current);
        }

        if current.incarnation != reported_incarnation {
            return Err(TransitionError::IncarnationMismatch {
                current: current.incarnation,
                reported: reported_incarnation,
            }
            .into());
        }

        if !edge_allowed(current.status, to) {
            return Err(TransitionError::InvalidEdge {
                from: current.status,
                to,
            }
            .into());
        }

        let expected_version = current.meta.version;
        let (updated, ()) = self
            .store
            .pods
            .update(pod_id, expected_version, |p| {
                p.status = to;
                p.status_message = message;
                let now = Utc::now();
                if to == PodStatus::Running && p.started_at.is_none() {
                    p.started_at = Some(now);
                }
                if to.is_terminal() {
                    p.stopped_at = Some(now);
                }
            })
            .await?;
        Ok(updated)
    }

    /// Forces a pod directly to `to` regardless of reported incarnation —
    /// used only by control-plane-internal transitions (node-offline
    /// reaping, the Dispatcher's pre-send moves into `scheduled`,
    /// `starting`, and `stopping`) where there is no node report to seal
    /// against.
    pub async fn force_transition(&self, pod: &Pod, to: PodStatus) -> Result<Pod, ApplyError> {
        self.apply(pod.id(), pod.incarnation, to, status_message_for(to))
            .await
    }

    /// When a node goes offline: every non-terminal pod on it that was
    /// mid-lifecycle fails with "node offline"; every pod already
    /// `stopping` is considered to have succeeded, since the node it was
    /// stopping on is gone (spec §4.4).
    pub async fn reap_node_offline(&self, node_id: Uuid) -> Vec<Result<Pod, ApplyError>> {
        let pods = self.store.pods_on_node(node_id).await;
        let mut results = Vec::with_capacity(pods.len());
        for pod in pods {
            let target = match pod.status {
                PodStatus::Scheduled | PodStatus::Starting | PodStatus::Running => {
                    Some(PodStatus::Failed)
                }
                PodStatus::Stopping => Some(PodStatus::Stopped),
                _ => None,
            };
            if let Some(target) = target {
                results.push(self.force_transition(&pod, target).await);
            }
        }
        results
    }
}

fn status_message_for(to: PodStatus) -> Option<String> {
    match to {
        PodStatus::Failed => Some("node offline".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbiter_types::RecordMeta;

    fn pod(status: PodStatus, incarnation: u64, node_id: Option<Uuid>) -> Pod {
        Pod {
            meta: RecordMeta::new(),
            service_id: Some(Uuid::new_v4()),
            pack_id: Uuid::new_v4(),
            pack_version: semver::Version::new(0, 0, 1),
            node_id,
            namespace: "default".to_string(),
            status,
            status_message: None,
            incarnation,
            created_at: Utc::now(),
            started_at: None,
            stopped_at: None,
            volume_mounts: vec![],
        }
    }

    #[tokio::test]
    async fn valid_transition_applies_and_bumps_version() {
        let store = Store::new();
        let created = store.pods.create(pod(PodStatus::Pending, 1, None)).await.unwrap();
        let sm = PodStateMachine::new(store.clone());
        let updated = sm
            .apply(created.id(), 1, PodStatus::Scheduled, None)
            .await
            .unwrap();
        assert_eq!(updated.status, PodStatus::Scheduled);
        assert_eq!(updated.meta.version, 1);
    }

    #[tokio::test]
    async fn stale_incarnation_is_rejected() {
        let store = Store::new();
        let created = store.pods.create(pod(PodStatus::Pending, 2, None)).await.unwrap();
        let sm = PodStateMachine::new(store.clone());
        let err = sm
            .apply(created.id(), 1, PodStatus::Scheduled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::Transition(TransitionError::IncarnationMismatch { .. })));
    }

    #[tokio::test]
    async fn invalid_edge_is_rejected_and_pod_unchanged() {
        let store = Store::new();
        let created = store.pods.create(pod(PodStatus::Pending, 1, None)).await.unwrap();
        let sm = PodStateMachine::new(store.clone());
        let err = sm.apply(created.id(), 1, PodStatus::Running, None).await.unwrap_err();
        assert!(matches!(err, ApplyError::Transition(TransitionError::InvalidEdge { .. })));
        let still = store.pods.get_by_id(created.id()).await.unwrap();
        assert_eq!(still.status, PodStatus::Pending);
    }

    #[tokio::test]
    async fn redelivering_same_status_is_a_no_op() {
        let store = Store::new();
        let created = store.pods.create(pod(PodStatus::Running, 3, None)).await.unwrap();
        let sm = PodStateMachine::new(store.clone());
        let first = sm.apply(created.id(), 3, PodStatus::Running, None).await.unwrap();
        assert_eq!(first.meta.version, 0);
    }

    #[tokio::test]
    async fn node_offline_reaps_running_to_failed_and_stopping_to_stopped() {
        let store = Store::new();
        let node_id = Uuid::new_v4();
        let running = store
            .pods
            .create(pod(PodStatus::Running, 1, Some(node_id)))
            .await
            .unwrap();
        let stopping = store
            .pods
            .create(pod(PodStatus::Stopping, 1, Some(node_id)))
            .await
            .unwrap();
        let sm = PodStateMachine::new(store.clone());
        let results = sm.reap_node_offline(node_id).await;
        assert_eq!(results.len(), 2);
        for r in &results {
            assert!(r.is_ok());
        }
        let running_after = store.pods.get_by_id(running.id()).await.unwrap();
        assert_eq!(running_after.status, PodStatus::Failed);
        assert_eq!(running_after.status_message.as_deref(), Some("node offline"));
        let stopping_after = store.pods.get_by_id(stopping.id()).await.unwrap();
        assert_eq!(stopping_after.status, PodStatus::Stopped);
    }

    #[test]
    fn stopping_pod_never_transitions_back_to_active() {
        for to in [PodStatus::Scheduled, PodStatus::Starting, PodStatus::Running] {
            assert!(!edge_allowed(PodStatus::Stopping, to));
        }
    }
}
