pub mod credential;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use orbiter_registry::ConnectionRegistry;
use orbiter_statemachine::PodStateMachine;
use orbiter_types::{Envelope, Node, Pod, PodStatus, StopReason};
use tracing::{info, warn};
use uuid::Uuid;

pub use credential::{CredentialMinter, HmacCredentialMinter};
pub use error::Error;

/// Outcome of a `start`/`stop` dispatch. Distinct from a bare bool so
/// callers pattern-match an explicit reachability result instead of
/// testing truthiness.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent(Pod),
    Unreachable(Pod),
}

impl DispatchOutcome {
    pub fn pod(&self) -> &Pod {
        match self {
            DispatchOutcome::Sent(pod) | DispatchOutcome::Unreachable(pod) => pod,
        }
    }

    pub fn was_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent(_))
    }
}

/// Issues `pod:start`/`pod:stop` control messages to node agents through
/// the Connection Registry, minting the credential a started pod needs to
/// authenticate its own agent connection.
#[derive(Clone)]
pub struct PodDispatcher {
    registry: ConnectionRegistry,
    statemachine: PodStateMachine,
    minter: Arc<dyn CredentialMinter>,
    deadline: Duration,
}

impl PodDispatcher {
    pub fn new(
        registry: ConnectionRegistry,
        statemachine: PodStateMachine,
        minter: Arc<dyn CredentialMinter>,
        deadline: Duration,
    ) -> Self {
        Self {
            registry,
            statemachine,
            minter,
            deadline,
        }
    }

    /// Sends `frame` to `node_id` within `self.deadline`. A timeout is
    /// folded into the same "unreachable" outcome as a dead connection
    /// (spec §7: `DeadlineExceeded` is treated as `Unavailable`).
    async fn send_with_deadline(
        &self,
        node_id: Uuid,
        frame: Envelope<orbiter_types::PlaneFrame>,
    ) -> Result<(), orbiter_registry::Error> {
        match tokio::time::timeout(self.deadline, self.registry.send(node_id, frame)).await {
            Ok(result) => result,
            Err(_) => Err(orbiter_registry::Error::DeadlineExceeded(node_id)),
        }
    }

    /// Starts a freshly scheduled pod on `node`. `pod` must currently be
    /// `pending`. On a successful send the pod is advanced through
    /// `scheduled` into `starting`; a later node report carries it to
    /// `running`. On send failure the pod is left in `pending` so the
    /// reconciler retries it next tick.
    pub async fn start(
        &self,
        pod: Pod,
        node: &Node,
        bundle_location: String,
        env: std::collections::BTreeMap<String, String>,
    ) -> Result<DispatchOutcome, Error> {
        let credential = self.minter.mint(pod.id(), node.id());
        let frame = orbiter_types::PlaneFrame::PodStart {
            pod_id: pod.id(),
            pack_id: pod.pack_id,
            pack_version: pod.pack_version.clone(),
            bundle_location,
            env,
            volume_mounts: pod.volume_mounts.clone(),
            credential,
        };

        match self.send_with_deadline(node.id(), Envelope::new(frame)).await {
            Ok(()) => {
                let scheduled = self
                    .statemachine
                    .force_transition(&pod, PodStatus::Scheduled)
                    .await?;
                let starting = self
                    .statemachine
                    .force_transition(&scheduled, PodStatus::Starting)
                    .await?;
                info!(pod_id = %pod.id(), node_id = %node.id(), "pod:start dispatched");
                Ok(DispatchOutcome::Sent(starting))
            }
            Err(err) => {
                warn!(pod_id = %pod.id(), node_id = %node.id(), %err, "pod:start unreachable, leaving pod pending");
                Ok(DispatchOutcome::Unreachable(pod))
            }
        }
    }

    /// Stops `pod` for `reason`. The pod is moved to `stopping` in the
    /// store *before* the message is sent, regardless of whether the send
    /// itself succeeds — the eventual terminal transition comes either
    /// from the node's own status report, or from the node-offline reap
    /// if the connection never recovers (§4.4).
    pub async fn stop(&self, pod: Pod, reason: StopReason) -> Result<DispatchOutcome, Error> {
        let stopping = self
            .statemachine
            .force_transition(&pod, PodStatus::Stopping)
            .await?;

        let Some(node_id) = stopping.node_id else {
            return Ok(DispatchOutcome::Unreachable(stopping));
        };

        let frame = orbiter_types::PlaneFrame::PodStop {
            pod_id: stopping.id(),
            reason,
        };
        match self.send_with_deadline(node_id, Envelope::new(frame)).await {
            Ok(()) => {
                info!(pod_id = %stopping.id(), %node_id, "pod:stop dispatched");
                Ok(DispatchOutcome::Sent(stopping))
            }
            Err(err) => {
                warn!(pod_id = %stopping.id(), %node_id, %err, "pod:stop unreachable, pod remains stopping pending reap");
                Ok(DispatchOutcome::Unreachable(stopping))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbiter_store::Store;
    use orbiter_types::{NodeStatus, RecordMeta, ResourceQuantities, RuntimeType};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn minter() -> Arc<dyn CredentialMinter> {
        Arc::new(HmacCredentialMinter::new(b"k".to_vec(), Duration::from_secs(60)))
    }

    fn pod(status: PodStatus, node_id: Option<Uuid>) -> Pod {
        Pod {
            meta: RecordMeta::new(),
            service_id: Some(Uuid::new_v4()),
            pack_id: Uuid::new_v4(),
            pack_version: semver::Version::new(0, 1, 0),
            node_id,
            namespace: "default".to_string(),
            status,
            status_message: None,
            incarnation: 1,
            created_at: chrono::Utc::now(),
            started_at: None,
            stopped_at: None,
            volume_mounts: vec![],
        }
    }

    fn node() -> Node {
        Node {
            meta: RecordMeta::new(),
            name: "n1".to_string(),
            runtime_type: RuntimeType::Node,
            status: NodeStatus::Online,
            connection_id: None,
            labels: Default::default(),
            taints: Default::default(),
            allocatable: ResourceQuantities {
                cpu: 4,
                memory: 4096,
                pods: 10,
                storage: 0,
            },
            allocated: ResourceQuantities::default(),
            machine_id: "m1".to_string(),
            registered_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn start_advances_pending_to_starting_when_node_reachable() {
        let store = Store::new();
        let sm = PodStateMachine::new(store.clone());
        let registry = ConnectionRegistry::spawn(
            store.clone(),
            sm.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        let node = node();
        let (_conn_id, mut rx) = registry.register(node.id()).await;

        let created = store.pods.create(pod(PodStatus::Pending, Some(node.id()))).await.unwrap();
        let dispatcher = PodDispatcher::new(registry, sm, minter(), Duration::from_secs(5));

        let outcome = dispatcher
            .start(created, &node, "s3://bundle".to_string(), Default::default())
            .await
            .unwrap();
        assert!(outcome.was_sent());
        assert_eq!(outcome.pod().status, PodStatus::Starting);
        let delivered = rx.recv().await.unwrap();
        assert!(matches!(delivered.frame, orbiter_types::PlaneFrame::PodStart { .. }));
    }

    #[tokio::test]
    async fn start_leaves_pod_pending_when_node_unreachable() {
        let store = Store::new();
        let sm = PodStateMachine::new(store.clone());
        let registry = ConnectionRegistry::spawn(
            store.clone(),
            sm.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        let node = node();
        // no register() call: node has no live connection

        let created = store.pods.create(pod(PodStatus::Pending, Some(node.id()))).await.unwrap();
        let dispatcher = PodDispatcher::new(registry, sm, minter(), Duration::from_secs(5));

        let outcome = dispatcher
            .start(created, &node, "s3://bundle".to_string(), Default::default())
            .await
            .unwrap();
        assert!(!outcome.was_sent());
        assert_eq!(outcome.pod().status, PodStatus::Pending);
    }

    #[tokio::test]
    async fn stop_moves_pod_to_stopping_even_when_unreachable() {
        let store = Store::new();
        let sm = PodStateMachine::new(store.clone());
        let registry = ConnectionRegistry::spawn(
            store.clone(),
            sm.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        let node_id = Uuid::new_v4();
        let created = store.pods.create(pod(PodStatus::Running, Some(node_id))).await.unwrap();
        let dispatcher = PodDispatcher::new(registry, sm, minter(), Duration::from_secs(5));

        let outcome = dispatcher.stop(created, StopReason::UserRequested).await.unwrap();
        assert!(!outcome.was_sent());
        assert_eq!(outcome.pod().status, PodStatus::Stopping);
    }

    #[tokio::test]
    async fn start_times_out_as_unreachable_when_agent_stops_draining() {
        let store = Store::new();
        let sm = PodStateMachine::new(store.clone());
        let registry = ConnectionRegistry::spawn(
            store.clone(),
            sm.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        let node = node();
        let (_conn_id, _rx) = registry.register(node.id()).await;
        // _rx is held but never drained: fill the bounded channel so the
        // next send blocks until the deadline elapses.
        for _ in 0..64 {
            registry
                .send(
                    node.id(),
                    Envelope::new(orbiter_types::PlaneFrame::PodStop {
                        pod_id: Uuid::new_v4(),
                        reason: StopReason::UserRequested,
                    }),
                )
                .await
                .unwrap();
        }

        let created = store.pods.create(pod(PodStatus::Pending, Some(node.id()))).await.unwrap();
        let dispatcher = PodDispatcher::new(registry, sm, minter(), Duration::from_millis(20));

        let outcome = dispatcher
            .start(created, &node, "s3://bundle".to_string(), Default::default())
            .await
            .unwrap();
        assert!(!outcome.was_sent(), "a full channel should time out, not block forever");
        assert_eq!(outcome.pod().status, PodStatus::Pending);
    }
}
