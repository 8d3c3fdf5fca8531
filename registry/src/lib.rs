pub mod error;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use orbiter_statemachine::PodStateMachine;
use orbiter_store::Store;
use orbiter_types::{Envelope, NodeStatus, PlaneFrame};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub use error::Error;

struct Connection {
    node_id: Uuid,
    sender: mpsc::Sender<Envelope<PlaneFrame>>,
    last_heartbeat: DateTime<Utc>,
}

struct Inner {
    connections: Mutex<HashMap<Uuid, Connection>>,
    by_node: Mutex<HashMap<Uuid, Uuid>>,
    store: Store,
    statemachine: PodStateMachine,
    heartbeat_timeout: Duration,
}

/// In-memory node-id -> connection-handle map, plus the background sweep
/// that releases connections whose heartbeat has gone quiet. A node counts
/// as online (`Node::is_online`) only while this registry holds a live
/// handle for it.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<Inner>,
}

impl ConnectionRegistry {
    /// Builds the registry and starts its heartbeat-timeout sweeper as a
    /// detached task tied to `cancel`.
    pub fn spawn(
        store: Store,
        statemachine: PodStateMachine,
        sweep_interval: Duration,
        heartbeat_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let registry = Self {
            inner: Arc::new(Inner {
                connections: Mutex::new(HashMap::new()),
                by_node: Mutex::new(HashMap::new()),
                store,
                statemachine,
                heartbeat_timeout,
            }),
        };
        registry.clone().spawn_sweeper(sweep_interval, cancel);
        registry
    }

    fn spawn_sweeper(self, interval: Duration, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("connection registry sweeper shutting down");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.sweep_expired().await;
                    }
                }
            }
        });
    }

    async fn sweep_expired(&self) {
        let now = Utc::now();
        let timeout = chrono_duration(self.inner.heartbeat_timeout);
        let expired: Vec<Uuid> = {
            let conns = self.inner.connections.lock().await;
            conns
                .iter()
                .filter(|(_, c)| now.signed_duration_since(c.last_heartbeat) > timeout)
                .map(|(id, _)| *id)
                .collect()
        };
        for connection_id in expired {
            warn!(%connection_id, "connection heartbeat timed out, releasing");
            self.release(connection_id).await;
        }
    }

    /// Registers a new live connection for `node_id`, returning the
    /// connection id and the receiving half the caller's send loop drains.
    pub async fn register(&self, node_id: Uuid) -> (Uuid, mpsc::Receiver<Envelope<PlaneFrame>>) {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(64);
        {
            let mut conns = self.inner.connections.lock().await;
            conns.insert(
                connection_id,
                Connection {
                    node_id,
                    sender,
                    last_heartbeat: Utc::now(),
                },
            );
        }
        {
            let mut by_node = self.inner.by_node.lock().await;
            by_node.insert(node_id, connection_id);
        }
        (connection_id, receiver)
    }

    pub async fn heartbeat(&self, connection_id: Uuid) -> Result<(), Error> {
        let mut conns = self.inner.connections.lock().await;
        let conn = conns
            .get_mut(&connection_id)
            .ok_or(Error::Offline(connection_id))?;
        conn.last_heartbeat = Utc::now();
        Ok(())
    }

    /// Sends `frame` to the node currently holding `node_id`'s connection.
    /// Fails with `Error::Offline` if the node has no live handle, or if
    /// its channel is closed (the agent's send loop exited without
    /// releasing — treated the same as offline).
    pub async fn send(&self, node_id: Uuid, frame: Envelope<PlaneFrame>) -> Result<(), Error> {
        let connection_id = {
            let by_node = self.inner.by_node.lock().await;
            *by_node.get(&node_id).ok_or(Error::Offline(node_id))?
        };
        let sender = {
            let conns = self.inner.connections.lock().await;
            conns
                .get(&connection_id)
                .map(|c| c.sender.clone())
                .ok_or(Error::Offline(node_id))?
        };
        sender.send(frame).await.map_err(|_| Error::Offline(node_id))
    }

    /// Drops the connection, marks the node offline in the store, and
    /// reaps every pod still scheduled there (spec §4.4).
    pub async fn release(&self, connection_id: Uuid) {
        let node_id = {
            let mut conns = self.inner.connections.lock().await;
            conns.remove(&connection_id).map(|c| c.node_id)
        };
        let Some(node_id) = node_id else { return };
        {
            let mut by_node = self.inner.by_node.lock().await;
            if by_node.get(&node_id) == Some(&connection_id) {
                by_node.remove(&node_id);
            }
        }

        if let Ok(node) = self.inner.store.nodes.get_by_id(node_id).await {
            let expected_version = node.meta.version;
            if let Err(err) = self
                .inner
                .store
                .nodes
                .update(node_id, expected_version, |n| {
                    n.status = NodeStatus::Offline;
                    n.connection_id = None;
                })
                .await
            {
                warn!(%node_id, %err, "failed marking node offline after connection release");
            }
        }

        for result in self.inner.statemachine.reap_node_offline(node_id).await {
            if let Err(err) = result {
                warn!(%node_id, %err, "failed reaping pod on offline node");
            }
        }
    }

    pub async fn is_online(&self, node_id: Uuid) -> bool {
        self.inner.by_node.lock().await.contains_key(&node_id)
    }

    pub async fn snapshot_online(&self) -> Vec<Uuid> {
        self.inner.by_node.lock().await.keys().copied().collect()
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}
