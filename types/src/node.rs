use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::pack::Labels;
use crate::record::RecordMeta;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Unknown,
    Online,
    Offline,
    Draining,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Node,
    Browser,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct ResourceQuantities {
    pub cpu: u64,
    pub memory: u64,
    pub pods: u64,
    pub storage: u64,
}

impl ResourceQuantities {
    /// `allocated.pods / allocatable.pods`, used by the least-loaded
    /// scheduling policy. Nodes with zero capacity sort last.
    pub fn pod_load_ratio(&self, allocatable: &ResourceQuantities) -> f64 {
        if allocatable.pods == 0 {
            f64::INFINITY
        } else {
            self.pods as f64 / allocatable.pods as f64
        }
    }
}

/// Mutable worker-agent record. A node is online iff the Connection
/// Registry holds a live handle under its `connection_id`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Node {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub runtime_type: RuntimeType,
    pub status: NodeStatus,
    pub connection_id: Option<Uuid>,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub taints: BTreeMap<String, String>,
    pub allocatable: ResourceQuantities,
    pub allocated: ResourceQuantities,
    pub machine_id: String,
    pub registered_by: Uuid,
}

impl Node {
    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online && self.connection_id.is_some()
    }
}
