use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::pack::{Labels, Visibility};
use crate::record::RecordMeta;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Active,
    Paused,
    Deleting,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct ResourceList {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
}

/// Declarative desired state for a set of pods. `replicas == 0` means this
/// service is a DaemonSet (one pod per eligible node); `replicas > 0` means
/// a Deployment (exactly that many pods, scheduler-placed).
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Service {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub namespace: String,
    pub pack_id: Uuid,
    pub pack_version: semver::Version,
    #[serde(default)]
    pub follow_latest: bool,
    pub replicas: u32,
    pub status: ServiceStatus,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub pod_labels: Labels,
    #[serde(default)]
    pub tolerations: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_requests: ResourceList,
    #[serde(default)]
    pub resource_limits: ResourceList,
    pub visibility: Visibility,
    #[serde(default)]
    pub exposed: bool,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub volume_mounts: Vec<String>,

    /// Bumped by the API surface on any desired-state mutation (scale,
    /// rollback, followLatest pack-version change). The reconciler only
    /// advances `observed_generation` to match once convergence finishes.
    #[serde(default)]
    pub generation: u64,
    #[serde(default)]
    pub observed_generation: u64,
    #[serde(default)]
    pub ready_replicas: u32,
    #[serde(default)]
    pub available_replicas: u32,
    #[serde(default)]
    pub updated_replicas: u32,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub degraded: bool,

    /// `(packId, packVersion)` this service was last scaled down from, so
    /// `service.rollback` has something to restore.
    #[serde(default)]
    pub pack_history: Vec<(Uuid, semver::Version)>,
}

impl Service {
    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    pub fn is_daemon_set(&self) -> bool {
        self.replicas == 0
    }
}
