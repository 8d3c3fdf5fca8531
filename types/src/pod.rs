use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::RecordMeta;

/// The closed pod status set. Adding a variant is a control-plane breaking
/// change: every match on this type must be updated, starting with
/// `orbiter_statemachine::transition`'s transition table.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    Pending,
    Scheduled,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
    Evicted,
}

impl PodStatus {
    pub const TERMINAL: [PodStatus; 3] = [PodStatus::Stopped, PodStatus::Failed, PodStatus::Evicted];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    /// A pod is active iff non-terminal and *not* `stopping`. `stopping` is
    /// deliberately excluded: if it counted, a rolling update would
    /// deadlock, since no replacement would ever be scheduled while the
    /// pod being retired still "counts".
    pub fn is_active(self) -> bool {
        matches!(
            self,
            PodStatus::Pending | PodStatus::Scheduled | PodStatus::Starting | PodStatus::Running
        )
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    UserRequested,
    RollingUpdate,
    NodeDrain,
    Evicted,
    ServiceDeleted,
}

/// One execution of a pack on one node.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Pod {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub service_id: Option<Uuid>,
    pub pack_id: Uuid,
    pub pack_version: semver::Version,
    pub node_id: Option<Uuid>,
    pub namespace: String,
    pub status: PodStatus,
    pub status_message: Option<String>,
    /// Monotone counter per `service_id`; `(service_id, incarnation)` is
    /// unique and seals out replays of stale node reports.
    pub incarnation: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub volume_mounts: Vec<String>,
}

impl Pod {
    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
