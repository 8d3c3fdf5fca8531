//! Node-agent wire protocol message types.
//!
//! The source protocol is "frames are JSON objects with `type`, `payload`,
//! and optional `correlationId`" — the idiomatic Rust rendering of that is
//! a single `#[serde(tag = "type", content = "payload")]` enum per
//! direction, so an unrecognized frame is a deserialization error instead
//! of a runtime string-key lookup, and handling a frame is an exhaustive
//! match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::node::ResourceQuantities;
use crate::pack::Labels;
use crate::pod::{PodStatus, StopReason};

/// A frame sent by a node agent to the control plane.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AgentFrame {
    #[serde(rename = "node:register")]
    NodeRegister {
        name: String,
        runtime_type: crate::node::RuntimeType,
        #[serde(default)]
        labels: Labels,
        #[serde(default)]
        taints: BTreeMap<String, String>,
        allocatable: ResourceQuantities,
    },
    #[serde(rename = "node:heartbeat")]
    NodeHeartbeat {
        timestamp: chrono::DateTime<chrono::Utc>,
        allocated: ResourceQuantities,
    },
    #[serde(rename = "pod:status")]
    PodStatus {
        pod_id: Uuid,
        incarnation: u64,
        status: PodStatus,
        message: Option<String>,
    },
}

/// A frame sent by the control plane to a node agent.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PlaneFrame {
    #[serde(rename = "pod:start")]
    PodStart {
        pod_id: Uuid,
        pack_id: Uuid,
        pack_version: semver::Version,
        bundle_location: String,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default)]
        volume_mounts: Vec<String>,
        credential: String,
    },
    #[serde(rename = "pod:stop")]
    PodStop { pod_id: Uuid, reason: StopReason },
    #[serde(rename = "auth:token-refreshed")]
    AuthTokenRefreshed { pod_id: Uuid, token: String },
}

/// Envelope wrapping a frame with an optional correlation id, matching the
/// source protocol's `{type, payload, correlationId}` shape once a frame is
/// serialized.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Envelope<F> {
    #[serde(flatten)]
    pub frame: F,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl<F> Envelope<F> {
    pub fn new(frame: F) -> Self {
        Self {
            frame,
            correlation_id: None,
        }
    }

    pub fn with_correlation(frame: F, correlation_id: Uuid) -> Self {
        Self {
            frame,
            correlation_id: Some(correlation_id),
        }
    }
}
