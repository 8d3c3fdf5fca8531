use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::record::RecordMeta;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeTag {
    Node,
    Browser,
    Universal,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    System,
}

/// Immutable, content-addressed code bundle. Uniqueness is `(name, version)`
/// as well as `id`; uniqueness is enforced by the store, not by this type.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Pack {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub version: semver::Version,
    pub runtime_tag: RuntimeTag,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    pub bundle_location: String,
    #[serde(default)]
    pub granted_capabilities: Vec<String>,
}

impl Pack {
    pub fn id(&self) -> Uuid {
        self.meta.id
    }
}

/// A `(name, version)` pair — the identity a `followLatest` service tracks.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PackRef {
    pub pack_id: Uuid,
    pub pack_version: semver::Version,
}

pub type Labels = BTreeMap<String, String>;
