use serde::{Deserialize, Serialize};

use crate::pack::Labels;
use crate::record::RecordMeta;

/// A namespace groups services and pods for listing/filtering. It has no
/// reconciliation behavior of its own — it exists so `namespace` is a real,
/// validated indexed field rather than a bare string on every record.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Namespace {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
}
