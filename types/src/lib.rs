pub mod namespace;
pub mod node;
pub mod pack;
pub mod pod;
pub mod protocol;
pub mod record;
pub mod service;

pub use namespace::Namespace;
pub use node::{Node, NodeStatus, ResourceQuantities, RuntimeType};
pub use pack::{Labels, Pack, PackRef, RuntimeTag, Visibility};
pub use pod::{Pod, PodStatus, StopReason};
pub use protocol::{AgentFrame, Envelope, PlaneFrame};
pub use record::RecordMeta;
pub use service::{ResourceList, Service, ServiceStatus};
