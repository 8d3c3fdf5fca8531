use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use orbiter_types::{Namespace, Node, Pack, Pod, Service};

use crate::collection::Collection;
use crate::error::Error;

/// The four (five, with namespaces) named, indexed collections spec §6
/// describes, bundled behind one handle so every component is constructed
/// from a single `Store::new()`/`Store::clone()`. The store never caches
/// anything beyond the lifetime of one call — every read goes through the
/// underlying `Collection`.
#[derive(Clone)]
pub struct Store {
    pub packs: Collection<Pack>,
    pub services: Collection<Service>,
    pub pods: Collection<Pod>,
    pub nodes: Collection<Node>,
    pub namespaces: Collection<Namespace>,
    incarnations: Arc<RwLock<HashMap<Uuid, u64>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            packs: Collection::new(),
            services: Collection::new(),
            pods: Collection::new(),
            nodes: Collection::new(),
            namespaces: Collection::new(),
            incarnations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Allocates the next `incarnation` for a service's pod slot. Callers
    /// must persist the returned value on the pod they create; the counter
    /// only ever increases, so it survives pod deletion.
    pub async fn next_incarnation(&self, service_id: Uuid) -> u64 {
        let mut guard = self.incarnations.write().await;
        let slot = guard.entry(service_id).or_insert(0);
        *slot += 1;
        *slot
    }

    pub async fn pack_by_name_version(
        &self,
        name: &str,
        version: &semver::Version,
    ) -> Result<Pack, Error> {
        self.packs
            .list_where(|p| p.name == name && &p.version == version)
            .await
            .into_iter()
            .next()
            .ok_or(Error::NotFound)
    }

    /// "Latest" is the lexicographic-semver maximum among records matching
    /// `name` — visibility filtering is the API surface's job, not the
    /// store's.
    pub async fn latest_pack_version(&self, name: &str) -> Result<Pack, Error> {
        self.packs
            .list_where(|p| p.name == name)
            .await
            .into_iter()
            .max_by(|a, b| a.version.cmp(&b.version))
            .ok_or(Error::NotFound)
    }

    pub async fn service_by_name_namespace(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Service, Error> {
        self.services
            .list_where(|s| s.name == name && s.namespace == namespace)
            .await
            .into_iter()
            .next()
            .ok_or(Error::NotFound)
    }

    pub async fn active_services(&self) -> Vec<Service> {
        self.services
            .list_where(|s| s.status == orbiter_types::ServiceStatus::Active)
            .await
    }

    pub async fn pods_of_service(&self, service_id: Uuid) -> Vec<Pod> {
        self.pods
            .list_where(|p| p.service_id == Some(service_id))
            .await
    }

    pub async fn pods_on_node(&self, node_id: Uuid) -> Vec<Pod> {
        self.pods.list_where(|p| p.node_id == Some(node_id)).await
    }

    pub async fn online_nodes(&self) -> Vec<Node> {
        self.nodes.list_where(Node::is_online).await
    }
}
