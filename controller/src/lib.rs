pub mod error;
pub mod pool;
pub mod services;

pub use error::Error;
pub use pool::ReconcilerPool;
pub use services::{reconcile_service, ReconcileContext};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use orbiter_dispatcher::{HmacCredentialMinter, PodDispatcher};
    use orbiter_registry::ConnectionRegistry;
    use orbiter_statemachine::PodStateMachine;
    use orbiter_store::Store;
    use orbiter_types::{
        Node, NodeStatus, Pack, RecordMeta, ResourceQuantities, RuntimeTag, RuntimeType, Service,
        ServiceStatus, Visibility,
    };
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn make_ctx(store: Store) -> ReconcileContext {
        let sm = PodStateMachine::new(store.clone());
        let registry = ConnectionRegistry::spawn(
            store.clone(),
            sm.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        let minter = Arc::new(HmacCredentialMinter::new(b"k".to_vec(), Duration::from_secs(60)));
        let dispatcher = PodDispatcher::new(registry.clone(), sm.clone(), minter, Duration::from_secs(5));
        ReconcileContext {
            store,
            registry,
            statemachine: sm,
            dispatcher,
            degraded_failure_threshold: 10,
            max_backoff: Duration::from_secs(60),
        }
    }

    async fn register_node(store: &Store, registry: &ConnectionRegistry) -> Node {
        let mut node = Node {
            meta: RecordMeta::new(),
            name: "n1".to_string(),
            runtime_type: RuntimeType::Node,
            status: NodeStatus::Online,
            connection_id: None,
            labels: Default::default(),
            taints: Default::default(),
            allocatable: ResourceQuantities {
                cpu: 8,
                memory: 8192,
                pods: 10,
                storage: 0,
            },
            allocated: ResourceQuantities::default(),
            machine_id: "m1".to_string(),
            registered_by: uuid::Uuid::new_v4(),
        };
        let (connection_id, _rx) = registry.register(node.id()).await;
        node.connection_id = Some(connection_id);
        store.nodes.create(node.clone()).await.unwrap();
        node
    }

    async fn seed_pack(store: &Store, version: &str) -> Pack {
        let pack = Pack {
            meta: RecordMeta::new(),
            name: "web".to_string(),
            version: semver::Version::parse(version).unwrap(),
            runtime_tag: RuntimeTag::Universal,
            owner_id: uuid::Uuid::new_v4(),
            visibility: Visibility::Public,
            bundle_location: "s3://bundle".to_string(),
            granted_capabilities: vec![],
        };
        store.packs.create(pack).await.unwrap()
    }

    async fn seed_service(store: &Store, pack: &Pack, replicas: u32) -> Service {
        let service = Service {
            meta: RecordMeta::new(),
            name: "web".to_string(),
            namespace: "default".to_string(),
            pack_id: pack.id(),
            pack_version: pack.version.clone(),
            follow_latest: false,
            replicas,
            status: ServiceStatus::Active,
            labels: Default::default(),
            pod_labels: Default::default(),
            tolerations: Default::default(),
            resource_requests: Default::default(),
            resource_limits: Default::default(),
            visibility: Visibility::Public,
            exposed: false,
            secrets: vec![],
            volume_mounts: vec![],
            generation: 1,
            observed_generation: 0,
            ready_replicas: 0,
            available_replicas: 0,
            updated_replicas: 0,
            consecutive_failures: 0,
            degraded: false,
            pack_history: vec![],
        };
        store.services.create(service).await.unwrap()
    }

    #[tokio::test]
    async fn deployment_scales_up_to_desired_replicas() {
        let store = Store::new();
        let ctx = make_ctx(store.clone());
        register_node(&store, &ctx.registry).await;
        let pack = seed_pack(&store, "1.0.0").await;
        let service = seed_service(&store, &pack, 2).await;

        reconcile_service(&ctx, service.id()).await.unwrap();

        let pods = store.pods_of_service(service.id()).await;
        assert_eq!(pods.len(), 2);
        for pod in &pods {
            assert!(matches!(
                pod.status,
                orbiter_types::PodStatus::Starting | orbiter_types::PodStatus::Pending
            ));
        }
    }

    #[tokio::test]
    async fn daemon_set_places_one_pod_per_eligible_node() {
        let store = Store::new();
        let ctx = make_ctx(store.clone());
        register_node(&store, &ctx.registry).await;
        register_node(&store, &ctx.registry).await;
        let pack = seed_pack(&store, "1.0.0").await;
        let service = seed_service(&store, &pack, 0).await;

        reconcile_service(&ctx, service.id()).await.unwrap();

        let pods = store.pods_of_service(service.id()).await;
        assert_eq!(pods.len(), 2);
    }

    #[tokio::test]
    async fn stopping_pods_do_not_block_new_scheduling() {
        let store = Store::new();
        let ctx = make_ctx(store.clone());
        let node = register_node(&store, &ctx.registry).await;
        let pack = seed_pack(&store, "1.0.0").await;
        let service = seed_service(&store, &pack, 1).await;

        let incarnation = store.next_incarnation(service.id()).await;
        let stopping_pod = orbiter_types::Pod {
            meta: RecordMeta::new(),
            service_id: Some(service.id()),
            pack_id: pack.id(),
            pack_version: pack.version.clone(),
            node_id: Some(node.id()),
            namespace: "default".to_string(),
            status: orbiter_types::PodStatus::Stopping,
            status_message: None,
            incarnation,
            created_at: chrono::Utc::now(),
            started_at: None,
            stopped_at: None,
            volume_mounts: vec![],
        };
        store.pods.create(stopping_pod).await.unwrap();

        reconcile_service(&ctx, service.id()).await.unwrap();

        let pods = store.pods_of_service(service.id()).await;
        let active_count = pods.iter().filter(|p| p.is_active()).count();
        assert_eq!(active_count, 1, "a new replacement pod must be scheduled despite the stopping pod");
    }
}
