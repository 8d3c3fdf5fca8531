pub mod collection;
pub mod error;
pub mod record;
pub mod store;

pub use collection::{ChangeEvent, ChangeKind, Collection};
pub use error::Error;
pub use record::HasMeta;
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use orbiter_types::{Namespace, RecordMeta};

    fn ns(name: &str) -> Namespace {
        Namespace {
            meta: RecordMeta::new(),
            name: name.to_string(),
            labels: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = Store::new();
        let created = store.namespaces.create(ns("default")).await.unwrap();
        let fetched = store.namespaces.get_by_id(created.id()).await.unwrap();
        assert_eq!(fetched.name, "default");
        assert_eq!(fetched.meta.version, 0);
    }

    #[tokio::test]
    async fn update_bumps_version_and_rejects_stale_expected_version() {
        let store = Store::new();
        let created = store.namespaces.create(ns("default")).await.unwrap();
        let (updated, _) = store
            .namespaces
            .update(created.id(), 0, |n| n.name = "renamed".to_string())
            .await
            .unwrap();
        assert_eq!(updated.meta.version, 1);

        let conflict = store
            .namespaces
            .update(created.id(), 0, |n| n.name = "again".to_string())
            .await;
        assert!(matches!(conflict, Err(Error::Conflict)));
    }

    #[tokio::test]
    async fn delete_requires_current_version() {
        let store = Store::new();
        let created = store.namespaces.create(ns("default")).await.unwrap();
        assert!(matches!(
            store.namespaces.delete(created.id(), 5).await,
            Err(Error::Conflict)
        ));
        store.namespaces.delete(created.id(), 0).await.unwrap();
        assert!(matches!(
            store.namespaces.get_by_id(created.id()).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn incarnations_are_monotone_and_never_repeat() {
        let store = Store::new();
        let service_id = uuid::Uuid::new_v4();
        let a = store.next_incarnation(service_id).await;
        let b = store.next_incarnation(service_id).await;
        assert!(b > a);
    }

    #[tokio::test]
    async fn change_feed_emits_on_create_and_update() {
        let store = Store::new();
        let mut rx = store.namespaces.subscribe();
        let created = store.namespaces.create(ns("default")).await.unwrap();
        let evt = rx.recv().await.unwrap();
        assert_eq!(evt.id, created.id());
        assert_eq!(evt.kind, ChangeKind::Created);
    }
}
