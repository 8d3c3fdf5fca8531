pub mod context;
pub mod pod;
pub mod service;
pub mod state;

use axum::Router;
use axum::routing::{get, patch, post};

pub use state::AppState;

/// The whole API surface: a flat `Router` over `service.*`/`pod.*`
/// mutations, each a direct store write followed by a reconciler wake.
/// No inline reconciliation ever happens on this request path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/services", post(service::create))
        .route("/services/{id}/scale", patch(service::scale))
        .route("/services/{id}/pause", post(service::pause))
        .route("/services/{id}/resume", post(service::resume))
        .route("/services/{id}/rollback", post(service::rollback))
        .route("/pods", post(pod::create))
        .route("/pods/{id}/stop", post(pod::stop))
        .route("/pods/{id}", axum::routing::delete(pod::delete))
        .with_state(state)
        .layer(orbiter_common::cors::dev())
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use orbiter_dispatcher::{HmacCredentialMinter, PodDispatcher};
    use orbiter_registry::ConnectionRegistry;
    use orbiter_statemachine::PodStateMachine;
    use orbiter_store::Store;
    use orbiter_types::{Pack, RecordMeta, RuntimeTag, Visibility};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let store = Store::new();
        let sm = PodStateMachine::new(store.clone());
        let registry = ConnectionRegistry::spawn(
            store.clone(),
            sm.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        let minter = Arc::new(HmacCredentialMinter::new(b"k".to_vec(), Duration::from_secs(60)));
        let dispatcher = PodDispatcher::new(registry, sm, minter, Duration::from_secs(5));
        AppState::new(store, dispatcher, Arc::new(Notify::new()))
    }

    async fn seed_pack(state: &AppState) -> Pack {
        state
            .store
            .packs
            .create(Pack {
                meta: RecordMeta::new(),
                name: "echo".to_string(),
                version: semver::Version::new(0, 1, 0),
                runtime_tag: RuntimeTag::Universal,
                owner_id: uuid::Uuid::new_v4(),
                visibility: Visibility::Public,
                bundle_location: "s3://echo".to_string(),
                granted_capabilities: vec![],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_service_rejects_unknown_pack() {
        let state = test_state();
        let app = router(state);
        let body = serde_json::json!({
            "name": "svc",
            "namespace": "default",
            "pack_id": uuid::Uuid::new_v4(),
            "pack_version": "0.1.0",
            "replicas": 1,
            "visibility": "public",
        });
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/services")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_service_writes_generation_one() {
        let state = test_state();
        let pack = seed_pack(&state).await;
        let app = router(state);
        let body = serde_json::json!({
            "name": "svc",
            "namespace": "default",
            "pack_id": pack.id(),
            "pack_version": "0.1.0",
            "replicas": 1,
            "visibility": "public",
        });
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/services")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), axum::http::StatusCode::CREATED);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let created: orbiter_types::Service = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(created.generation, 1);
        assert_eq!(created.observed_generation, 0);
    }

    #[tokio::test]
    async fn stop_unknown_pod_is_not_found() {
        let state = test_state();
        let app = router(state);
        let req = axum::http::Request::builder()
            .method("POST")
            .uri(format!("/pods/{}/stop", uuid::Uuid::new_v4()))
            .body(axum::body::Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stop_moves_pod_to_stopping() {
        let state = test_state();
        let pod = state
            .store
            .pods
            .create(orbiter_types::Pod {
                meta: RecordMeta::new(),
                service_id: None,
                pack_id: uuid::Uuid::new_v4(),
                pack_version: semver::Version::new(0, 1, 0),
                node_id: None,
                namespace: "default".to_string(),
                status: orbiter_types::PodStatus::Running,
                status_message: None,
                incarnation: 1,
                created_at: Utc::now(),
                started_at: None,
                stopped_at: None,
                volume_mounts: vec![],
            })
            .await
            .unwrap();
        let app = router(state);
        let req = axum::http::Request::builder()
            .method("POST")
            .uri(format!("/pods/{}/stop", pod.id()))
            .body(axum::body::Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), axum::http::StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let stopped: orbiter_types::Pod = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stopped.status, orbiter_types::PodStatus::Stopping);
    }
}
