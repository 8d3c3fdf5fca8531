use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use orbiter_common::response::{bad_request, internal_server_error, not_found};
use orbiter_store::ChangeKind;
use orbiter_types::{Pod, PodStatus, RecordMeta, StopReason};
use serde::Deserialize;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreatePodRequest {
    pub pack_id: Uuid,
    pub pack_version: semver::Version,
    pub namespace: String,
    #[serde(default)]
    pub node_id: Option<Uuid>,
    #[serde(default)]
    pub volume_mounts: Vec<String>,
}

/// `pod.create`: an ad-hoc pod independent of any service (`serviceId =
/// null`, `incarnation = 1`). If `nodeId` is supplied and the node is
/// reachable, the pod is dispatched immediately; otherwise it is left
/// `pending` for an operator (or a future API call) to place.
pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreatePodRequest>,
) -> Response {
    let pack = match state.store.packs.get_by_id(req.pack_id).await {
        Ok(p) => p,
        Err(_) => return bad_request(format!("no pack {}", req.pack_id)),
    };

    let pod = Pod {
        meta: RecordMeta::new(),
        service_id: None,
        pack_id: req.pack_id,
        pack_version: req.pack_version,
        node_id: req.node_id,
        namespace: req.namespace,
        status: PodStatus::Pending,
        status_message: None,
        incarnation: 1,
        created_at: Utc::now(),
        started_at: None,
        stopped_at: None,
        volume_mounts: req.volume_mounts,
    };

    let created = match state.store.pods.create(pod).await {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };

    tracing::info!(pod_id = %created.id(), caller_id = %ctx.caller_id, "pod.create");

    let Some(node_id) = created.node_id else {
        return (axum::http::StatusCode::CREATED, Json(created)).into_response();
    };
    let Ok(node) = state.store.nodes.get_by_id(node_id).await else {
        return bad_request(format!("no node {node_id}"));
    };

    match state
        .dispatcher
        .start(created, &node, pack.bundle_location, Default::default())
        .await
    {
        Ok(outcome) => (axum::http::StatusCode::CREATED, Json(outcome.pod().clone())).into_response(),
        Err(e) => internal_server_error(e),
    }
}

/// `pod.stop`: delegates to the Dispatcher with reason `user_requested`.
pub async fn stop(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let pod = match state.store.pods.get_by_id(id).await {
        Ok(p) => p,
        Err(_) => return not_found(format!("no pod {id}")),
    };

    match state.dispatcher.stop(pod, StopReason::UserRequested).await {
        Ok(outcome) => Json(outcome.pod().clone()).into_response(),
        Err(e) => internal_server_error(e),
    }
}

/// `pod.delete`: the source protocol conflates a DELETE and a POST-stop
/// endpoint. `pod.stop` remains the single canonical mutation; this alias
/// stops the pod, then waits on the pod collection's change-feed for it to
/// reach a terminal status before purging the record. Returns 202 with the
/// pod as left by `stop` — the purge itself happens in the background.
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let pod = match state.store.pods.get_by_id(id).await {
        Ok(p) => p,
        Err(_) => return not_found(format!("no pod {id}")),
    };

    let stopped = match state.dispatcher.stop(pod, StopReason::UserRequested).await {
        Ok(outcome) => outcome.pod().clone(),
        Err(e) => return internal_server_error(e),
    };

    if stopped.status.is_terminal() {
        purge(&state, stopped.id(), stopped.meta.version).await;
        return (axum::http::StatusCode::ACCEPTED, Json(stopped)).into_response();
    }

    let store = state.store.clone();
    let pod_id = stopped.id();
    tokio::spawn(async move {
        let mut changes = store.pods.subscribe();
        loop {
            let Ok(event) = changes.recv().await else {
                return;
            };
            if event.id != pod_id || event.kind == ChangeKind::Deleted {
                continue;
            }
            let Ok(current) = store.pods.get_by_id(pod_id).await else {
                return;
            };
            if current.status.is_terminal() {
                let _ = store.pods.delete(pod_id, current.meta.version).await;
                return;
            }
        }
    });

    (axum::http::StatusCode::ACCEPTED, Json(stopped)).into_response()
}

async fn purge(state: &AppState, id: Uuid, expected_version: u64) {
    if let Err(e) = state.store.pods.delete(id, expected_version).await {
        tracing::warn!(pod_id = %id, %e, "failed to purge pod after stop");
    }
}
