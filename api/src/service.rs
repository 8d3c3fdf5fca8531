use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use orbiter_common::response::{bad_request, conflict, not_found};
use orbiter_types::{Labels, RecordMeta, ResourceList, Service, ServiceStatus, Visibility};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub namespace: String,
    pub pack_id: Uuid,
    pub pack_version: semver::Version,
    #[serde(default)]
    pub follow_latest: bool,
    pub replicas: u32,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub pod_labels: Labels,
    #[serde(default)]
    pub tolerations: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_requests: ResourceList,
    #[serde(default)]
    pub resource_limits: ResourceList,
    pub visibility: Visibility,
    #[serde(default)]
    pub exposed: bool,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub volume_mounts: Vec<String>,
}

/// `service.create`: validates the pack reference up front so a typo in
/// `packId` surfaces as a 400 instead of waiting for the first reconcile
/// pass to discover it.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateServiceRequest>,
) -> Response {
    if state.store.packs.get_by_id(req.pack_id).await.is_err() {
        return bad_request(format!("no pack {}", req.pack_id));
    }

    let service = Service {
        meta: RecordMeta::new(),
        name: req.name,
        namespace: req.namespace,
        pack_id: req.pack_id,
        pack_version: req.pack_version,
        follow_latest: req.follow_latest,
        replicas: req.replicas,
        status: ServiceStatus::Active,
        labels: req.labels,
        pod_labels: req.pod_labels,
        tolerations: req.tolerations,
        resource_requests: req.resource_requests,
        resource_limits: req.resource_limits,
        visibility: req.visibility,
        exposed: req.exposed,
        secrets: req.secrets,
        volume_mounts: req.volume_mounts,
        generation: 1,
        observed_generation: 0,
        ready_replicas: 0,
        available_replicas: 0,
        updated_replicas: 0,
        consecutive_failures: 0,
        degraded: false,
        pack_history: Vec::new(),
    };

    match state.store.services.create(service).await {
        Ok(created) => {
            state.trigger_reconcile();
            (axum::http::StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => bad_request(e),
    }
}

#[derive(Deserialize)]
pub struct ScaleRequest {
    pub replicas: u32,
    pub expected_version: u64,
}

/// `service.scale`: patches `replicas` and bumps `generation` so the
/// reconciler's convergence check (`observedGeneration < generation`)
/// picks the change up on the very next pass.
pub async fn scale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ScaleRequest>,
) -> Response {
    let result = state
        .store
        .services
        .update(id, req.expected_version, |s| {
            s.replicas = req.replicas;
            s.generation += 1;
        })
        .await;

    match result {
        Ok((updated, ())) => {
            state.trigger_reconcile();
            Json(updated).into_response()
        }
        Err(orbiter_store::Error::NotFound) => not_found(format!("no service {id}")),
        Err(orbiter_store::Error::Conflict) => conflict("service was modified concurrently"),
        Err(e) => bad_request(e),
    }
}

#[derive(Deserialize)]
pub struct ExpectedVersion {
    pub expected_version: u64,
}

async fn set_status(
    state: &AppState,
    id: Uuid,
    expected_version: u64,
    to: ServiceStatus,
) -> Response {
    let result = state
        .store
        .services
        .update(id, expected_version, |s| {
            s.status = to;
        })
        .await;

    match result {
        Ok((updated, ())) => {
            state.trigger_reconcile();
            Json(updated).into_response()
        }
        Err(orbiter_store::Error::NotFound) => not_found(format!("no service {id}")),
        Err(orbiter_store::Error::Conflict) => conflict("service was modified concurrently"),
        Err(e) => bad_request(e),
    }
}

/// `service.pause`: flips `status` to `paused`. The reconciler's
/// `active_services()` query stops returning this service, so no pod of
/// it is touched again until `resume`.
pub async fn pause(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExpectedVersion>,
) -> Response {
    set_status(&state, id, req.expected_version, ServiceStatus::Paused).await
}

/// `service.resume`: flips `status` back to `active`.
pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExpectedVersion>,
) -> Response {
    set_status(&state, id, req.expected_version, ServiceStatus::Active).await
}

/// `service.rollback`: pops the most recent `(packId, packVersion)` off
/// `packHistory` and patches the service back onto it. Returns 400 if the
/// service has never rolled a version forward.
pub async fn rollback(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let service = match state.store.services.get_by_id(id).await {
        Ok(s) => s,
        Err(_) => return not_found(format!("no service {id}")),
    };

    let Some((prior_pack_id, prior_version)) = service.pack_history.last().cloned() else {
        return bad_request(format!("service {id} has no prior pack version to roll back to"));
    };

    let result = state
        .store
        .services
        .update(id, service.meta.version, |s| {
            s.pack_history.pop();
            s.pack_id = prior_pack_id;
            s.pack_version = prior_version;
            s.generation += 1;
        })
        .await;

    match result {
        Ok((updated, ())) => {
            state.trigger_reconcile();
            Json(updated).into_response()
        }
        Err(orbiter_store::Error::Conflict) => conflict("service was modified concurrently"),
        Err(e) => bad_request(e),
    }
}
