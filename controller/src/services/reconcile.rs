use std::time::Duration;

use orbiter_registry::ConnectionRegistry;
use orbiter_statemachine::PodStateMachine;
use orbiter_store::Store;
use orbiter_types::{Pod, PodStatus, Service, StopReason};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::services::{actions, planner};

/// Everything one reconcile pass over one service needs. Cheap to clone —
/// every field is itself an `Arc`-backed handle.
#[derive(Clone)]
pub struct ReconcileContext {
    pub store: Store,
    pub registry: ConnectionRegistry,
    pub statemachine: PodStateMachine,
    pub dispatcher: orbiter_dispatcher::PodDispatcher,
    pub degraded_failure_threshold: u32,
    pub max_backoff: Duration,
}

/// Runs steps A-E of the reconciliation pass for one service. Any error
/// aborts the rest of this service's pass; the caller does not propagate
/// it to other services (spec §4.5).
pub async fn reconcile_service(ctx: &ReconcileContext, service_id: Uuid) -> Result<(), Error> {
    let service = ctx.store.services.get_by_id(service_id).await?;
    if service.status != orbiter_types::ServiceStatus::Active {
        return Ok(());
    }

    // Step A
    let service = actions::patch_follow_latest(&ctx.store, service).await?;

    // Step B
    let pods = ctx.store.pods_of_service(service.id()).await;
    let (active, stopping, _terminal) = partition_pods(pods);
    let on_version: Vec<Pod> = active
        .iter()
        .filter(|p| p.pack_version == service.pack_version)
        .cloned()
        .collect();
    let off_version: Vec<Pod> = active
        .into_iter()
        .filter(|p| p.pack_version != service.pack_version)
        .collect();

    let mut had_failure = false;
    let mut any_succeeded = false;

    // Step C: retire off-version pods.
    for pod in off_version.iter().cloned() {
        match actions::stop_pod(&ctx.dispatcher, pod, StopReason::RollingUpdate).await {
            Ok(sent) => {
                any_succeeded |= sent;
                had_failure |= !sent;
            }
            Err(err) if err_is_conflict(&err) => return Err(err),
            Err(err) => {
                warn!(service = %service.name, %err, "rolling-update stop failed");
                had_failure = true;
            }
        }
    }

    // Step D: converge replica count.
    let mut on_version = on_version;
    if service.is_daemon_set() {
        let (succ, fail, created) = converge_daemon_set(ctx, &service, &on_version).await?;
        any_succeeded |= succ;
        had_failure |= fail;
        on_version.extend(created);
    } else {
        let (succ, fail, new_on_version) =
            converge_deployment(ctx, &service, on_version.clone()).await?;
        any_succeeded |= succ;
        had_failure |= fail;
        on_version = new_on_version;
    }

    // Step E: write observed-state fields back.
    let ready = on_version
        .iter()
        .filter(|p| p.status == PodStatus::Running)
        .count() as u32;
    let updated_replicas = on_version.len() as u32;
    let desired = if service.is_daemon_set() {
        updated_replicas.max(ready)
    } else {
        service.replicas
    };
    let converged = off_version.is_empty() && stopping.is_empty() && updated_replicas >= desired;

    let next_failures =
        actions::next_failure_count(service.consecutive_failures, any_succeeded, had_failure);
    let degraded = next_failures >= ctx.degraded_failure_threshold;
    let next_observed_generation = if converged {
        service.generation
    } else {
        service.observed_generation
    };

    // Writing unconditionally here would bump the record version and emit
    // a `services` change-feed event on every pass, even in steady state —
    // the pool is subscribed to that same feed to wake between ticks, so a
    // no-op write would re-trigger itself forever (spec §5: no busy-wait).
    let observed_state_changed = service.ready_replicas != ready
        || service.available_replicas != ready
        || service.updated_replicas != updated_replicas
        || service.consecutive_failures != next_failures
        || service.degraded != degraded
        || service.observed_generation != next_observed_generation;

    if observed_state_changed {
        let expected_version = service.meta.version;
        ctx.store
            .services
            .update(service.id(), expected_version, |s| {
                s.ready_replicas = ready;
                s.available_replicas = ready;
                s.updated_replicas = updated_replicas;
                s.consecutive_failures = next_failures;
                s.degraded = degraded;
                s.observed_generation = next_observed_generation;
            })
            .await?;
    }

    if degraded {
        let backoff = actions::backoff_for(next_failures, ctx.max_backoff);
        info!(service = %service.name, ?backoff, "service degraded, backing off");
        tokio::time::sleep(backoff).await;
    }

    Ok(())
}

async fn converge_daemon_set(
    ctx: &ReconcileContext,
    service: &Service,
    on_version: &[Pod],
) -> Result<(bool, bool, Vec<Pod>), Error> {
    let pack = ctx
        .store
        .packs
        .get_by_id(service.pack_id)
        .await
        .map_err(|_| Error::PackNotFound {
            service_id: service.id(),
        })?;
    let nodes = ctx.store.online_nodes().await;
    let eligible = planner::eligible_nodes(&nodes, service, &pack);

    let covered: std::collections::HashSet<Uuid> = on_version
        .iter()
        .filter_map(|p| p.node_id)
        .filter(|id| eligible.iter().any(|n| n.id() == *id))
        .collect();

    let mut succeeded = false;
    let mut failed = false;
    let mut created_pods = Vec::new();
    for node in eligible.iter().filter(|n| !covered.contains(&n.id())) {
        match actions::create_and_start_pod(&ctx.store, &ctx.dispatcher, service, node).await {
            Ok((pod, sent)) => {
                succeeded |= sent;
                failed |= !sent;
                created_pods.push(pod);
            }
            Err(err) if err_is_conflict(&err) => return Err(err),
            Err(err) => {
                warn!(service = %service.name, %err, "daemonset pod create/start failed");
                failed = true;
            }
        }
    }
    Ok((succeeded, failed, created_pods))
}

async fn converge_deployment(
    ctx: &ReconcileContext,
    service: &Service,
    mut on_version: Vec<Pod>,
) -> Result<(bool, bool, Vec<Pod>), Error> {
    let desired = service.replicas;
    let current = on_version.len() as u32;

    let mut succeeded = false;
    let mut failed = false;

    if current < desired {
        let pack = ctx
            .store
            .packs
            .get_by_id(service.pack_id)
            .await
            .map_err(|_| Error::PackNotFound {
                service_id: service.id(),
            })?;
        let nodes = ctx.store.online_nodes().await;
        let to_create = desired - current;
        for _ in 0..to_create {
            let eligible = planner::eligible_nodes(&nodes, service, &pack);
            let Some(node) = planner::select_least_loaded(&eligible) else {
                warn!(service = %service.name, "no eligible node to schedule onto");
                failed = true;
                break;
            };
            match actions::create_and_start_pod(&ctx.store, &ctx.dispatcher, service, node).await
            {
                Ok((pod, sent)) => {
                    succeeded |= sent;
                    failed |= !sent;
                    on_version.push(pod);
                }
                Err(err) if err_is_conflict(&err) => return Err(err),
                Err(err) => {
                    warn!(service = %service.name, %err, "deployment pod create/start failed");
                    failed = true;
                }
            }
        }
    } else if current > desired {
        on_version.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let to_stop = (current - desired) as usize;
        let mut remaining = Vec::new();
        for (idx, pod) in on_version.into_iter().enumerate() {
            if idx < to_stop {
                match actions::stop_pod(&ctx.dispatcher, pod, StopReason::UserRequested).await {
                    Ok(sent) => {
                        succeeded |= sent;
                        failed |= !sent;
                    }
                    Err(err) if err_is_conflict(&err) => return Err(err),
                    Err(err) => {
                        warn!(service = %service.name, %err, "scale-down stop failed");
                        failed = true;
                    }
                }
            } else {
                remaining.push(pod);
            }
        }
        return Ok((succeeded, failed, remaining));
    }

    Ok((succeeded, failed, on_version))
}

fn partition_pods(pods: Vec<Pod>) -> (Vec<Pod>, Vec<Pod>, Vec<Pod>) {
    let mut active = Vec::new();
    let mut stopping = Vec::new();
    let mut terminal = Vec::new();
    for pod in pods {
        if pod.is_active() {
            active.push(pod);
        } else if pod.status == PodStatus::Stopping {
            stopping.push(pod);
        } else {
            terminal.push(pod);
        }
    }
    (active, stopping, terminal)
}

fn err_is_conflict(err: &Error) -> bool {
    err.is_conflict()
}
