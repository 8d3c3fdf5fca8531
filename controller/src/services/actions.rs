use chrono::Utc;
use orbiter_store::Store;
use orbiter_types::{Node, Pod, PodStatus, Service, StopReason};

use crate::error::Error;

/// Step A: if `followLatest`, re-resolve the service's pack version against
/// the latest version of the same pack name. Patches the service and
/// returns the refreshed record when the version changed, `None`
/// otherwise. The version change is what Step C reacts to.
pub async fn patch_follow_latest(store: &Store, service: Service) -> Result<Service, Error> {
    if !service.follow_latest {
        return Ok(service);
    }

    let current_pack = store
        .packs
        .get_by_id(service.pack_id)
        .await
        .map_err(|_| Error::PackNotFound {
            service_id: service.id(),
        })?;
    let latest = store.latest_pack_version(&current_pack.name).await;
    let Ok(latest) = latest else {
        return Ok(service);
    };

    if latest.version == service.pack_version {
        return Ok(service);
    }

    let expected_version = service.meta.version;
    let old_pair = (service.pack_id, service.pack_version.clone());
    let new_pack_id = latest.id();
    let new_pack_version = latest.version.clone();
    let (updated, _) = store
        .services
        .update(service.id(), expected_version, |s| {
            s.pack_history.push(old_pair.clone());
            s.pack_id = new_pack_id;
            s.pack_version = new_pack_version.clone();
            s.generation += 1;
        })
        .await?;
    Ok(updated)
}

/// Step C: retires one off-version pod via the dispatcher, folding the
/// reconcile loop's failure bookkeeping in: a send failure is recorded but
/// never aborts the pass.
pub async fn stop_pod(
    dispatcher: &orbiter_dispatcher::PodDispatcher,
    pod: Pod,
    reason: StopReason,
) -> Result<bool, Error> {
    let outcome = dispatcher.stop(pod, reason).await?;
    Ok(outcome.was_sent())
}

/// Step D: creates a new pod record bound to `node` in `pending`, then
/// asks the dispatcher to start it. Returns the pod as left by the
/// dispatcher (`starting` on success, `pending` if the node was
/// unreachable) alongside whether the send succeeded.
pub async fn create_and_start_pod(
    store: &Store,
    dispatcher: &orbiter_dispatcher::PodDispatcher,
    service: &Service,
    node: &Node,
) -> Result<(Pod, bool), Error> {
    let incarnation = store.next_incarnation(service.id()).await;
    let pod = Pod {
        meta: orbiter_types::RecordMeta::new(),
        service_id: Some(service.id()),
        pack_id: service.pack_id,
        pack_version: service.pack_version.clone(),
        node_id: Some(node.id()),
        namespace: service.namespace.clone(),
        status: PodStatus::Pending,
        status_message: None,
        incarnation,
        created_at: Utc::now(),
        started_at: None,
        stopped_at: None,
        volume_mounts: service.volume_mounts.clone(),
    };
    let created = store.pods.create(pod).await?;

    let env = service
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let pack = store.packs.get_by_id(service.pack_id).await?;
    let outcome = dispatcher
        .start(created, node, pack.bundle_location, env)
        .await?;
    let sent = outcome.was_sent();
    Ok((outcome.pod().clone(), sent))
}

/// Step E / failure semantics: increments or clears `consecutiveFailures`
/// and flips `degraded` once the threshold is crossed. A tick with at
/// least one successful dispatch clears the counter — a degraded service
/// is not a sticky state, it reflects the most recent run.
pub fn next_failure_count(previous: u32, any_dispatch_succeeded: bool, had_failure: bool) -> u32 {
    if any_dispatch_succeeded {
        0
    } else if had_failure {
        previous + 1
    } else {
        previous
    }
}

pub fn backoff_for(consecutive_failures: u32, max_backoff: std::time::Duration) -> std::time::Duration {
    if consecutive_failures == 0 {
        return std::time::Duration::ZERO;
    }
    let millis = 500u64.saturating_mul(1u64 << consecutive_failures.min(20));
    std::time::Duration::from_millis(millis).min(max_backoff)
}
