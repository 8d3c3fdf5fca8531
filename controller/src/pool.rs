use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::{reconcile_service, ReconcileContext};

/// Bounded worker pool fanning one reconcile pass out over every active
/// service per tick. Woken by a fixed timer, an explicit
/// `trigger_reconcile`, and the store's own change-feed, so a mutation
/// doesn't have to wait out a full tick to be picked up. A single service
/// is reconciled by at most one in-flight pass at a time via a per-service
/// mutex; distinct services run concurrently up to `max_workers`.
pub struct ReconcilerPool {
    ctx: ReconcileContext,
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
    semaphore: Arc<Semaphore>,
    wake: Arc<Notify>,
    tick_interval: Duration,
    cancel: CancellationToken,
}

impl ReconcilerPool {
    pub fn new(
        ctx: ReconcileContext,
        max_workers: usize,
        tick_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            locks: Arc::new(Mutex::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            wake: Arc::new(Notify::new()),
            tick_interval,
            cancel,
        }
    }

    /// A handle other components (the API surface) can clone to wake the
    /// pool outside its fixed tick, without waiting on a reconcile pass.
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub async fn run(self) {
        info!("reconciler pool starting");
        let mut ticker = tokio::time::interval(self.tick_interval);
        let mut service_changes = self.ctx.store.services.subscribe();
        let mut pod_changes = self.ctx.store.pods.subscribe();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("reconciler pool shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.run_pass().await;
                }
                _ = self.wake.notified() => {
                    self.run_pass().await;
                }
                Ok(_) = service_changes.recv() => {
                    self.run_pass().await;
                }
                Ok(_) = pod_changes.recv() => {
                    self.run_pass().await;
                }
            }
        }
    }

    async fn run_pass(&self) {
        let services = self.ctx.store.active_services().await;
        metrics::gauge!("reconcile_pass_services").set(services.len() as f64);
        let mut handles = Vec::with_capacity(services.len());
        for service in services {
            let ctx = self.ctx.clone();
            let semaphore = self.semaphore.clone();
            let locks = self.locks.clone();
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                let service_lock = {
                    let mut guard = locks.lock().await;
                    guard
                        .entry(service.id())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .clone()
                };
                let _service_guard = service_lock.lock().await;
                let start = std::time::Instant::now();
                let result = reconcile_service(&ctx, service.id()).await;
                metrics::histogram!("reconcile_duration_seconds").record(start.elapsed().as_secs_f64());
                if let Err(err) = result {
                    metrics::counter!("reconcile_errors_total").increment(1);
                    warn!(service = %service.name, %err, "reconcile pass failed");
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}
