use axum::{Router, routing::get};
use owo_colors::OwoColorize;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn install_recorder_once() -> &'static PrometheusHandle {
    PROM_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("install global metrics recorder")
    })
}

/// Spawns the `/healthz`, `/readyz`, `/metrics` server if `port` is set.
/// Installs the global Prometheus recorder exactly once even if called
/// more than once.
pub fn maybe_spawn_metrics_server(port: Option<u16>, cancel: CancellationToken) {
    let Some(port) = port else {
        return;
    };
    let handle = install_recorder_once().clone();
    tokio::spawn(run_metrics_server(port, handle, cancel));
}

async fn run_metrics_server(port: u16, handle: PrometheusHandle, cancel: CancellationToken) {
    let metrics_route = get(move || {
        let handle = handle.clone();
        async move { handle.render() }
    });
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .route("/metrics", metrics_route);
    let addr = format!("0.0.0.0:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", format!("failed to bind metrics server to {addr}: {e}").red());
            return;
        }
    };
    println!("{}", format!("metrics server listening on {addr}").green());
    let started = Instant::now();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .expect("serve metrics");
    println!(
        "{}",
        format!("metrics server stopped, uptime {:.2?}", started.elapsed()).red()
    );
}
