use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use orbiter_common::args::ServerArgs;
use orbiter_common::shutdown::shutdown_signal;
use orbiter_controller::{ReconcileContext, ReconcilerPool};
use orbiter_dispatcher::{CredentialMinter, HmacCredentialMinter, PodDispatcher};
use orbiter_registry::ConnectionRegistry;
use orbiter_statemachine::PodStateMachine;
use orbiter_store::Store;
use owo_colors::OwoColorize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
struct Cli {
    #[clap(flatten)]
    server: ServerArgs,

    /// HMAC signing key for pod credentials. A random key is generated at
    /// startup if omitted, which means previously issued credentials stop
    /// verifying across a restart — set this explicitly for anything
    /// longer-lived than a dev session.
    #[arg(long, env = "CREDENTIAL_SECRET")]
    credential_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    orbiter_common::init();
    orbiter_common::print_startup_banner("orbiter control plane");
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let args = cli.server;
    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_cancel.cancel();
    });

    orbiter_common::metrics::maybe_spawn_metrics_server(args.metrics_port, cancel.clone());

    let store = Store::new();
    let statemachine = PodStateMachine::new(store.clone());
    let registry = ConnectionRegistry::spawn(
        store.clone(),
        statemachine.clone(),
        args.reconciler.heartbeat_interval(),
        args.reconciler.heartbeat_timeout(),
        cancel.clone(),
    );

    let secret = cli
        .credential_secret
        .map(String::into_bytes)
        .unwrap_or_else(random_secret);
    let minter: Arc<dyn CredentialMinter> = Arc::new(HmacCredentialMinter::new(
        secret,
        args.reconciler.dispatcher_deadline(),
    ));
    let dispatcher = PodDispatcher::new(
        registry.clone(),
        statemachine.clone(),
        minter,
        args.reconciler.dispatcher_deadline(),
    );

    let reconcile_ctx = ReconcileContext {
        store: store.clone(),
        registry,
        statemachine,
        dispatcher: dispatcher.clone(),
        degraded_failure_threshold: args.reconciler.degraded_failure_threshold,
        max_backoff: args.reconciler.max_backoff(),
    };
    let pool = ReconcilerPool::new(
        reconcile_ctx,
        args.reconciler.max_workers,
        args.reconciler.tick_duration(),
        cancel.clone(),
    );
    let waker = pool.waker();
    let pool_join = tokio::spawn(pool.run());

    let app_state = orbiter_api::AppState::new(store, dispatcher, waker);
    let router = orbiter_api::router(app_state);
    let addr = format!("0.0.0.0:{}", args.http_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind http server to {addr}"))?;
    println!("{}", format!("http api listening on {addr}").green());
    let http_cancel = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { http_cancel.cancelled().await })
        .await
        .context("http api server failed")?;

    cancel.cancel();
    pool_join.await.context("reconciler pool task failed")?;
    orbiter_common::print_shutdown_banner("orbiter control plane");
    Ok(())
}

fn random_secret() -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}
