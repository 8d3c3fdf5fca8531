use owo_colors::OwoColorize;

/// Resolves once the process receives a shutdown signal (SIGINT/SIGTERM on
/// Unix, Ctrl+C elsewhere). Every binary spawns this once and cancels a
/// shared `CancellationToken` from it.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv()  => eprintln!("{}", "stopping: received SIGINT".red()),
            _ = sigterm.recv() => eprintln!("{}", "stopping: received SIGTERM".red()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
    }
}
