use owo_colors::OwoColorize;

pub mod args;
pub mod cors;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod response;
pub mod shutdown;

/// Installs process-wide ambient state: color support detection and the
/// `tracing` subscriber. Call once at the top of `main`.
pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

pub fn print_startup_banner(component: &str) {
    println!("{}", format!("starting {component}").green());
}

pub fn print_shutdown_banner(component: &str) {
    println!("{}", format!("{component} stopped gracefully").red());
}
