use clap::Parser;

/// The environment knobs named in the control plane's external-interfaces
/// contract: tick interval, heartbeat timeout multiplier, dispatcher
/// deadline, consecutive-failure threshold, and max exponential backoff.
#[derive(Parser, Debug, Clone)]
pub struct ReconcilerArgs {
    /// Fixed reconcile tick interval, in milliseconds.
    #[arg(long, env = "RECONCILE_TICK_MS", default_value_t = 2000)]
    pub tick_ms: u64,

    /// Agent heartbeat interval, in seconds.
    #[arg(long, env = "HEARTBEAT_INTERVAL_SECS", default_value_t = 15)]
    pub heartbeat_interval_secs: u64,

    /// Heartbeat timeout multiplier: a node is released after this many
    /// missed heartbeat intervals.
    #[arg(long, env = "HEARTBEAT_TIMEOUT_MULTIPLIER", default_value_t = 3)]
    pub heartbeat_timeout_multiplier: u32,

    /// Deadline for a single dispatcher send or store operation, in
    /// milliseconds.
    #[arg(long, env = "DISPATCHER_DEADLINE_MS", default_value_t = 5000)]
    pub dispatcher_deadline_ms: u64,

    /// Consecutive dispatch failures before a service is marked degraded.
    #[arg(long, env = "DEGRADED_FAILURE_THRESHOLD", default_value_t = 10)]
    pub degraded_failure_threshold: u32,

    /// Maximum exponential backoff applied to a degraded service's
    /// reconcile attempts, in milliseconds.
    #[arg(long, env = "MAX_BACKOFF_MS", default_value_t = 60_000)]
    pub max_backoff_ms: u64,

    /// Maximum number of services reconciled concurrently in one tick.
    #[arg(long, env = "MAX_RECONCILE_WORKERS", default_value_t = 16)]
    pub max_workers: usize,
}

impl ReconcilerArgs {
    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_ms)
    }

    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> std::time::Duration {
        self.heartbeat_interval() * self.heartbeat_timeout_multiplier
    }

    pub fn dispatcher_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.dispatcher_deadline_ms)
    }

    pub fn max_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.max_backoff_ms)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ServerArgs {
    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[clap(flatten)]
    pub reconciler: ReconcilerArgs,
}
