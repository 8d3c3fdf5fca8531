#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] orbiter_store::Error),

    #[error(transparent)]
    Dispatch(#[from] orbiter_dispatcher::Error),

    #[error("no pack found for service {service_id}")]
    PackNotFound { service_id: uuid::Uuid },
}

impl Error {
    /// A `Conflict` from the store aborts the current service's pass; the
    /// next tick retries from a fresh read (spec §4.5 failure semantics).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Store(orbiter_store::Error::Conflict) => true,
            Error::Dispatch(e) => e.is_conflict(),
            Error::PackNotFound { .. } => false,
        }
    }
}
