#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] orbiter_store::Error),

    #[error(transparent)]
    Transition(#[from] orbiter_statemachine::ApplyError),
}

impl Error {
    /// `true` if a store write conflict is anywhere in this error, whether
    /// it surfaced directly or nested under a failed state transition.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Store(orbiter_store::Error::Conflict) => true,
            Error::Transition(e) => e.is_conflict(),
            _ => false,
        }
    }
}
