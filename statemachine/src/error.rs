#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The node report's incarnation does not match the pod's current
    /// incarnation — a replay of a stale report. Not fatal: the agent will
    /// re-report against the current incarnation if it's still alive.
    #[error("incarnation mismatch: pod has {current}, report carried {reported}")]
    IncarnationMismatch { current: u64, reported: u64 },

    /// The transition table has no edge `from -> to`. Not fatal: logged at
    /// warn and ignored, per spec §7.
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidEdge {
        from: orbiter_types::PodStatus,
        to: orbiter_types::PodStatus,
    },
}

impl TransitionError {
    /// Both variants are `InvalidTransition` from the caller's point of
    /// view: logged at warn level and ignored, never surfaced as a hard
    /// failure (spec §7).
    pub fn is_invalid_transition(&self) -> bool {
        true
    }
}
