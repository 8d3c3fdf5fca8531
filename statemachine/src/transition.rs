use orbiter_types::PodStatus;

/// The pod status set is closed (spec §9): this is the single place the
/// transition table lives, and the match is exhaustive so adding a status
/// is a compile error everywhere else in the crate until this table is
/// updated too.
pub fn edge_allowed(from: PodStatus, to: PodStatus) -> bool {
    use PodStatus::*;
    matches!(
        (from, to),
        (Pending, Scheduled)
            | (Pending, Failed)
            | (Scheduled, Starting)
            | (Scheduled, Failed)
            | (Scheduled, Stopping)
            | (Starting, Running)
            | (Starting, Failed)
            | (Starting, Stopping)
            | (Running, Stopping)
            | (Running, Failed)
            | (Running, Evicted)
            | (Stopping, Stopped)
            | (Stopping, Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use PodStatus::*;

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in PodStatus::TERMINAL {
            for to in [
                Pending, Scheduled, Starting, Running, Stopping, Stopped, Failed, Evicted,
            ] {
                assert!(!edge_allowed(terminal, to), "{terminal:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn stopping_never_returns_to_active() {
        for to in [Scheduled, Starting, Running] {
            assert!(!edge_allowed(Stopping, to));
        }
    }

    #[test]
    fn documented_edges_hold() {
        assert!(edge_allowed(Pending, Scheduled));
        assert!(edge_allowed(Scheduled, Stopping));
        assert!(edge_allowed(Running, Evicted));
        assert!(edge_allowed(Stopping, Stopped));
        assert!(!edge_allowed(Pending, Running));
        assert!(!edge_allowed(Stopped, Running));
    }
}
