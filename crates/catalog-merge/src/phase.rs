use std::fmt;

use serde::Serialize;

/// Lifecycle of one merge.
///
/// `Pending -> Expanding -> Migrating -> Committed`, or `Aborted` from any
/// non-terminal phase. Phases are internal to a merge call; only the
/// terminal phase is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    Pending,
    Expanding,
    Migrating,
    Committed,
    Aborted,
}

impl MergePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }

    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Expanding)
                | (Self::Expanding, Self::Migrating)
                | (Self::Migrating, Self::Committed)
        ) || (!self.is_terminal() && next == Self::Aborted)
    }
}

impl fmt::Display for MergePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Expanding => "expanding",
            Self::Migrating => "migrating",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions() {
        assert!(MergePhase::Pending.can_advance_to(MergePhase::Expanding));
        assert!(MergePhase::Expanding.can_advance_to(MergePhase::Migrating));
        assert!(MergePhase::Migrating.can_advance_to(MergePhase::Committed));
        assert!(!MergePhase::Pending.can_advance_to(MergePhase::Committed));
        assert!(!MergePhase::Migrating.can_advance_to(MergePhase::Expanding));
    }

    #[test]
    fn abort_from_any_open_phase() {
        for phase in [MergePhase::Pending, MergePhase::Expanding, MergePhase::Migrating] {
            assert!(phase.can_advance_to(MergePhase::Aborted));
        }
        assert!(!MergePhase::Committed.can_advance_to(MergePhase::Aborted));
        assert!(!MergePhase::Aborted.can_advance_to(MergePhase::Aborted));
    }
}
