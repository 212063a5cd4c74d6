use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Finite state vocabulary for one lifecycle kind.
///
/// Each state carries the exact set of states it may legally move to;
/// terminal states map to an empty set. The table is pure data — validation
/// never touches storage or side effects.
pub trait LifecycleState: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// State every record of this kind is created in.
    fn initial() -> Self;

    /// The allowed-next table, one row per state.
    fn allowed_next(self) -> &'static [Self];

    /// Stable label used in audit views, templates, and API payloads.
    fn label(self) -> &'static str;

    fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    fn can_move_to(self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }
}

/// Distinguishes edges that share a destination but differ in meaning, e.g.
/// the contractor fast-track approval versus the standard fee-paid path.
/// Template selection keys off the full edge identity, not the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathTag {
    #[default]
    Standard,
    FastTrack,
}

impl PathTag {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::FastTrack => "fast_track",
        }
    }
}

/// Failures raised while validating or committing a transition.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("lifecycle record not found")]
    NotFound,
    #[error("record changed concurrently: expected {expected}, found {found}")]
    ConcurrentModification {
        expected: &'static str,
        found: &'static str,
    },
    #[error("lifecycle store failure: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Green,
        Yellow,
        Red,
    }

    impl LifecycleState for Light {
        fn initial() -> Self {
            Self::Green
        }

        fn allowed_next(self) -> &'static [Self] {
            match self {
                Self::Green => &[Self::Yellow],
                Self::Yellow => &[Self::Red],
                Self::Red => &[],
            }
        }

        fn label(self) -> &'static str {
            match self {
                Self::Green => "green",
                Self::Yellow => "yellow",
                Self::Red => "red",
            }
        }
    }

    #[test]
    fn table_drives_validation() {
        assert!(Light::Green.can_move_to(Light::Yellow));
        assert!(!Light::Green.can_move_to(Light::Red));
        assert!(!Light::Green.can_move_to(Light::Green));
    }

    #[test]
    fn empty_row_means_terminal() {
        assert!(Light::Red.is_terminal());
        assert!(!Light::Yellow.is_terminal());
    }
}
