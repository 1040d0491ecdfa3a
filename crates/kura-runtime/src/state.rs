//! Extension lifecycle state.

use std::fmt;

/// Lifecycle of a loaded extension.
///
/// ```text
/// Unloaded ──load──▶ Loading ──ok──▶ Ready ──dispose──▶ Disposed
///                       │                                  ▲
///                       └──────────── fail ──▶ Unloaded    │
///                       └──────────── dispose ─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionState {
    /// No module is loaded.
    Unloaded,
    /// The worker is starting and the module is being evaluated.
    Loading,
    /// Calls are accepted.
    Ready,
    /// Terminal; every call fails with `Disposed`.
    Disposed,
}

impl ExtensionState {
    /// Whether calls may be forwarded to the worker in this state.
    ///
    /// `Loading` accepts calls so the manifest can be fetched during load.
    #[must_use]
    pub fn accepts_calls(self) -> bool {
        matches!(self, Self::Loading | Self::Ready)
    }

    /// Whether moving to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unloaded, Self::Loading)
                | (Self::Loading, Self::Ready | Self::Unloaded | Self::Disposed)
                | (Self::Ready, Self::Disposed)
        )
    }
}

impl fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use ExtensionState::{Disposed, Loading, Ready, Unloaded};

        assert!(Unloaded.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Ready));
        assert!(Loading.can_transition_to(Unloaded));
        assert!(Ready.can_transition_to(Disposed));

        assert!(!Unloaded.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Loading));
        assert!(!Disposed.can_transition_to(Ready));
        assert!(!Disposed.can_transition_to(Disposed));
    }

    #[test]
    fn test_accepts_calls() {
        assert!(ExtensionState::Ready.accepts_calls());
        assert!(ExtensionState::Loading.accepts_calls());
        assert!(!ExtensionState::Disposed.accepts_calls());
        assert!(!ExtensionState::Unloaded.accepts_calls());
    }
}
