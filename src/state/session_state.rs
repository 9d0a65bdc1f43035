/// Session state definitions for tracking a leech session's lifecycle
///
/// This module defines the states a session moves through, from login to shutdown.
use std::fmt;

/// Represents the current lifecycle state of a leech session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No credential has been obtained yet
    Unauthenticated,

    /// Login succeeded and the bearer credential is cached
    Authenticated,

    /// Workers are pulling pages
    Running,

    /// Workers have exited (exhaustion, limit, failure, or cancellation)
    Stopped,
}

impl SessionState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if a run may be started from this state
    ///
    /// An unauthenticated session logs in first, so it can also start a run.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Authenticated)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Unauthenticated, Self::Authenticated)
                | (Self::Unauthenticated, Self::Stopped)
                | (Self::Authenticated, Self::Running)
                | (Self::Authenticated, Self::Stopped)
                | (Self::Running, Self::Stopped)
        )
    }

    /// Returns the lowercase name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
