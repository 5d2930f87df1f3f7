//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──────────────────────────────► Completed
///                          ├──► Compensating ─────────────► Failed
///                          └──► Suspended ◄──► (resume) Running | Compensating
/// ```
///
/// A saga is suspended when a side effect fails after earlier steps have
/// committed. It stays that way until it is resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    #[default]
    NotStarted,

    Running,

    /// A reservation failed; already-reserved stock is being handed back.
    Compensating,

    /// A step failed and is waiting for a resume.
    Suspended,

    /// All steps completed (terminal).
    Completed,

    /// Compensation finished after a failure (terminal).
    Failed,
}

impl SagaState {
    pub fn can_run(&self) -> bool {
        matches!(self, SagaState::NotStarted)
    }

    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaState::Running)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, SagaState::Suspended)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Running => "Running",
            SagaState::Compensating => "Compensating",
            SagaState::Suspended => "Suspended",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
