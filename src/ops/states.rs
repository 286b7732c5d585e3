use super::events::OpEvent;
use crate::error::StateMachineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single op attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpState {
    /// Created, not yet admitted
    #[default]
    Pending,
    /// Admitted and executing; holds an in-flight slot
    Started,
    /// Completed successfully
    Succeeded,
    /// Completed with an error
    Failed,
}

impl OpState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Check if the op occupies an in-flight slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started)
    }
}

impl fmt::Display for OpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Started => write!(f, "started"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for OpState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "started" => Ok(Self::Started),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid op state: {s}")),
        }
    }
}

/// Transition table for op attempts.
///
/// `Pending -> Started -> {Succeeded | Failed}`. Everything else, including
/// any event on a terminal state, is rejected.
pub fn determine_target_state(
    current: OpState,
    event: &OpEvent,
) -> Result<OpState, StateMachineError> {
    let target = match (current, event) {
        (OpState::Pending, OpEvent::Start) => OpState::Started,
        (OpState::Started, OpEvent::Succeed) => OpState::Succeeded,
        (OpState::Started, OpEvent::Fail(_)) => OpState::Failed,
        (from, _) => {
            return Err(StateMachineError::InvalidTransition {
                from: from.to_string(),
                event: event.event_type().to_string(),
            })
        }
    };
    Ok(target)
}
