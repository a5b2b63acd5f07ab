//! Engine lifecycle phases.

use serde::{Deserialize, Serialize};

/// Where an engine is in its lifecycle
///
/// `Idle -> Recovering -> (WaitingForStartDate) -> Running <-> Paused -> Finished`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EnginePhase {
    /// Constructed, `start` not called yet
    Idle = 0,
    /// Loading prior state from the persistence plugin
    Recovering = 1,
    /// Suspended until the configured start date
    WaitingForStartDate = 2,
    /// Iterating
    Running = 3,
    /// Iteration loop parked on the gate
    Paused = 4,
    /// Loop exited; terminal
    Finished = 5,
}

impl EnginePhase {
    /// Returns true once the engine can no longer make progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnginePhase::Finished)
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => EnginePhase::Recovering,
            2 => EnginePhase::WaitingForStartDate,
            3 => EnginePhase::Running,
            4 => EnginePhase::Paused,
            5 => EnginePhase::Finished,
            _ => EnginePhase::Idle,
        }
    }
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnginePhase::Idle => "idle",
            EnginePhase::Recovering => "recovering",
            EnginePhase::WaitingForStartDate => "waiting_for_start_date",
            EnginePhase::Running => "running",
            EnginePhase::Paused => "paused",
            EnginePhase::Finished => "finished",
        };
        write!(f, "{}", name)
    }
}
