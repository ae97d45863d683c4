// Narrative build events.
//
// The driver emits a stream of human-readable events at each major
// transition — session start, phase boundaries, checkpoints, guardian
// warnings, recovery attempts, verification outcomes. The stream is a
// side-effect sink consumed by an external narration/chat layer, not a
// typed contract: consumers read the `Display` strings.
//
// `EventLog` collects the events for the final build report and mirrors
// each one to `tracing` so `RUST_LOG` surfaces the narration during
// development.
//
// This is distinct from the internal `CheckScheduler` (see `schedule.rs`):
// scheduled checks drive the sim forward, narrative events are output.

use crate::session::Phase;
use crate::types::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A narrative event with the driver-time instant it occurred.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildEvent {
    pub at_ms: u64,
    pub kind: BuildEventKind,
}

/// Types of narrative events visible to the narration layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BuildEventKind {
    SessionStarted {
        session_id: SessionId,
        building_type: String,
        total_blocks: u32,
    },
    PhaseStarted {
        phase: Phase,
    },
    PhaseCompleted {
        phase: Phase,
    },
    PhaseFailed {
        phase: Phase,
        reason: String,
    },
    CheckpointSaved {
        ordinal: u32,
        description: String,
    },
    GuardianWarning {
        message: String,
    },
    RecoveryAttempted {
        strategy: String,
        succeeded: bool,
    },
    StructureValidated {
        accuracy: f64,
        is_complete: bool,
    },
    FunctionalityChecked {
        functional: bool,
        failed_tests: Vec<String>,
    },
    BuildStopped {
        phase: Phase,
    },
    BuildCompleted {
        session_id: SessionId,
        accuracy: f64,
    },
}

impl fmt::Display for BuildEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildEventKind::SessionStarted {
                session_id,
                building_type,
                total_blocks,
            } => write!(
                f,
                "Starting {building_type} build ({total_blocks} blocks), session {session_id}"
            ),
            BuildEventKind::PhaseStarted { phase } => write!(f, "Starting phase: {phase}"),
            BuildEventKind::PhaseCompleted { phase } => write!(f, "Completed phase: {phase}"),
            BuildEventKind::PhaseFailed { phase, reason } => {
                write!(f, "Phase {phase} failed: {reason}")
            }
            BuildEventKind::CheckpointSaved {
                ordinal,
                description,
            } => write!(f, "Checkpoint #{ordinal} saved ({description})"),
            BuildEventKind::GuardianWarning { message } => write!(f, "Warning: {message}"),
            BuildEventKind::RecoveryAttempted {
                strategy,
                succeeded,
            } => {
                let outcome = if *succeeded { "succeeded" } else { "did not help" };
                write!(f, "Recovery '{strategy}' attempted, {outcome}")
            }
            BuildEventKind::StructureValidated {
                accuracy,
                is_complete,
            } => {
                let status = if *is_complete { "complete" } else { "incomplete" };
                write!(f, "Structure check: {accuracy:.1}% accurate, {status}")
            }
            BuildEventKind::FunctionalityChecked {
                functional,
                failed_tests,
            } => {
                if *functional {
                    write!(f, "Functionality check passed")
                } else {
                    write!(f, "Functionality check failed: {}", failed_tests.join(", "))
                }
            }
            BuildEventKind::BuildStopped { phase } => {
                write!(f, "Build stopped by request during {phase}")
            }
            BuildEventKind::BuildCompleted {
                session_id,
                accuracy,
            } => write!(
                f,
                "Build {session_id} finished at {accuracy:.1}% structural accuracy"
            ),
        }
    }
}

/// Ordered collection of the events emitted during one build attempt.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<BuildEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at_ms: u64, kind: BuildEventKind) {
        tracing::info!(target: "gantry::narration", "{kind}");
        self.events.push(BuildEvent { at_ms, kind });
    }

    pub fn events(&self) -> &[BuildEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<BuildEvent> {
        self.events
    }
}
