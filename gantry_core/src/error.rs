// Error taxonomy for the construction driver.
//
// Nothing in this crate is designed to terminate the process: every fault
// degrades to a reported result object or a best-effort recovery action.
// The variants here mark the *kind* of degradation so callers can tell a
// force-overridable pre-build validation failure from a fatal-to-the-call
// unknown session id.
//
// - `Validation`: pre-build gate failed; non-fatal, force-overridable.
// - `Placement`: a single block action failed; recorded, swept up later by
//   structure validation, never aborts a phase.
// - `PhaseFailure`: a phase handler faulted; triggers checkpoint + backoff +
//   forced advance in the manager.
// - `RepeatedFailureEscalation`: the same failure kind recurred to the
//   threshold; triggers strategy-reset recovery, not a hard stop.
// - `SessionNotFound`: resume with an unknown session id; fatal to the
//   resume call only.
// - `VerificationShortfall`: final checks failed; reported, not retried
//   beyond the bounded auto-fix batches already attempted inline.
//
// `WorldFault` and `CheckpointError` are the ambient carriers for the two
// effectful boundaries (the world port and the checkpoint store).

use crate::session::Phase;
use crate::types::{BlockPos, SessionId};
use thiserror::Error;

/// A fault returned by a `WorldPort` call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorldFault {
    #[error("placement rejected at {0}")]
    PlacementRejected(BlockPos),
    #[error("dig rejected at {0}")]
    DigRejected(BlockPos),
    #[error("move rejected toward {0}")]
    MoveRejected(BlockPos),
    #[error("world query failed: {0}")]
    QueryFailed(String),
}

/// A fault in the checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint io: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Top-level error taxonomy.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("pre-build validation failed: {0}")]
    Validation(String),

    #[error("placement fault at {pos}: {fault}")]
    Placement { pos: BlockPos, fault: WorldFault },

    #[error("phase {phase} failed: {reason}")]
    PhaseFailure { phase: Phase, reason: String },

    #[error("repeated failure escalation for '{kind}' after {count} occurrences")]
    RepeatedFailureEscalation { kind: String, count: u32 },

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("verification shortfall: {0}")]
    VerificationShortfall(String),

    #[error(transparent)]
    World(#[from] WorldFault),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure_site() {
        let fault = WorldFault::PlacementRejected(BlockPos::new(1, 2, 3));
        assert_eq!(fault.to_string(), "placement rejected at (1, 2, 3)");

        let err = BuildError::Placement {
            pos: BlockPos::new(1, 2, 3),
            fault,
        };
        assert!(err.to_string().contains("(1, 2, 3)"));

        let err = BuildError::SessionNotFound(SessionId::from_string("build_x"));
        assert!(err.to_string().contains("build_x"));
    }

    #[test]
    fn world_fault_converts_into_build_error() {
        fn fails() -> Result<(), BuildError> {
            let r: Result<(), WorldFault> = Err(WorldFault::QueryFailed("timed out".into()));
            r?;
            Ok(())
        }
        match fails() {
            Err(BuildError::World(WorldFault::QueryFailed(msg))) => {
                assert_eq!(msg, "timed out");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
