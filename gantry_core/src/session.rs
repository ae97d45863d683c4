// Build session — the phase state machine.
//
// A `BuildSession` owns one construction attempt: the blueprint, the
// current phase, the progress counters, and the checkpoint cadence. Phases
// run in a fixed order with no cycles (retry happens *within* a phase, via
// the guardian's stagnation recovery re-invoking the current handler):
//
//   planning → resource_gathering → site_preparation → foundation →
//   walls → roof → details → verification → complete
//
// `execute_current_phase` returns a boolean success signal rather than an
// error so the caller decides whether to advance or retry. Individual
// placement faults are recorded in `progress.failed_blocks` and never abort
// a phase — the structure-level sweep repairs them later.
//
// Checkpointing is synchronous: a mid-phase checkpoint every
// `checkpoint_interval_blocks` placed blocks, an unconditional one before
// each handler returns, and one on every phase transition. Each is durable
// before the call returns, so a crash after a phase loses at most the
// in-flight phase's partial progress.
//
// See also: `blueprint.rs` for the geometric block classification the
// handlers consume, `checkpoint.rs` for persistence, `manager.rs` for the
// loop that drives this machine, `verify.rs` for per-block verification.

use crate::blueprint::{BlockSpec, Blueprint};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::GantryConfig;
use crate::error::{BuildError, WorldFault};
use crate::event::{BuildEventKind, EventLog};
use crate::manager::StopHandle;
use crate::schedule::Clock;
use crate::types::SessionId;
use crate::verify::{BuildVerifier, find_reference_neighbor};
use crate::world::WorldPort;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// One stage of the fixed construction sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    ResourceGathering,
    SitePreparation,
    Foundation,
    Walls,
    Roof,
    Details,
    Verification,
    Complete,
}

impl Phase {
    /// The fixed execution order. `Complete` is terminal.
    pub const SEQUENCE: [Phase; 9] = [
        Phase::Planning,
        Phase::ResourceGathering,
        Phase::SitePreparation,
        Phase::Foundation,
        Phase::Walls,
        Phase::Roof,
        Phase::Details,
        Phase::Verification,
        Phase::Complete,
    ];

    /// The phase after this one. Advancing past the end is idempotent and
    /// always yields `Complete`.
    pub fn next(self) -> Phase {
        let idx = Phase::SEQUENCE.iter().position(|p| *p == self).unwrap_or(0);
        *Phase::SEQUENCE.get(idx + 1).unwrap_or(&Phase::Complete)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Planning => "planning",
            Phase::ResourceGathering => "resource_gathering",
            Phase::SitePreparation => "site_preparation",
            Phase::Foundation => "foundation",
            Phase::Walls => "walls",
            Phase::Roof => "roof",
            Phase::Details => "details",
            Phase::Verification => "verification",
            Phase::Complete => "complete",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// A block the session tried and failed to materialize.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailedBlock {
    pub spec: BlockSpec,
    pub reason: String,
}

/// Mutable progress counters for one session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BuildProgress {
    pub total_blocks: u32,
    pub placed_blocks: u32,
    pub failed_blocks: Vec<FailedBlock>,
    pub completed_phases: Vec<Phase>,
}

impl BuildProgress {
    pub fn for_blueprint(blueprint: &Blueprint) -> Self {
        Self {
            total_blocks: blueprint.blocks.len() as u32,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything a phase handler needs besides the session itself. The manager
/// assembles one per call; keeping the collaborators bundled keeps the
/// handler signatures flat.
pub struct PhaseContext<'a> {
    pub world: &'a mut dyn WorldPort,
    pub verifier: &'a BuildVerifier,
    pub store: &'a CheckpointStore,
    pub clock: &'a dyn Clock,
    pub config: &'a GantryConfig,
    pub events: &'a mut EventLog,
    /// Checked between placements: a stop request ends the batch early
    /// (the in-flight placement completes first), leaving the remainder
    /// for the verification sweep after a resume.
    pub stop: StopHandle,
}

/// One construction attempt: blueprint, phase, progress, checkpoints.
#[derive(Clone, Debug)]
pub struct BuildSession {
    pub session_id: SessionId,
    pub blueprint: Blueprint,
    pub phase: Phase,
    pub progress: BuildProgress,
    blocks_since_checkpoint: u32,
}

impl BuildSession {
    pub fn new(session_id: SessionId, blueprint: Blueprint) -> Self {
        let progress = BuildProgress::for_blueprint(&blueprint);
        Self {
            session_id,
            blueprint,
            phase: Phase::Planning,
            progress,
            blocks_since_checkpoint: 0,
        }
    }

    /// Reconstruct a session from its newest checkpoint.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            session_id: checkpoint.session_id,
            blueprint: checkpoint.blueprint,
            phase: checkpoint.phase,
            progress: checkpoint.progress,
            blocks_since_checkpoint: 0,
        }
    }

    /// Load the session with the given id from the store.
    /// Fails with `SessionNotFound` if the store has no such session.
    pub fn load(store: &CheckpointStore, id: &SessionId) -> Result<Self, BuildError> {
        match store.latest(id)? {
            Some(checkpoint) => Ok(Self::from_checkpoint(checkpoint)),
            None => Err(BuildError::SessionNotFound(id.clone())),
        }
    }

    /// Execute the handler for the current phase. `Ok(true)` means the
    /// phase completed its work; `Ok(false)` means it ran but did not
    /// succeed (e.g. a resource shortfall). World query faults surface as
    /// `Err` and are treated as phase failures by the caller.
    pub fn execute_current_phase(&mut self, ctx: &mut PhaseContext<'_>) -> Result<bool, BuildError> {
        match self.phase {
            Phase::Planning => self.run_planning(ctx),
            Phase::ResourceGathering => self.run_resource_gathering(ctx),
            Phase::SitePreparation => self.run_site_preparation(ctx),
            Phase::Foundation => {
                let blocks = self.blueprint.foundation_blocks(&ctx.config.palette);
                self.run_placement_phase(ctx, &blocks, "foundation")
            }
            Phase::Walls => {
                let layers = self.blueprint.wall_layers(&ctx.config.palette);
                for (_, layer) in &layers {
                    self.place_blocks(ctx, layer)?;
                }
                self.create_checkpoint(ctx, "walls complete")?;
                Ok(true)
            }
            Phase::Roof => {
                let blocks = self.blueprint.roof_blocks(&ctx.config.palette);
                self.run_placement_phase(ctx, &blocks, "roof")
            }
            Phase::Details => {
                let blocks = self.blueprint.detail_blocks(&ctx.config.palette);
                self.run_placement_phase(ctx, &blocks, "details")
            }
            Phase::Verification => self.run_verification(ctx),
            Phase::Complete => Ok(true),
        }
    }

    /// Move to the next phase, recording the finished one and checkpointing
    /// the transition. Idempotent at `Complete`: returns `Complete` again
    /// without touching `completed_phases`.
    pub fn advance_phase(&mut self, ctx: &mut PhaseContext<'_>) -> Result<Phase, BuildError> {
        if self.phase == Phase::Complete {
            return Ok(Phase::Complete);
        }
        let finished = self.phase;
        self.progress.completed_phases.push(finished);
        self.phase = finished.next();
        ctx.events.push(
            ctx.clock.now_ms(),
            BuildEventKind::PhaseCompleted { phase: finished },
        );
        self.create_checkpoint(ctx, &format!("entering {}", self.phase))?;
        Ok(self.phase)
    }

    /// Snapshot the session to the store. Durable before returning.
    pub fn create_checkpoint(
        &mut self,
        ctx: &mut PhaseContext<'_>,
        description: &str,
    ) -> Result<u32, BuildError> {
        let checkpoint = Checkpoint {
            timestamp_ms: ctx.clock.now_ms(),
            created_at: chrono::Utc::now().to_rfc3339(),
            session_id: self.session_id.clone(),
            phase: self.phase,
            progress: self.progress.clone(),
            agent_position: ctx.world.agent_position().ok(),
            inventory: ctx.world.inventory().unwrap_or_default(),
            description: description.to_string(),
            blueprint: self.blueprint.clone(),
        };
        let ordinal = ctx.store.save(&checkpoint)?;
        self.blocks_since_checkpoint = 0;
        ctx.events.push(
            ctx.clock.now_ms(),
            BuildEventKind::CheckpointSaved {
                ordinal,
                description: description.to_string(),
            },
        );
        Ok(ordinal)
    }

    // -----------------------------------------------------------------------
    // Phase handlers
    // -----------------------------------------------------------------------

    fn run_planning(&mut self, ctx: &mut PhaseContext<'_>) -> Result<bool, BuildError> {
        let bill = self.blueprint.material_bill();
        tracing::debug!(
            session = %self.session_id,
            kinds = bill.len(),
            blocks = self.progress.total_blocks,
            "planned material bill"
        );
        self.create_checkpoint(ctx, "planning complete")?;
        Ok(true)
    }

    /// Compare the material bill against live inventory. A shortfall fails
    /// the phase (gathering itself is outside this core — the failure is
    /// the signal an outer collector acts on).
    fn run_resource_gathering(&mut self, ctx: &mut PhaseContext<'_>) -> Result<bool, BuildError> {
        let shortfalls = material_shortfalls(&self.blueprint, ctx.world)?;
        let ok = shortfalls.is_empty();
        if !ok {
            let summary = shortfalls
                .iter()
                .map(|(kind, missing)| format!("{kind} x{missing}"))
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(session = %self.session_id, %summary, "material shortfall");
        }
        self.create_checkpoint(ctx, "resource check complete")?;
        Ok(ok)
    }

    /// Honor the blueprint's site flags: clear non-natural obstacles inside
    /// the bounding box, and fill missing support directly under the
    /// foundation footprint.
    fn run_site_preparation(&mut self, ctx: &mut PhaseContext<'_>) -> Result<bool, BuildError> {
        if let Some(bbox) = self.blueprint.bounding_box() {
            if self.blueprint.clear_area {
                for x in bbox.min.x..=bbox.max.x {
                    for y in bbox.min.y..=bbox.max.y {
                        for z in bbox.min.z..=bbox.max.z {
                            let pos = crate::types::BlockPos::new(x, y, z);
                            if let Some(kind) = ctx.world.block_at(pos)? {
                                if !ctx.config.palette.is_natural(kind) {
                                    if let Err(fault) = ctx.world.dig(pos) {
                                        tracing::warn!(%pos, %fault, "obstacle dig failed");
                                    }
                                }
                            }
                        }
                    }
                }
            }
            if self.blueprint.level_ground {
                let fill = ctx.config.palette.fill_material;
                for spec in self.blueprint.foundation_blocks(&ctx.config.palette) {
                    let below = spec.pos.offset(0, -1, 0);
                    if ctx.world.block_at(below)?.is_none() {
                        match find_reference_neighbor(ctx.world, below)? {
                            Some((reference, face)) => {
                                if let Err(fault) = ctx.world.place(fill, reference, face) {
                                    tracing::warn!(pos = %below, %fault, "ground fill failed");
                                }
                            }
                            None => {
                                tracing::debug!(pos = %below, "no reference to fill against");
                            }
                        }
                    }
                }
            }
        }
        self.create_checkpoint(ctx, "site preparation complete")?;
        Ok(true)
    }

    fn run_placement_phase(
        &mut self,
        ctx: &mut PhaseContext<'_>,
        blocks: &[BlockSpec],
        label: &str,
    ) -> Result<bool, BuildError> {
        self.place_blocks(ctx, blocks)?;
        self.create_checkpoint(ctx, &format!("{label} complete"))?;
        Ok(true)
    }

    /// Materialize a batch of blocks. Placement faults are recorded, never
    /// propagated; a mid-phase checkpoint is written every
    /// `checkpoint_interval_blocks` successful placements.
    fn place_blocks(
        &mut self,
        ctx: &mut PhaseContext<'_>,
        blocks: &[BlockSpec],
    ) -> Result<(), BuildError> {
        for spec in blocks {
            if ctx.stop.is_stopped() {
                break;
            }
            // Already satisfied — placed before a resume, or pre-existing.
            if ctx.world.block_at(spec.pos)? == Some(spec.kind) {
                continue;
            }
            match self.place_one(ctx, spec)? {
                Ok(()) => {
                    self.progress.placed_blocks += 1;
                    self.blocks_since_checkpoint += 1;
                    if self.blocks_since_checkpoint >= ctx.config.manager.checkpoint_interval_blocks
                    {
                        self.create_checkpoint(ctx, "mid-phase progress")?;
                    }
                }
                Err(reason) => {
                    tracing::debug!(pos = %spec.pos, kind = %spec.kind, %reason, "placement failed");
                    self.progress.failed_blocks.push(FailedBlock {
                        spec: *spec,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    /// One place-then-verify round trip. The outer `Result` carries world
    /// query faults (abort the phase); the inner one is the per-block
    /// outcome (recorded, never fatal).
    fn place_one(
        &self,
        ctx: &mut PhaseContext<'_>,
        spec: &BlockSpec,
    ) -> Result<Result<(), String>, WorldFault> {
        let Some((reference, face)) = find_reference_neighbor(ctx.world, spec.pos)? else {
            return Ok(Err("no reference neighbor to place against".into()));
        };
        if let Err(fault) = ctx.world.place(spec.kind, reference, face) {
            return Ok(Err(fault.to_string()));
        }
        let check = ctx.verifier.verify_block(ctx.world, ctx.clock, spec)?;
        if check.success {
            Ok(Ok(()))
        } else {
            Ok(Err(check
                .reason
                .unwrap_or_else(|| "verification mismatch".into())))
        }
    }

    /// Structure sweep with inline bounded fixes, re-validated once so the
    /// reported numbers reflect the repairs.
    fn run_verification(&mut self, ctx: &mut PhaseContext<'_>) -> Result<bool, BuildError> {
        let first = ctx
            .verifier
            .validate_structure(ctx.world, ctx.clock, &self.blueprint)?;
        let report = if first.is_complete {
            first
        } else {
            ctx.verifier
                .validate_structure(ctx.world, ctx.clock, &self.blueprint)?
        };
        ctx.events.push(
            ctx.clock.now_ms(),
            BuildEventKind::StructureValidated {
                accuracy: report.accuracy,
                is_complete: report.is_complete,
            },
        );
        let ok = report.is_complete;
        self.create_checkpoint(ctx, "verification complete")?;
        Ok(ok)
    }
}

/// Per-kind shortfall of blueprint materials against live inventory.
pub fn material_shortfalls(
    blueprint: &Blueprint,
    world: &dyn WorldPort,
) -> Result<Vec<(crate::types::BlockKind, u32)>, WorldFault> {
    let inventory = world.inventory()?;
    let mut have: std::collections::BTreeMap<crate::types::BlockKind, u32> =
        std::collections::BTreeMap::new();
    for stack in &inventory {
        if let Some(kind) = crate::types::BlockKind::from_item_name(&stack.name) {
            *have.entry(kind).or_insert(0) += stack.count;
        }
    }
    Ok(blueprint
        .material_bill()
        .into_iter()
        .filter_map(|(kind, need)| {
            let held = have.get(&kind).copied().unwrap_or(0);
            (held < need).then(|| (kind, need - held))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockKind, BlockPos};
    use crate::world::GridWorld;

    fn fixture() -> (GridWorld, BuildVerifier, CheckpointStore, tempfile::TempDir, GantryConfig) {
        let config = GantryConfig::default();
        let verifier = BuildVerifier::new(config.verifier.clone(), config.palette.clone());
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut world = GridWorld::new(BlockPos::new(0, 0, 0), 24, 24, 24);
        world.fill_layer(0, BlockKind::GrassBlock);
        (world, verifier, store, dir, config)
    }

    fn platform_blueprint(count: i32) -> Blueprint {
        let blocks = (0..count)
            .map(|i| {
                BlockSpec::new(
                    BlockKind::OakPlanks,
                    BlockPos::new(2 + i % 8, 1, 2 + i / 8),
                )
            })
            .collect();
        Blueprint::new("platform", blocks)
    }

    #[test]
    fn phase_sequence_is_fixed_and_terminal() {
        let mut phase = Phase::Planning;
        let mut seen = vec![phase];
        while phase != Phase::Complete {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(seen, Phase::SEQUENCE.to_vec());
        // Advancing past the end stays at Complete.
        assert_eq!(Phase::Complete.next(), Phase::Complete);
    }

    #[test]
    fn phase_serializes_as_snake_case() {
        let json = serde_json::to_string(&Phase::ResourceGathering).unwrap();
        assert_eq!(json, "\"resource_gathering\"");
        assert_eq!(Phase::SitePreparation.to_string(), "site_preparation");
    }

    #[test]
    fn advance_phase_is_idempotent_at_complete() {
        let (mut world, verifier, store, _dir, config) = fixture();
        let mut events = EventLog::new();
        let clock = crate::schedule::ManualClock::new();
        let mut session = BuildSession::new(
            SessionId::from_string("build_t1"),
            platform_blueprint(4),
        );
        session.phase = Phase::Complete;
        session.progress.completed_phases = vec![Phase::Planning];

        let mut ctx = PhaseContext {
            world: &mut world,
            verifier: &verifier,
            store: &store,
            clock: &clock,
            config: &config,
            events: &mut events,
            stop: StopHandle::new(),
        };
        assert_eq!(session.advance_phase(&mut ctx).unwrap(), Phase::Complete);
        assert_eq!(session.advance_phase(&mut ctx).unwrap(), Phase::Complete);
        assert_eq!(session.progress.completed_phases, vec![Phase::Planning]);
    }

    #[test]
    fn foundation_phase_places_lowest_layer() {
        let (mut world, verifier, store, _dir, config) = fixture();
        let mut events = EventLog::new();
        let clock = crate::schedule::ManualClock::new();
        let blueprint = platform_blueprint(6);
        let mut session = BuildSession::new(SessionId::from_string("build_t2"), blueprint.clone());
        session.phase = Phase::Foundation;

        let mut ctx = PhaseContext {
            world: &mut world,
            verifier: &verifier,
            store: &store,
            clock: &clock,
            config: &config,
            events: &mut events,
            stop: StopHandle::new(),
        };
        assert!(session.execute_current_phase(&mut ctx).unwrap());
        assert_eq!(session.progress.placed_blocks, 6);
        assert!(session.progress.failed_blocks.is_empty());
        for spec in &blueprint.blocks {
            assert_eq!(world.cell(spec.pos), Some(spec.kind));
        }
    }

    #[test]
    fn placement_fault_is_recorded_not_fatal() {
        let (mut world, verifier, store, _dir, config) = fixture();
        world.fail_placements_at([BlockPos::new(2, 1, 2)]);
        let mut events = EventLog::new();
        let clock = crate::schedule::ManualClock::new();
        let mut session = BuildSession::new(
            SessionId::from_string("build_t3"),
            platform_blueprint(3),
        );
        session.phase = Phase::Foundation;

        let mut ctx = PhaseContext {
            world: &mut world,
            verifier: &verifier,
            store: &store,
            clock: &clock,
            config: &config,
            events: &mut events,
            stop: StopHandle::new(),
        };
        assert!(session.execute_current_phase(&mut ctx).unwrap());
        assert_eq!(session.progress.placed_blocks, 2);
        assert_eq!(session.progress.failed_blocks.len(), 1);
        assert_eq!(session.progress.failed_blocks[0].spec.pos, BlockPos::new(2, 1, 2));
    }

    #[test]
    fn mid_phase_checkpoints_every_twenty_blocks() {
        let (mut world, verifier, store, _dir, config) = fixture();
        let mut events = EventLog::new();
        let clock = crate::schedule::ManualClock::new();
        let mut session = BuildSession::new(
            SessionId::from_string("build_t4"),
            platform_blueprint(45),
        );
        session.phase = Phase::Foundation;

        let mut ctx = PhaseContext {
            world: &mut world,
            verifier: &verifier,
            store: &store,
            clock: &clock,
            config: &config,
            events: &mut events,
            stop: StopHandle::new(),
        };
        assert!(session.execute_current_phase(&mut ctx).unwrap());
        // Two mid-phase checkpoints (after 20 and 40) plus the
        // end-of-phase one.
        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions[0].checkpoints, 3);
    }

    #[test]
    fn resource_shortfall_fails_the_phase() {
        let (mut world, verifier, store, _dir, config) = fixture();
        let clock = crate::schedule::ManualClock::new();
        let mut session = BuildSession::new(
            SessionId::from_string("build_t5"),
            platform_blueprint(4),
        );
        session.phase = Phase::ResourceGathering;

        // Empty inventory: the bill cannot be met.
        {
            let mut events = EventLog::new();
            let mut ctx = PhaseContext {
                world: &mut world,
                verifier: &verifier,
                store: &store,
                clock: &clock,
                config: &config,
                events: &mut events,
                stop: StopHandle::new(),
            };
            assert!(!session.execute_current_phase(&mut ctx).unwrap());
        }

        // Stocked up, the same phase succeeds.
        world.stock(BlockKind::OakPlanks, 64);
        {
            let mut events = EventLog::new();
            let mut ctx = PhaseContext {
                world: &mut world,
                verifier: &verifier,
                store: &store,
                clock: &clock,
                config: &config,
                events: &mut events,
                stop: StopHandle::new(),
            };
            assert!(session.execute_current_phase(&mut ctx).unwrap());
        }
    }

    #[test]
    fn checkpoint_roundtrip_restores_session() {
        let (mut world, verifier, store, _dir, config) = fixture();
        let mut events = EventLog::new();
        let clock = crate::schedule::ManualClock::new();
        let id = SessionId::from_string("build_t6");
        let mut session = BuildSession::new(id.clone(), platform_blueprint(6));
        session.phase = Phase::Foundation;

        let mut ctx = PhaseContext {
            world: &mut world,
            verifier: &verifier,
            store: &store,
            clock: &clock,
            config: &config,
            events: &mut events,
            stop: StopHandle::new(),
        };
        session.execute_current_phase(&mut ctx).unwrap();
        session.advance_phase(&mut ctx).unwrap();

        let restored = BuildSession::load(&store, &id).unwrap();
        assert_eq!(restored.phase, session.phase);
        assert_eq!(restored.progress.placed_blocks, session.progress.placed_blocks);
        assert_eq!(
            restored.progress.completed_phases,
            session.progress.completed_phases
        );
        assert_eq!(restored.blueprint.blocks.len(), session.blueprint.blocks.len());
    }

    #[test]
    fn load_unknown_session_is_session_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let err = BuildSession::load(&store, &SessionId::from_string("missing")).unwrap_err();
        assert!(matches!(err, BuildError::SessionNotFound(_)));
    }
}
