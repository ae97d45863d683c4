// Build orchestration.
//
// `BuildManager` drives one construction attempt end to end: the pre-build
// gate, the phase loop, guardian monitoring, and post-build verification.
//
// The pre-build gate runs four independent checks — materials, terrain
// obstacles, environment, tool availability — and passes only if all pass.
// Callers may force-proceed past a failed gate; the failure is then just a
// recorded warning.
//
// The phase loop executes the current phase, and on success records a
// success pattern, updates the progress timer, and advances. On failure
// (returned `false` or a fault) it records a failure pattern (which may
// fire repeated-failure escalation), writes an emergency checkpoint, waits
// a fixed backoff, and advances anyway: the system prefers forward progress
// with a logged defect over halting, and surfaces accumulated defects at
// final verification. A `complete` phase therefore does not imply a
// verified structure — the final report is informative, not gating.
//
// Concurrency model: one build flow, one outstanding world actuation.
// Guardian checks interleave at the loop's suspension points — before each
// phase and inside the failure backoff — via `pump()`, which gathers a
// `WorldSnapshot`, runs due checks, and executes any recovery the guardian
// selected. Session state is only ever touched from this flow, giving the
// single-writer discipline the checkpoint invariants rely on.
//
// `StopHandle` is a continuation flag checked between phases, never a
// cancellation of an in-flight world call: an in-progress placement
// completes before the loop observes the stop.
//
// See also: `session.rs` for the phase machine, `guardian.rs` for
// monitoring, `verify.rs` for the final reports.

use crate::blueprint::Blueprint;
use crate::checkpoint::{CheckpointStore, SessionSummary};
use crate::config::GantryConfig;
use crate::error::{BuildError, WorldFault};
use crate::event::{BuildEvent, BuildEventKind, EventLog};
use crate::guardian::{GuardianNote, GuardianSession, RecoveryStrategy, WorldSnapshot};
use crate::schedule::Clock;
use crate::session::{material_shortfalls, BuildProgress, BuildSession, Phase, PhaseContext};
use crate::types::{EntityKind, SessionId};
use crate::verify::{BuildVerifier, FunctionalityReport, StructureReport};
use crate::world::WorldPort;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Stop flag
// ---------------------------------------------------------------------------

/// Cooperative stop request, checked between phases and during waits.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One pre-build gate check.
#[derive(Clone, Debug, Serialize)]
pub struct PrebuildCheck {
    pub name: &'static str,
    pub passed: bool,
    pub details: String,
}

/// All four gate checks. The gate passes only if every check passed.
#[derive(Clone, Debug, Serialize)]
pub struct PrebuildReport {
    pub checks: Vec<PrebuildCheck>,
}

impl PrebuildReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn summary(&self) -> String {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.name, c.details))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Final aggregate returned by `build`/`resume`.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub session_id: SessionId,
    pub final_phase: Phase,
    pub progress: BuildProgress,
    /// Absent when the build was stopped before reaching verification.
    pub structure: Option<StructureReport>,
    pub functionality: Option<FunctionalityReport>,
    pub repair_actions: Vec<String>,
    pub warnings: Vec<GuardianNote>,
    pub failures: Vec<GuardianNote>,
    pub events: Vec<BuildEvent>,
    pub stopped_early: bool,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Top-level orchestrator. Stateless between attempts: each `build` or
/// `resume` call owns its session, guardian, and event log for the
/// duration of the call.
pub struct BuildManager {
    config: GantryConfig,
    store: CheckpointStore,
}

impl BuildManager {
    pub fn new(config: GantryConfig, store: CheckpointStore) -> Self {
        Self { config, store }
    }

    /// Validate materials, terrain, environment, and tools. All four checks
    /// run regardless of earlier failures so the report is complete.
    pub fn prebuild_gate(
        &self,
        world: &dyn WorldPort,
        blueprint: &Blueprint,
    ) -> Result<PrebuildReport, WorldFault> {
        let mut checks = Vec::new();

        let shortfalls = material_shortfalls(blueprint, world)?;
        checks.push(PrebuildCheck {
            name: "materials",
            passed: shortfalls.is_empty(),
            details: if shortfalls.is_empty() {
                "all required materials on hand".into()
            } else {
                shortfalls
                    .iter()
                    .map(|(kind, missing)| format!("short {missing} {kind}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        });

        let mut obstacles = 0usize;
        if let Some(bbox) = blueprint.bounding_box() {
            for x in bbox.min.x..=bbox.max.x {
                for y in bbox.min.y..=bbox.max.y {
                    for z in bbox.min.z..=bbox.max.z {
                        if let Some(kind) =
                            world.block_at(crate::types::BlockPos::new(x, y, z))?
                        {
                            if !self.config.palette.is_natural(kind) {
                                obstacles += 1;
                            }
                        }
                    }
                }
            }
        }
        checks.push(PrebuildCheck {
            name: "terrain",
            passed: obstacles == 0,
            details: if obstacles == 0 {
                "site is clear".into()
            } else {
                format!("{obstacles} obstacle block(s) inside the site")
            },
        });

        let weather = world.weather()?;
        let hostiles = world
            .nearby_entities(self.config.guardian.hostile_radius)?
            .into_iter()
            .filter(|e| e.kind == EntityKind::Hostile)
            .count();
        let mut hazards = Vec::new();
        if weather.raining {
            hazards.push("raining".to_string());
        }
        if weather.is_night() {
            hazards.push("night".to_string());
        }
        if hostiles > 0 {
            hazards.push(format!("{hostiles} hostile mob(s) nearby"));
        }
        checks.push(PrebuildCheck {
            name: "environment",
            passed: hazards.is_empty(),
            details: if hazards.is_empty() {
                "conditions are safe".into()
            } else {
                hazards.join(", ")
            },
        });

        let inventory = world.inventory()?;
        let missing_tools: Vec<&str> = self
            .config
            .palette
            .tool_names
            .iter()
            .filter(|tool| {
                !inventory
                    .iter()
                    .any(|s| s.count > 0 && s.name.contains(tool.as_str()))
            })
            .map(|t| t.as_str())
            .collect();
        checks.push(PrebuildCheck {
            name: "tools",
            passed: missing_tools.is_empty(),
            details: if missing_tools.is_empty() {
                "tool kit complete".into()
            } else {
                format!("missing: {}", missing_tools.join(", "))
            },
        });

        Ok(PrebuildReport { checks })
    }

    /// Run a fresh build attempt. Fails with `Validation` when the gate
    /// does not pass and `force` is false.
    pub fn build(
        &self,
        world: &mut dyn WorldPort,
        clock: &dyn Clock,
        blueprint: Blueprint,
        force: bool,
        stop: &StopHandle,
    ) -> Result<BuildReport, BuildError> {
        let gate = self.prebuild_gate(world, &blueprint)?;
        if !gate.passed() {
            if !force {
                return Err(BuildError::Validation(gate.summary()));
            }
            tracing::warn!(issues = %gate.summary(), "gate failed, proceeding under force");
        }
        let session = BuildSession::new(SessionId::generate(), blueprint);
        self.run_to_completion(world, clock, session, stop)
    }

    /// Resume the session with the given id from its newest checkpoint and
    /// drive it to completion.
    pub fn resume(
        &self,
        world: &mut dyn WorldPort,
        clock: &dyn Clock,
        session_id: &SessionId,
        stop: &StopHandle,
    ) -> Result<BuildReport, BuildError> {
        let session = BuildSession::load(&self.store, session_id)?;
        tracing::info!(session = %session.session_id, phase = %session.phase, "resuming session");
        self.run_to_completion(world, clock, session, stop)
    }

    /// All known sessions in the checkpoint store.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, BuildError> {
        Ok(self.store.list_sessions()?)
    }

    fn run_to_completion(
        &self,
        world: &mut dyn WorldPort,
        clock: &dyn Clock,
        session: BuildSession,
        stop: &StopHandle,
    ) -> Result<BuildReport, BuildError> {
        let centroid = session.blueprint.centroid();
        let run = BuildRun {
            config: &self.config,
            store: &self.store,
            verifier: BuildVerifier::new(
                self.config.verifier.clone(),
                self.config.palette.clone(),
            ),
            world,
            clock,
            guardian: GuardianSession::new(self.config.guardian.clone(), clock.now_ms()),
            events: EventLog::new(),
            session,
            centroid,
            stop,
        };
        run.run()
    }
}

// ---------------------------------------------------------------------------
// One attempt
// ---------------------------------------------------------------------------

/// Everything one build attempt owns while it runs.
struct BuildRun<'a> {
    config: &'a GantryConfig,
    store: &'a CheckpointStore,
    verifier: BuildVerifier,
    world: &'a mut dyn WorldPort,
    clock: &'a dyn Clock,
    guardian: GuardianSession,
    events: EventLog,
    session: BuildSession,
    centroid: Option<(f64, f64, f64)>,
    stop: &'a StopHandle,
}

impl BuildRun<'_> {
    /// Borrow-splitting helper: hand the session and a fresh `PhaseContext`
    /// to the closure.
    fn with_ctx<T>(
        &mut self,
        f: impl FnOnce(&mut BuildSession, &mut PhaseContext<'_>) -> T,
    ) -> T {
        let mut ctx = PhaseContext {
            world: &mut *self.world,
            verifier: &self.verifier,
            store: self.store,
            clock: self.clock,
            config: self.config,
            events: &mut self.events,
            stop: self.stop.clone(),
        };
        f(&mut self.session, &mut ctx)
    }

    fn run(mut self) -> Result<BuildReport, BuildError> {
        let now = self.clock.now_ms();
        self.events.push(
            now,
            BuildEventKind::SessionStarted {
                session_id: self.session.session_id.clone(),
                building_type: self.session.blueprint.building_type.clone(),
                total_blocks: self.session.progress.total_blocks,
            },
        );
        // Immediate checkpoint so even a brand-new session is resumable.
        self.with_ctx(|s, ctx| s.create_checkpoint(ctx, "session started"))?;

        let mut stopped_early = false;
        while self.session.phase != Phase::Complete {
            if self.stop.is_stopped() {
                stopped_early = true;
                let phase = self.session.phase;
                self.events
                    .push(self.clock.now_ms(), BuildEventKind::BuildStopped { phase });
                self.with_ctx(|s, ctx| s.create_checkpoint(ctx, "stopped by request"))?;
                break;
            }
            self.pump();

            let phase = self.session.phase;
            self.events
                .push(self.clock.now_ms(), BuildEventKind::PhaseStarted { phase });
            match self.with_ctx(|s, ctx| s.execute_current_phase(ctx)) {
                Ok(true) => {
                    let now = self.clock.now_ms();
                    self.guardian.update_progress(now);
                    self.guardian.record_success(
                        &phase.to_string(),
                        self.session.session_id.as_str(),
                        now,
                    );
                    self.with_ctx(|s, ctx| s.advance_phase(ctx))?;
                }
                Ok(false) => {
                    self.handle_phase_failure(phase, "phase handler reported failure".into())?;
                }
                Err(err) => {
                    self.handle_phase_failure(phase, err.to_string())?;
                }
            }
        }

        let mut structure = None;
        let mut functionality = None;
        let mut repair_actions = Vec::new();
        if !stopped_early {
            let (s, f, actions) = self.post_build_verification()?;
            structure = Some(s);
            functionality = Some(f);
            repair_actions = actions;
        }

        Ok(BuildReport {
            session_id: self.session.session_id.clone(),
            final_phase: self.session.phase,
            progress: self.session.progress.clone(),
            structure,
            functionality,
            repair_actions,
            warnings: self.guardian.warnings.clone(),
            failures: self.guardian.failures.clone(),
            events: self.events.into_events(),
            stopped_early,
        })
    }

    /// Failure path of the main loop: record (possibly escalating), write an
    /// emergency checkpoint, back off, and advance anyway.
    fn handle_phase_failure(&mut self, phase: Phase, reason: String) -> Result<(), BuildError> {
        tracing::warn!(%phase, %reason, "phase failed");
        let now = self.clock.now_ms();
        self.events.push(
            now,
            BuildEventKind::PhaseFailed {
                phase,
                reason: reason.clone(),
            },
        );
        let escalation = self.guardian.record_failure(
            &phase.to_string(),
            self.session.session_id.as_str(),
            &reason,
            now,
        );
        if let Some(strategy) = escalation {
            self.apply_recovery(strategy);
        }
        self.with_ctx(|s, ctx| s.create_checkpoint(ctx, "emergency checkpoint"))?;
        self.backoff();
        self.with_ctx(|s, ctx| s.advance_phase(ctx))?;
        Ok(())
    }

    /// Gather a snapshot, run due guardian checks, surface new warnings as
    /// events, and execute any selected recovery.
    fn pump(&mut self) {
        let now = self.clock.now_ms();
        let snapshot = WorldSnapshot::gather(
            &*self.world,
            &self.config.palette,
            self.centroid,
            self.config.guardian.hostile_radius,
            now,
        );
        let seen = self.guardian.warnings.len();
        let actions = self.guardian.run_due_checks(&snapshot);
        for note in self.guardian.warnings[seen..].to_vec() {
            self.events.push(
                note.at_ms,
                BuildEventKind::GuardianWarning {
                    message: note.message,
                },
            );
        }
        for strategy in actions {
            self.apply_recovery(strategy);
        }
    }

    fn apply_recovery(&mut self, strategy: RecoveryStrategy) {
        let now = self.clock.now_ms();
        let succeeded = match &strategy {
            RecoveryStrategy::Stagnation => {
                // Give the in-flight phase another chance.
                self.guardian.update_progress(now);
                matches!(self.with_ctx(|s, ctx| s.execute_current_phase(ctx)), Ok(true))
            }
            RecoveryStrategy::Stuck => {
                let moved = match self.world.agent_position() {
                    Ok(pos) => [(3, 0), (-3, 0), (0, 3), (0, -3)]
                        .iter()
                        .any(|&(dx, dz)| self.world.move_to(pos.offset(dx, 0, dz)).is_ok()),
                    Err(_) => false,
                };
                self.guardian.update_progress(now);
                moved
            }
            RecoveryStrategy::RepeatedFailure { kind } => {
                // The pluggable strategy-switch hook: today it resets the
                // counter and the progress timer.
                self.guardian.reset_failure_counter(kind);
                self.guardian.update_progress(now);
                true
            }
        };
        self.events.push(
            self.clock.now_ms(),
            BuildEventKind::RecoveryAttempted {
                strategy: strategy.to_string(),
                succeeded,
            },
        );
    }

    /// Fixed post-failure wait, pumping guardian checks while it elapses.
    fn backoff(&mut self) {
        let total = self.config.manager.phase_failure_backoff_ms;
        let chunk = self.config.manager.pump_interval_ms.max(1);
        let mut waited = 0;
        while waited < total {
            let step = chunk.min(total - waited);
            self.clock.sleep_ms(step);
            waited += step;
            self.pump();
        }
    }

    /// Structure sweep (with one re-validation after repairs) plus the
    /// functionality battery and its best-effort fixes.
    fn post_build_verification(
        &mut self,
    ) -> Result<(StructureReport, FunctionalityReport, Vec<String>), BuildError> {
        let first =
            self.verifier
                .validate_structure(&mut *self.world, self.clock, &self.session.blueprint)?;
        let structure = if first.is_complete {
            first
        } else {
            self.verifier
                .validate_structure(&mut *self.world, self.clock, &self.session.blueprint)?
        };
        self.events.push(
            self.clock.now_ms(),
            BuildEventKind::StructureValidated {
                accuracy: structure.accuracy,
                is_complete: structure.is_complete,
            },
        );

        let mut functionality = self
            .verifier
            .validate_functionality(&*self.world, &self.session.blueprint)?;
        let mut repair_actions = Vec::new();
        if !functionality.functional {
            repair_actions = self.verifier.attempt_structural_fixes(
                &mut *self.world,
                &self.session.blueprint,
                &functionality,
            )?;
            functionality = self
                .verifier
                .validate_functionality(&*self.world, &self.session.blueprint)?;
        }
        self.events.push(
            self.clock.now_ms(),
            BuildEventKind::FunctionalityChecked {
                functional: functionality.functional,
                failed_tests: functionality.failed_test_names(),
            },
        );
        self.events.push(
            self.clock.now_ms(),
            BuildEventKind::BuildCompleted {
                session_id: self.session.session_id.clone(),
                accuracy: structure.accuracy,
            },
        );
        Ok((structure, functionality, repair_actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::BlockSpec;
    use crate::schedule::ManualClock;
    use crate::types::{BlockKind, BlockPos};
    use crate::world::GridWorld;

    fn house_blueprint() -> Blueprint {
        let mut blocks = Vec::new();
        for x in 10..15 {
            for z in 10..15 {
                blocks.push(BlockSpec::new(BlockKind::OakPlanks, BlockPos::new(x, 1, z)));
                blocks.push(BlockSpec::new(BlockKind::OakPlanks, BlockPos::new(x, 5, z)));
            }
        }
        for y in 2..5 {
            for x in 10..15 {
                for z in 10..15 {
                    if x == 10 || x == 14 || z == 10 || z == 14 {
                        blocks.push(BlockSpec::new(BlockKind::OakPlanks, BlockPos::new(x, y, z)));
                    }
                }
            }
        }
        blocks.retain(|b| b.pos != BlockPos::new(12, 2, 14));
        blocks.push(BlockSpec::new(BlockKind::OakDoor, BlockPos::new(12, 2, 14)));
        Blueprint::new("house", blocks)
    }

    fn ready_world() -> GridWorld {
        let mut world = GridWorld::new(BlockPos::new(0, 0, 0), 32, 24, 32);
        world.fill_layer(0, BlockKind::GrassBlock);
        world.stock(BlockKind::OakPlanks, 512);
        world.stock(BlockKind::OakDoor, 4);
        world.stock_item("stone_pickaxe", 1);
        world.stock_item("iron_axe", 1);
        world.stock_item("shovel", 1);
        world.set_agent_position(BlockPos::new(12, 1, 8));
        world
    }

    fn manager(dir: &tempfile::TempDir) -> BuildManager {
        BuildManager::new(GantryConfig::default(), CheckpointStore::new(dir.path()))
    }

    #[test]
    fn gate_passes_on_a_ready_site() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        let world = ready_world();
        let gate = m.prebuild_gate(&world, &house_blueprint()).unwrap();
        assert!(gate.passed(), "gate failed: {}", gate.summary());
        assert_eq!(gate.checks.len(), 4);
    }

    #[test]
    fn gate_reports_each_failing_check() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        let mut world = GridWorld::new(BlockPos::new(0, 0, 0), 32, 24, 32);
        // No inventory, an obstacle in the site, rain, and a hostile nearby.
        world.set_cell(BlockPos::new(12, 2, 12), Some(BlockKind::StoneBricks));
        world.weather.raining = true;
        world.entities.push(crate::types::Entity {
            kind: EntityKind::Hostile,
            name: "creeper".into(),
            position: BlockPos::new(14, 1, 12),
        });
        world.set_agent_position(BlockPos::new(12, 1, 8));

        let gate = m.prebuild_gate(&world, &house_blueprint()).unwrap();
        assert!(!gate.passed());
        let failed: Vec<&str> = gate
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name)
            .collect();
        assert_eq!(failed, vec!["materials", "terrain", "environment", "tools"]);
        assert!(gate.summary().contains("raining"));
    }

    #[test]
    fn failed_gate_without_force_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        let mut world = GridWorld::new(BlockPos::new(0, 0, 0), 32, 24, 32);
        let clock = ManualClock::new();
        let err = m
            .build(&mut world, &clock, house_blueprint(), false, &StopHandle::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::Validation(_)));
    }

    #[test]
    fn full_build_reaches_complete_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        let mut world = ready_world();
        let clock = ManualClock::new();

        let report = m
            .build(&mut world, &clock, house_blueprint(), false, &StopHandle::new())
            .unwrap();

        assert_eq!(report.final_phase, Phase::Complete);
        assert!(!report.stopped_early);
        assert_eq!(
            report.progress.completed_phases,
            Phase::SEQUENCE[..8].to_vec()
        );
        let structure = report.structure.expect("structure report");
        assert!(structure.is_complete, "accuracy {}", structure.accuracy);
        assert!(report.functionality.expect("functionality report").functional);
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e.kind, BuildEventKind::BuildCompleted { .. })));
    }

    #[test]
    fn phase_failures_are_survived_and_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        // Materials are required but never stocked: resource gathering
        // fails and every placement faults.
        let mut world = GridWorld::new(BlockPos::new(0, 0, 0), 32, 24, 32);
        world.fill_layer(0, BlockKind::GrassBlock);
        world.require_materials = true;
        world.set_agent_position(BlockPos::new(12, 1, 8));
        let clock = ManualClock::new();

        let report = m
            .build(&mut world, &clock, house_blueprint(), true, &StopHandle::new())
            .unwrap();

        // The loop still walked the whole phase sequence.
        assert_eq!(report.final_phase, Phase::Complete);
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e.kind, BuildEventKind::PhaseFailed { .. })));
        // Nothing was placed, and verification says so.
        let structure = report.structure.expect("structure report");
        assert!(!structure.is_complete);
        assert!(structure.accuracy < 1.0);
        assert!(!report.failures.is_empty());
    }

    #[test]
    fn stop_request_halts_between_phases() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        let mut world = ready_world();
        let clock = ManualClock::new();
        let stop = StopHandle::new();
        stop.stop();

        let report = m
            .build(&mut world, &clock, house_blueprint(), false, &stop)
            .unwrap();
        assert!(report.stopped_early);
        assert_ne!(report.final_phase, Phase::Complete);
        assert!(report.structure.is_none());
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e.kind, BuildEventKind::BuildStopped { .. })));
    }

    #[test]
    fn stopped_session_is_listed_and_resumable() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        let mut world = ready_world();
        let clock = ManualClock::new();
        let stop = StopHandle::new();
        stop.stop();
        let stopped = m
            .build(&mut world, &clock, house_blueprint(), false, &stop)
            .unwrap();

        let sessions = m.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, stopped.session_id);

        let resumed = m
            .resume(&mut world, &clock, &stopped.session_id, &StopHandle::new())
            .unwrap();
        assert_eq!(resumed.final_phase, Phase::Complete);
        assert!(resumed.structure.expect("structure report").is_complete);
    }

    #[test]
    fn resume_unknown_session_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir);
        let mut world = ready_world();
        let clock = ManualClock::new();
        let err = m
            .resume(
                &mut world,
                &clock,
                &SessionId::from_string("build_nope"),
                &StopHandle::new(),
            )
            .unwrap_err();
        assert!(matches!(err, BuildError::SessionNotFound(_)));
    }
}
