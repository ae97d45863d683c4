// Construction guardian — threshold monitoring and recovery selection.
//
// A `GuardianSession` watches one build attempt for stalls, a stuck agent,
// environmental hazards, resource shortages, and low vitals. It is an
// explicit value owned by the orchestrator, constructed per attempt and
// dropped when the attempt ends — there is no process-wide monitor state.
//
// Five check families run on independent periods (see
// `GuardianThresholds`), driven by the `CheckScheduler`. Each check is a
// pure decision over a `WorldSnapshot`: it may append a warning and may
// return a `RecoveryStrategy` for the driver to execute. The guardian
// itself never touches the world or the session — it is read-mostly toward
// both, which keeps every threshold testable with a manual clock.
//
// Recovery selection:
// - stagnation: no progress update for over `max_stagnant_ms` → re-run the
//   current phase handler (driver-side) after resetting the progress timer.
// - stuck: displacement under `min_movement` for over `stuck_window_ms` →
//   bounded cardinal-offset moves (driver-side).
// - repeated failure: a per-kind failure counter reaching
//   `max_repeated_failures` fires exactly once and is reset to zero by the
//   recovery — the system's only cross-cutting "change approach" signal.
// Environment, resource, and health checks warn without forcing recovery.
//
// Recorded outcomes feed a rolling 24-hour pattern window, pruned on each
// insert.
//
// See also: `schedule.rs` for the check scheduler, `manager.rs` for
// snapshot gathering and recovery execution.

use crate::config::{GuardianThresholds, MaterialPalette};
use crate::schedule::{CheckKind, CheckScheduler};
use crate::types::{AgentVitals, BlockKind, BlockPos, EntityKind, Weather};
use crate::world::WorldPort;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time world observation the checks decide over. Gathered by the
/// driver at each pump; query faults leave fields `None` rather than
/// failing the pump.
#[derive(Clone, Debug)]
pub struct WorldSnapshot {
    pub now_ms: u64,
    pub agent_position: Option<BlockPos>,
    pub vitals: Option<AgentVitals>,
    pub weather: Option<Weather>,
    pub hostile_count: usize,
    pub building_material_count: u32,
    pub distance_from_site: Option<f64>,
}

impl WorldSnapshot {
    /// Gather a snapshot from the world, best-effort.
    pub fn gather(
        world: &dyn WorldPort,
        palette: &MaterialPalette,
        site_centroid: Option<(f64, f64, f64)>,
        hostile_radius: f64,
        now_ms: u64,
    ) -> Self {
        let agent_position = world.agent_position().ok();
        let hostile_count = world
            .nearby_entities(hostile_radius)
            .map(|entities| {
                entities
                    .iter()
                    .filter(|e| e.kind == EntityKind::Hostile)
                    .count()
            })
            .unwrap_or(0);
        let building_material_count = world
            .inventory()
            .map(|stacks| {
                stacks
                    .iter()
                    .filter_map(|s| {
                        BlockKind::from_item_name(&s.name)
                            .filter(|k| palette.is_building_material(*k))
                            .map(|_| s.count)
                    })
                    .sum()
            })
            .unwrap_or(0);
        let distance_from_site = match (agent_position, site_centroid) {
            (Some(pos), Some(centroid)) => Some(pos.distance_to_point(centroid)),
            _ => None,
        };
        Self {
            now_ms,
            agent_position,
            vitals: world.agent_vitals().ok(),
            weather: world.weather().ok(),
            hostile_count,
            building_material_count,
            distance_from_site,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics and patterns
// ---------------------------------------------------------------------------

/// A timestamped diagnostic line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianNote {
    pub at_ms: u64,
    pub message: String,
}

/// One recorded outcome in the rolling pattern window.
#[derive(Clone, Debug)]
struct PatternRecord {
    at_ms: u64,
    #[allow(dead_code)]
    action: String,
    #[allow(dead_code)]
    context: String,
}

/// The recovery the driver should attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Reset the progress timer and re-run the current phase handler.
    Stagnation,
    /// Try a bounded set of cardinal moves to unwedge the agent.
    Stuck,
    /// Reset the named failure counter — the hook where a smarter
    /// strategy switch would plug in.
    RepeatedFailure { kind: String },
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStrategy::Stagnation => f.write_str("stagnation"),
            RecoveryStrategy::Stuck => f.write_str("stuck"),
            RecoveryStrategy::RepeatedFailure { kind } => {
                write!(f, "repeated_failure({kind})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Guardian session
// ---------------------------------------------------------------------------

/// Monitor state for one build attempt.
#[derive(Debug)]
pub struct GuardianSession {
    thresholds: GuardianThresholds,
    scheduler: CheckScheduler,

    last_progress_ms: u64,
    /// Anchor for the stuck check: only updated when the agent actually
    /// moves at least `min_movement`.
    last_position: Option<BlockPos>,
    last_mob_check_ms: u64,
    last_weather_check_ms: u64,

    repeated_failures: BTreeMap<String, u32>,

    pub warnings: Vec<GuardianNote>,
    pub failures: Vec<GuardianNote>,

    success_patterns: Vec<PatternRecord>,
    failure_patterns: Vec<PatternRecord>,
}

impl GuardianSession {
    pub fn new(thresholds: GuardianThresholds, now_ms: u64) -> Self {
        let mut scheduler = CheckScheduler::new();
        scheduler.schedule(now_ms + thresholds.progress_check_ms, CheckKind::Progress);
        scheduler.schedule(now_ms + thresholds.position_check_ms, CheckKind::Position);
        scheduler.schedule(
            now_ms + thresholds.environment_check_ms,
            CheckKind::Environment,
        );
        scheduler.schedule(now_ms + thresholds.resource_check_ms, CheckKind::Resources);
        scheduler.schedule(now_ms + thresholds.health_check_ms, CheckKind::Health);
        Self {
            thresholds,
            scheduler,
            last_progress_ms: now_ms,
            last_position: None,
            last_mob_check_ms: now_ms,
            last_weather_check_ms: now_ms,
            repeated_failures: BTreeMap::new(),
            warnings: Vec::new(),
            failures: Vec::new(),
            success_patterns: Vec::new(),
            failure_patterns: Vec::new(),
        }
    }

    /// Note forward progress. Called by the driver after successful phase
    /// work and by recovery strategies.
    pub fn update_progress(&mut self, now_ms: u64) {
        self.last_progress_ms = now_ms;
    }

    pub fn last_progress_ms(&self) -> u64 {
        self.last_progress_ms
    }

    /// Record a successful action into the pattern window.
    pub fn record_success(&mut self, action: &str, context: &str, now_ms: u64) {
        self.prune_patterns(now_ms);
        self.success_patterns.push(PatternRecord {
            at_ms: now_ms,
            action: action.to_string(),
            context: context.to_string(),
        });
    }

    /// Record a failed action. Crossing the repeated-failure threshold for
    /// this action kind returns the escalation strategy — exactly on the
    /// threshold count, not beyond it.
    pub fn record_failure(
        &mut self,
        action: &str,
        context: &str,
        reason: &str,
        now_ms: u64,
    ) -> Option<RecoveryStrategy> {
        self.prune_patterns(now_ms);
        self.failure_patterns.push(PatternRecord {
            at_ms: now_ms,
            action: action.to_string(),
            context: context.to_string(),
        });
        self.failures.push(GuardianNote {
            at_ms: now_ms,
            message: format!("{action} failed ({context}): {reason}"),
        });
        let count = {
            let entry = self.repeated_failures.entry(action.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if count == self.thresholds.max_repeated_failures {
            self.warn(
                now_ms,
                format!("'{action}' has failed {count} times, switching approach"),
            );
            Some(RecoveryStrategy::RepeatedFailure {
                kind: action.to_string(),
            })
        } else {
            None
        }
    }

    /// Zero a failure counter. Part of repeated-failure recovery.
    pub fn reset_failure_counter(&mut self, kind: &str) {
        self.repeated_failures.insert(kind.to_string(), 0);
    }

    pub fn failure_count(&self, kind: &str) -> u32 {
        self.repeated_failures.get(kind).copied().unwrap_or(0)
    }

    /// Run every check that has come due, re-arming each at
    /// `now + period`. Re-arming from *now* rather than from the missed
    /// due instant means a long suspension yields one late check, not a
    /// burst of stale ones.
    pub fn run_due_checks(&mut self, snapshot: &WorldSnapshot) -> Vec<RecoveryStrategy> {
        let now = snapshot.now_ms;
        let mut actions = Vec::new();
        while let Some(check) = self.scheduler.pop_due(now) {
            let (action, period) = match check.kind {
                CheckKind::Progress => {
                    (self.check_progress(snapshot), self.thresholds.progress_check_ms)
                }
                CheckKind::Position => {
                    (self.check_position(snapshot), self.thresholds.position_check_ms)
                }
                CheckKind::Environment => (
                    self.check_environment(snapshot),
                    self.thresholds.environment_check_ms,
                ),
                CheckKind::Resources => {
                    (self.check_resources(snapshot), self.thresholds.resource_check_ms)
                }
                CheckKind::Health => {
                    (self.check_health(snapshot), self.thresholds.health_check_ms)
                }
            };
            self.scheduler.schedule(now + period, check.kind);
            actions.extend(action);
        }
        actions
    }

    fn warn(&mut self, at_ms: u64, message: String) {
        tracing::warn!(target: "gantry::guardian", "{message}");
        self.warnings.push(GuardianNote { at_ms, message });
    }

    fn prune_patterns(&mut self, now_ms: u64) {
        let horizon = now_ms.saturating_sub(self.thresholds.pattern_window_ms);
        self.success_patterns.retain(|p| p.at_ms >= horizon);
        self.failure_patterns.retain(|p| p.at_ms >= horizon);
    }

    // -----------------------------------------------------------------------
    // Check bodies
    // -----------------------------------------------------------------------

    fn check_progress(&mut self, snap: &WorldSnapshot) -> Option<RecoveryStrategy> {
        let stagnant = snap.now_ms.saturating_sub(self.last_progress_ms);
        if stagnant > self.thresholds.max_stagnant_ms {
            self.warn(
                snap.now_ms,
                format!("no build progress for {}s", stagnant / 1000),
            );
            Some(RecoveryStrategy::Stagnation)
        } else {
            None
        }
    }

    fn check_position(&mut self, snap: &WorldSnapshot) -> Option<RecoveryStrategy> {
        let pos = snap.agent_position?;
        match self.last_position {
            None => {
                self.last_position = Some(pos);
                None
            }
            Some(anchor) if pos.distance(anchor) >= self.thresholds.min_movement => {
                self.last_position = Some(pos);
                None
            }
            Some(_) => {
                let still = snap.now_ms.saturating_sub(self.last_progress_ms);
                if still > self.thresholds.stuck_window_ms {
                    self.warn(
                        snap.now_ms,
                        format!("agent has not moved for {}s, may be stuck", still / 1000),
                    );
                    Some(RecoveryStrategy::Stuck)
                } else {
                    None
                }
            }
        }
    }

    fn check_environment(&mut self, snap: &WorldSnapshot) -> Option<RecoveryStrategy> {
        if snap.now_ms.saturating_sub(self.last_mob_check_ms) >= self.thresholds.mob_check_ms {
            self.last_mob_check_ms = snap.now_ms;
            if snap.hostile_count > 0 {
                self.warn(
                    snap.now_ms,
                    format!("{} hostile mob(s) near the build site", snap.hostile_count),
                );
            }
        }
        if snap.now_ms.saturating_sub(self.last_weather_check_ms)
            >= self.thresholds.weather_check_ms
        {
            self.last_weather_check_ms = snap.now_ms;
            if let Some(weather) = snap.weather {
                if weather.raining {
                    self.warn(snap.now_ms, "raining at the build site".to_string());
                }
                if weather.is_night() {
                    self.warn(snap.now_ms, "building at night".to_string());
                }
            }
        }
        None
    }

    fn check_resources(&mut self, snap: &WorldSnapshot) -> Option<RecoveryStrategy> {
        if snap.building_material_count < self.thresholds.min_resources_threshold {
            self.warn(
                snap.now_ms,
                format!(
                    "building materials low ({} left)",
                    snap.building_material_count
                ),
            );
        }
        if let Some(distance) = snap.distance_from_site {
            if distance > self.thresholds.max_distance_from_site {
                self.warn(
                    snap.now_ms,
                    format!("agent is {distance:.0} blocks from the build site"),
                );
            }
        }
        None
    }

    fn check_health(&mut self, snap: &WorldSnapshot) -> Option<RecoveryStrategy> {
        let vitals = snap.vitals?;
        if vitals.health <= self.thresholds.health_threshold {
            self.warn(snap.now_ms, format!("health critical: {}", vitals.health));
        }
        if vitals.food <= self.thresholds.food_threshold {
            self.warn(snap.now_ms, format!("hunger critical: {}", vitals.food));
        }
        None
    }
}
