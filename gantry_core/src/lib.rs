// gantry_core — autonomous construction driver for voxel worlds.
//
// This crate contains all driver logic: the blueprint model, the phase
// state machine, durable checkpointing, the guardian monitor/recovery
// subsystem, and the structural/functional verification engine. It has no
// terminal or network dependencies and runs headless against any
// `WorldPort` implementation — the whole test suite drives it with the
// in-memory `GridWorld` and a hand-advanced clock.
//
// Module overview:
// - `manager.rs`:    BuildManager — pre-build gate, phase loop, guardian pumping, reports.
// - `session.rs`:    BuildSession — the phase state machine and checkpoint cadence.
// - `guardian.rs`:   GuardianSession — threshold monitors and recovery selection.
// - `verify.rs`:     BuildVerifier — per-block, structure, and functionality verification.
// - `blueprint.rs`:  Blueprint data model and geometric phase classification.
// - `checkpoint.rs`: Durable checkpoint store with an explicit session manifest.
// - `world.rs`:      WorldPort trait + the in-memory GridWorld.
// - `schedule.rs`:   Clock abstraction and the periodic check scheduler.
// - `event.rs`:      Narrative build events (the narration-layer sink).
// - `config.rs`:     GantryConfig — thresholds, scan bands, capability tables.
// - `error.rs`:      BuildError taxonomy; nothing here terminates the process.
// - `types.rs`:      BlockPos, BlockKind, SessionId, world observation types.
//
// The companion crate `gantry_cli` wraps this library in a command-line
// driver with blueprint generators and logging bootstrap. That boundary is
// enforced at the compiler level — this crate cannot print, parse
// arguments, or install a tracing subscriber.
//
// Determinism note: collections that are iterated or persisted use
// `BTreeMap`/`BTreeSet`; driver time comes from an injected `Clock`; the
// only OS entropy is session-id generation. Given a scripted world and a
// manual clock, every code path in this crate is reproducible.

pub mod blueprint;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod guardian;
pub mod manager;
pub mod schedule;
pub mod session;
pub mod types;
pub mod verify;
pub mod world;
