// Data-driven driver configuration.
//
// All tunable parameters live here in `GantryConfig`, loadable from JSON at
// startup. The driver never uses magic numbers — monitor periods, recovery
// thresholds, verification radii, and batch caps are all read from the
// config, grouped into nested sub-structs: `GuardianThresholds`,
// `VerifierConfig`, `ManagerConfig`, and `MaterialPalette`.
//
// `MaterialPalette` is the set of capability tables that replaces block-name
// string matching everywhere: which kinds are decorative details, which are
// natural terrain (not a site obstacle), which are tolerated inside a
// dwelling, and which materials may be used for structural or wall repairs.
//
// See also: `guardian.rs` which reads `GuardianThresholds`, `verify.rs`
// which reads `VerifierConfig` + `MaterialPalette`, `manager.rs` which reads
// `ManagerConfig`.

use crate::types::BlockKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Guardian thresholds
// ---------------------------------------------------------------------------

/// Monitor periods and trigger thresholds for the construction guardian.
///
/// All durations are in milliseconds of driver time (see `schedule::Clock`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuardianThresholds {
    /// No progress update for longer than this counts as stagnation.
    pub max_stagnant_ms: u64,
    /// Displacement below `min_movement` for longer than this (since the
    /// last progress update) counts as stuck.
    pub stuck_window_ms: u64,
    /// Minimum displacement, in block units, to count as movement.
    pub min_movement: f64,
    /// A per-kind failure count reaching this fires repeated-failure
    /// escalation.
    pub max_repeated_failures: u32,
    /// Building-material stacks below this total raise a resource warning.
    pub min_resources_threshold: u32,
    /// Distance from the blueprint centroid beyond this raises a warning.
    pub max_distance_from_site: f64,
    /// Health at or below this raises a health warning.
    pub health_threshold: f32,
    /// Food at or below this raises a health warning.
    pub food_threshold: f32,
    /// Radius scanned for hostile entities.
    pub hostile_radius: f64,

    /// Progress check period.
    pub progress_check_ms: u64,
    /// Position check period.
    pub position_check_ms: u64,
    /// Environment tick period (mob/weather sub-checks gate themselves).
    pub environment_check_ms: u64,
    /// Minimum interval between hostile-mob scans.
    pub mob_check_ms: u64,
    /// Minimum interval between weather checks.
    pub weather_check_ms: u64,
    /// Resource/distance check period.
    pub resource_check_ms: u64,
    /// Health check period.
    pub health_check_ms: u64,

    /// Rolling window for the success/failure pattern log.
    pub pattern_window_ms: u64,
}

impl Default for GuardianThresholds {
    fn default() -> Self {
        Self {
            max_stagnant_ms: 30_000,
            stuck_window_ms: 10_000,
            min_movement: 1.0,
            max_repeated_failures: 5,
            min_resources_threshold: 10,
            max_distance_from_site: 20.0,
            health_threshold: 5.0,
            food_threshold: 5.0,
            hostile_radius: 20.0,
            progress_check_ms: 5_000,
            position_check_ms: 5_000,
            environment_check_ms: 5_000,
            mob_check_ms: 10_000,
            weather_check_ms: 30_000,
            resource_check_ms: 10_000,
            health_check_ms: 3_000,
            pattern_window_ms: 24 * 60 * 60 * 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Verifier parameters
// ---------------------------------------------------------------------------

/// Verification delays, scan bands, and repair batch caps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Delay between issuing a placement and querying the cell, covering the
    /// world's eventual-consistency window.
    pub settle_delay_ms: u64,
    /// Per `validate_structure` call: at most this many missing-block fixes
    /// and this many wrong-block fixes.
    pub max_structure_fixes: usize,
    /// Per `attempt_structural_fixes` call: at most this many fixes per
    /// failed functionality test.
    pub max_functional_fixes: usize,
    /// Ground-level perimeter gaps beyond this fail the enclosure test.
    pub max_enclosure_gaps: usize,
    /// Height of the perimeter band scanned for wall presence, in cells
    /// above the foundation layer.
    pub enclosure_band: i32,
    /// Minimum fraction of floor cells that must have roof cover.
    pub roof_min_coverage: f64,
    /// Roof cover is searched this many cells above a floor cell (inclusive
    /// bounds).
    pub roof_scan_min: i32,
    pub roof_scan_max: i32,
    /// Interior obstructions beyond this fail the interior-clearing test.
    pub max_interior_obstructions: usize,
    /// Interior cells are scanned this many cells above a floor cell
    /// (inclusive bounds).
    pub interior_band_min: i32,
    pub interior_band_max: i32,
    /// Perimeter margin excluded from the interior scan.
    pub interior_margin: i32,
    /// Blocks with lateral but no vertical support tolerated before the
    /// integrity test fails. Floating blocks (no support at all) always fail.
    pub max_unsupported_blocks: usize,
    /// The door-presence scan covers the blueprint bounding box expanded by
    /// this margin.
    pub door_scan_margin: i32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 250,
            max_structure_fixes: 10,
            max_functional_fixes: 5,
            max_enclosure_gaps: 10,
            enclosure_band: 2,
            roof_min_coverage: 0.7,
            roof_scan_min: 3,
            roof_scan_max: 5,
            max_interior_obstructions: 5,
            interior_band_min: 1,
            interior_band_max: 3,
            interior_margin: 1,
            max_unsupported_blocks: 10,
            door_scan_margin: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Manager parameters
// ---------------------------------------------------------------------------

/// Orchestration cadence: checkpoint interval and failure backoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// A mid-phase checkpoint is written every this many placed blocks.
    pub checkpoint_interval_blocks: u32,
    /// Fixed wait after a failed phase before advancing anyway.
    pub phase_failure_backoff_ms: u64,
    /// Guardian checks are pumped at least this often during long waits.
    pub pump_interval_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval_blocks: 20,
            phase_failure_backoff_ms: 5_000,
            pump_interval_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Material palette — capability tables
// ---------------------------------------------------------------------------

/// Capability tables over `BlockKind`.
///
/// Every "what sort of block is this" question the driver asks is answered
/// here, by membership in an explicit table. Repair material lists are in
/// preference order: the first kind with inventory stock wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialPalette {
    /// Decorative kinds built during the details phase.
    pub detail_blocks: BTreeSet<BlockKind>,
    /// Door kinds accepted by the door-presence test.
    pub door_blocks: BTreeSet<BlockKind>,
    /// Terrain kinds that are not site obstacles.
    pub natural_terrain: BTreeSet<BlockKind>,
    /// Kinds tolerated inside a dwelling (not interior obstructions).
    pub interior_allowed: BTreeSet<BlockKind>,
    /// Kinds counted as building material for resource warnings, and used
    /// (in order) for structural support repairs.
    pub structural_materials: Vec<BlockKind>,
    /// Kinds used (in order) to fill wall gaps.
    pub wall_materials: Vec<BlockKind>,
    /// Earth kind used when levelling ground under the foundation.
    pub fill_material: BlockKind,
    /// Item names accepted by the tool-availability check. Matched by
    /// substring against inventory item names ("stone_pickaxe" satisfies
    /// "pickaxe").
    pub tool_names: Vec<String>,
}

impl Default for MaterialPalette {
    fn default() -> Self {
        Self {
            detail_blocks: BTreeSet::from([
                BlockKind::OakDoor,
                BlockKind::SpruceDoor,
                BlockKind::Glass,
                BlockKind::GlassPane,
                BlockKind::Torch,
                BlockKind::Ladder,
            ]),
            door_blocks: BTreeSet::from([BlockKind::OakDoor, BlockKind::SpruceDoor]),
            natural_terrain: BTreeSet::from([
                BlockKind::Stone,
                BlockKind::Dirt,
                BlockKind::GrassBlock,
                BlockKind::Sand,
                BlockKind::Gravel,
                BlockKind::TallGrass,
            ]),
            interior_allowed: BTreeSet::from([
                BlockKind::Torch,
                BlockKind::OakDoor,
                BlockKind::SpruceDoor,
                BlockKind::Ladder,
            ]),
            structural_materials: vec![
                BlockKind::OakPlanks,
                BlockKind::Cobblestone,
                BlockKind::StoneBricks,
                BlockKind::OakLog,
            ],
            wall_materials: vec![
                BlockKind::OakPlanks,
                BlockKind::StoneBricks,
                BlockKind::Cobblestone,
            ],
            fill_material: BlockKind::Dirt,
            tool_names: vec!["pickaxe".into(), "axe".into(), "shovel".into()],
        }
    }
}

impl MaterialPalette {
    pub fn is_detail(&self, kind: BlockKind) -> bool {
        self.detail_blocks.contains(&kind)
    }

    pub fn is_door(&self, kind: BlockKind) -> bool {
        self.door_blocks.contains(&kind)
    }

    pub fn is_natural(&self, kind: BlockKind) -> bool {
        self.natural_terrain.contains(&kind)
    }

    pub fn is_interior_allowed(&self, kind: BlockKind) -> bool {
        self.interior_allowed.contains(&kind)
    }

    pub fn is_building_material(&self, kind: BlockKind) -> bool {
        self.structural_materials.contains(&kind) || self.wall_materials.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Complete driver configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GantryConfig {
    pub guardian: GuardianThresholds,
    pub verifier: VerifierConfig,
    pub manager: ManagerConfig,
    pub palette: MaterialPalette,
}

impl GantryConfig {
    /// Load a config from a JSON string. Missing fields are an error — a
    /// config file is all-or-nothing, matching its role as the single
    /// source of tunables.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = GantryConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = GantryConfig::from_json(&json).unwrap();
        assert_eq!(config.guardian.max_stagnant_ms, restored.guardian.max_stagnant_ms);
        assert_eq!(config.verifier.settle_delay_ms, restored.verifier.settle_delay_ms);
        assert_eq!(
            config.manager.checkpoint_interval_blocks,
            restored.manager.checkpoint_interval_blocks
        );
        assert_eq!(config.palette.detail_blocks, restored.palette.detail_blocks);
    }

    #[test]
    fn default_thresholds_match_contract() {
        let t = GuardianThresholds::default();
        assert_eq!(t.max_stagnant_ms, 30_000);
        assert_eq!(t.max_repeated_failures, 5);
        assert_eq!(t.min_resources_threshold, 10);
        assert_eq!(t.max_distance_from_site, 20.0);
        assert_eq!(t.health_check_ms, 3_000);
        assert_eq!(t.progress_check_ms, 5_000);
    }

    #[test]
    fn palette_classifies_detail_and_natural() {
        let p = MaterialPalette::default();
        assert!(p.is_detail(BlockKind::Torch));
        assert!(p.is_detail(BlockKind::GlassPane));
        assert!(!p.is_detail(BlockKind::OakPlanks));
        assert!(p.is_natural(BlockKind::GrassBlock));
        assert!(!p.is_natural(BlockKind::StoneBricks));
        assert!(p.is_door(BlockKind::OakDoor));
        assert!(!p.is_door(BlockKind::Glass));
    }

    #[test]
    fn config_loads_from_partial_override_json() {
        // Full document produced from Default, with one field tweaked — the
        // way a deployment would maintain its config file.
        let mut value = serde_json::to_value(GantryConfig::default()).unwrap();
        value["guardian"]["max_stagnant_ms"] = serde_json::json!(12_000);
        let config = GantryConfig::from_json(&value.to_string()).unwrap();
        assert_eq!(config.guardian.max_stagnant_ms, 12_000);
        // Untouched fields keep their values.
        assert_eq!(config.guardian.health_check_ms, 3_000);
    }
}
