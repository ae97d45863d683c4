// Core types shared across the construction driver.
//
// Defines spatial coordinates (`BlockPos`), the closed block vocabulary
// (`BlockKind`), session identifiers, and the small value types read off the
// world through `WorldPort` (vitals, weather, entities, item stacks). All
// persisted types derive `Serialize`/`Deserialize` for checkpoint save/load.
//
// `BlockKind` is a closed enum rather than free-form block-name strings:
// every classification decision in the driver (detail blocks, natural
// terrain, interior allow-list) is a table lookup over this enum — see
// `config.rs` for the capability tables.
//
// See also: `blueprint.rs` for `BlockSpec` built on these types, `world.rs`
// for the `WorldPort` trait that produces/consumes them.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A position in the 3D block grid, in absolute world coordinates.
///
/// The coordinate system uses right-handed conventions:
/// - X: east  (positive) / west  (negative)
/// - Y: up    (positive) / down  (negative)
/// - Z: south (positive) / north (negative)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Offsets to the 6 face-adjacent neighbors (±x, ±y, ±z).
pub const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Offsets to the 4 horizontal (lateral) neighbors at the same height.
pub const LATERAL_OFFSETS: [(i32, i32, i32); 4] = [(1, 0, 0), (-1, 0, 0), (0, 0, 1), (0, 0, -1)];

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The 6 face-adjacent neighbors, in `FACE_OFFSETS` order.
    pub fn face_neighbors(self) -> [BlockPos; 6] {
        let mut out = [self; 6];
        for (i, &(dx, dy, dz)) in FACE_OFFSETS.iter().enumerate() {
            out[i] = self.offset(dx, dy, dz);
        }
        out
    }

    /// Manhattan distance between two positions.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs()
            + (self.y - other.y).unsigned_abs()
            + (self.z - other.z).unsigned_abs()
    }

    /// Euclidean distance between two positions, in block units.
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Euclidean distance from this position to a fractional point.
    pub fn distance_to_point(self, point: (f64, f64, f64)) -> f64 {
        let dx = f64::from(self.x) - point.0;
        let dy = f64::from(self.y) - point.1;
        let dz = f64::from(self.z) - point.2;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Block vocabulary
// ---------------------------------------------------------------------------

/// The material/type of a single block cell.
///
/// A closed vocabulary: the driver never classifies blocks by substring
/// matching on names. An empty cell is represented as `Option::<BlockKind>::None`
/// at the `WorldPort` boundary, not as a variant here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockKind {
    // Structural / crafted
    OakPlanks,
    OakLog,
    StoneBricks,
    Cobblestone,
    OakStairs,
    // Decorative / functional details
    OakDoor,
    SpruceDoor,
    Glass,
    GlassPane,
    Torch,
    Ladder,
    // Natural terrain
    Stone,
    Dirt,
    GrassBlock,
    Sand,
    Gravel,
    TallGrass,
    OakLeaves,
}

impl BlockKind {
    pub const ALL: [BlockKind; 18] = [
        BlockKind::OakPlanks,
        BlockKind::OakLog,
        BlockKind::StoneBricks,
        BlockKind::Cobblestone,
        BlockKind::OakStairs,
        BlockKind::OakDoor,
        BlockKind::SpruceDoor,
        BlockKind::Glass,
        BlockKind::GlassPane,
        BlockKind::Torch,
        BlockKind::Ladder,
        BlockKind::Stone,
        BlockKind::Dirt,
        BlockKind::GrassBlock,
        BlockKind::Sand,
        BlockKind::Gravel,
        BlockKind::TallGrass,
        BlockKind::OakLeaves,
    ];

    /// The inventory item name for this block kind.
    pub fn item_name(self) -> &'static str {
        match self {
            BlockKind::OakPlanks => "oak_planks",
            BlockKind::OakLog => "oak_log",
            BlockKind::StoneBricks => "stone_bricks",
            BlockKind::Cobblestone => "cobblestone",
            BlockKind::OakStairs => "oak_stairs",
            BlockKind::OakDoor => "oak_door",
            BlockKind::SpruceDoor => "spruce_door",
            BlockKind::Glass => "glass",
            BlockKind::GlassPane => "glass_pane",
            BlockKind::Torch => "torch",
            BlockKind::Ladder => "ladder",
            BlockKind::Stone => "stone",
            BlockKind::Dirt => "dirt",
            BlockKind::GrassBlock => "grass_block",
            BlockKind::Sand => "sand",
            BlockKind::Gravel => "gravel",
            BlockKind::TallGrass => "tall_grass",
            BlockKind::OakLeaves => "oak_leaves",
        }
    }

    /// Look up a block kind from its inventory item name.
    pub fn from_item_name(name: &str) -> Option<BlockKind> {
        BlockKind::ALL.iter().copied().find(|k| k.item_name() == name)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.item_name())
    }
}

// ---------------------------------------------------------------------------
// Session identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a build session: a UTC timestamp plus a random
/// hex suffix, e.g. `build_20260806_143015_a3f9`.
///
/// The timestamp component keeps checkpoint files browsable in creation
/// order; the suffix disambiguates sessions started within the same second.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id from the current wall-clock time.
    pub fn generate() -> Self {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let suffix: u16 = rand::thread_rng().r#gen();
        Self(format!("build_{stamp}_{suffix:04x}"))
    }

    /// Wrap an existing id (e.g. parsed from a CLI argument).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// World observation types
// ---------------------------------------------------------------------------

/// A stack of items in the agent's inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub name: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Broad behavioral class of a nearby entity. The driver only ever branches
/// on this enum, never on entity name strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Hostile,
    Passive,
    Player,
    Other,
}

/// An entity observed near the agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    pub position: BlockPos,
}

/// Agent health and hunger, both on the usual 0–20 scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentVitals {
    pub health: f32,
    pub food: f32,
}

/// World weather and day-cycle state.
///
/// `time_of_day` is in world ticks, 0..24000. The night window is
/// 13000..23000 — the hours hostile mobs spawn on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weather {
    pub raining: bool,
    pub time_of_day: u32,
}

impl Weather {
    pub fn is_night(&self) -> bool {
        (13000..23000).contains(&self.time_of_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_pos_manhattan_distance() {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(3, 4, 5);
        assert_eq!(a.manhattan_distance(b), 12);
        assert_eq!(b.manhattan_distance(a), 12);
    }

    #[test]
    fn block_pos_euclidean_distance() {
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(3, 4, 0);
        assert!((a.distance(b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn block_pos_ordering() {
        // Verify BlockPos has a total order (needed for BTreeMap keys).
        let a = BlockPos::new(0, 0, 0);
        let b = BlockPos::new(1, 0, 0);
        assert!(a < b);
    }

    #[test]
    fn face_neighbors_are_adjacent() {
        let center = BlockPos::new(5, 5, 5);
        for n in center.face_neighbors() {
            assert_eq!(center.manhattan_distance(n), 1);
        }
    }

    #[test]
    fn item_name_roundtrip_for_all_kinds() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::from_item_name(kind.item_name()), Some(kind));
        }
        assert_eq!(BlockKind::from_item_name("netherite_hoe"), None);
    }

    #[test]
    fn session_id_has_expected_shape() {
        let id = SessionId::generate();
        let s = id.as_str();
        assert!(s.starts_with("build_"), "got {s}");
        // build_YYYYMMDD_HHMMSS_xxxx
        assert_eq!(s.split('_').count(), 4);
        let suffix = s.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn night_window_boundaries() {
        assert!(!Weather { raining: false, time_of_day: 12999 }.is_night());
        assert!(Weather { raining: false, time_of_day: 13000 }.is_night());
        assert!(Weather { raining: false, time_of_day: 22999 }.is_night());
        assert!(!Weather { raining: false, time_of_day: 23000 }.is_night());
        assert!(!Weather { raining: false, time_of_day: 0 }.is_night());
    }

    #[test]
    fn session_id_serializes_transparently() {
        let id = SessionId::from_string("build_20260806_120000_beef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"build_20260806_120000_beef\"");
        let restored: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, id);
    }
}
