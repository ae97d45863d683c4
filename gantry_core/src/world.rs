// World access boundary.
//
// `WorldPort` is the narrow interface to everything outside this crate's
// control: sensing and mutating the block grid, moving the agent, and
// reading inventory/vitals/weather. Low-level actuation (pathfinding, item
// equip, crafting) lives behind it. All calls are synchronous with bounded
// latency and may fault; queries have eventual-consistency semantics — a
// placed block may take a short, bounded delay to become visible (the
// verifier's settle delay covers this window).
//
// `GridWorld` is the in-memory implementation: a dense 3D grid stored as a
// flat `Vec<Option<BlockKind>>` indexed by
// `x + z * size_x + y * size_x * size_z` relative to an origin corner,
// giving O(1) read/write. Out-of-bounds reads return empty; out-of-bounds
// placement faults. It also models the agent (position, vitals, inventory)
// and supports scripted faults so monitor and recovery logic is testable
// without a live world. The CLI uses it for dry runs.
//
// See also: `verify.rs` for the settle-then-query discipline, `manager.rs`
// which drives all actuation through this trait.

use crate::error::WorldFault;
use crate::types::{AgentVitals, BlockKind, BlockPos, Entity, ItemStack, Weather};
use std::collections::{BTreeMap, BTreeSet};

/// Narrow interface to the voxel world and the agent embodied in it.
pub trait WorldPort {
    /// The block occupying a cell, or `None` for an empty cell.
    fn block_at(&self, pos: BlockPos) -> Result<Option<BlockKind>, WorldFault>;

    /// Place a block of `kind` against the face of `reference` given by
    /// `face` (a unit axis vector). The block materializes at
    /// `reference + face`.
    fn place(&mut self, kind: BlockKind, reference: BlockPos, face: BlockPos)
    -> Result<(), WorldFault>;

    /// Remove the block at `pos`.
    fn dig(&mut self, pos: BlockPos) -> Result<(), WorldFault>;

    /// Walk the agent to `pos`.
    fn move_to(&mut self, pos: BlockPos) -> Result<(), WorldFault>;

    /// Current inventory contents.
    fn inventory(&self) -> Result<Vec<ItemStack>, WorldFault>;

    /// Entities within `radius` of the agent.
    fn nearby_entities(&self, radius: f64) -> Result<Vec<Entity>, WorldFault>;

    fn agent_position(&self) -> Result<BlockPos, WorldFault>;

    fn agent_vitals(&self) -> Result<AgentVitals, WorldFault>;

    fn weather(&self) -> Result<Weather, WorldFault>;
}

/// Dense in-memory world with an embodied agent.
#[derive(Clone, Debug)]
pub struct GridWorld {
    /// Flat storage: index = x + z * size_x + y * size_x * size_z,
    /// relative to `origin`.
    cells: Vec<Option<BlockKind>>,
    origin: BlockPos,
    size_x: u32,
    size_y: u32,
    size_z: u32,

    /// Inventory by item name, deterministic iteration for reports.
    inventory: BTreeMap<String, u32>,
    /// When true, placement consumes one item of the block's kind and
    /// faults when stock is exhausted.
    pub require_materials: bool,

    agent_position: BlockPos,
    pub vitals: AgentVitals,
    pub weather: Weather,
    pub entities: Vec<Entity>,

    /// Cells where placement always faults (scripted failure injection).
    fault_cells: BTreeSet<BlockPos>,
    /// When true, `move_to` faults without moving (scripted stuck agent).
    pub block_moves: bool,
}

impl GridWorld {
    /// Create a world of the given size with its minimum corner at `origin`,
    /// all cells empty, and the agent standing at `origin`.
    pub fn new(origin: BlockPos, size_x: u32, size_y: u32, size_z: u32) -> Self {
        let total = (size_x as usize) * (size_y as usize) * (size_z as usize);
        Self {
            cells: vec![None; total],
            origin,
            size_x,
            size_y,
            size_z,
            inventory: BTreeMap::new(),
            require_materials: false,
            agent_position: origin,
            vitals: AgentVitals {
                health: 20.0,
                food: 20.0,
            },
            weather: Weather {
                raining: false,
                time_of_day: 6000,
            },
            entities: Vec::new(),
            fault_cells: BTreeSet::new(),
            block_moves: false,
        }
    }

    /// A world comfortably containing the given box, with a margin on every
    /// side. Convenience for tests and dry runs.
    pub fn around(min: BlockPos, max: BlockPos, margin: i32) -> Self {
        let origin = BlockPos::new(min.x - margin, (min.y - margin).max(0), min.z - margin);
        let size = |lo: i32, hi: i32| (hi - lo + 1 + 2 * margin) as u32;
        Self::new(origin, size(min.x, max.x), size(min.y, max.y), size(min.z, max.z))
    }

    fn index(&self, pos: BlockPos) -> Option<usize> {
        let x = pos.x - self.origin.x;
        let y = pos.y - self.origin.y;
        let z = pos.z - self.origin.z;
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as u32, y as u32, z as u32);
        if x >= self.size_x || y >= self.size_y || z >= self.size_z {
            return None;
        }
        let sx = self.size_x as usize;
        let sz = self.size_z as usize;
        Some(x as usize + z as usize * sx + y as usize * sx * sz)
    }

    /// Direct cell write, bypassing placement rules. For seeding terrain
    /// and test fixtures; out-of-bounds writes are no-ops.
    pub fn set_cell(&mut self, pos: BlockPos, kind: Option<BlockKind>) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = kind;
        }
    }

    /// Direct cell read; out-of-bounds reads are empty.
    pub fn cell(&self, pos: BlockPos) -> Option<BlockKind> {
        self.index(pos).and_then(|i| self.cells[i])
    }

    /// Add `count` items of `kind` to the inventory.
    pub fn stock(&mut self, kind: BlockKind, count: u32) {
        self.stock_item(kind.item_name(), count);
    }

    /// Add `count` items by raw name (tools and other non-block items).
    pub fn stock_item(&mut self, name: &str, count: u32) {
        *self.inventory.entry(name.to_string()).or_insert(0) += count;
    }

    /// Script placement faults at the given cells.
    pub fn fail_placements_at(&mut self, cells: impl IntoIterator<Item = BlockPos>) {
        self.fault_cells.extend(cells);
    }

    /// Teleport the agent (test fixture; `move_to` is the in-world walk).
    pub fn set_agent_position(&mut self, pos: BlockPos) {
        self.agent_position = pos;
    }

    /// Lay a flat layer of `kind` across the whole grid at world height `y`.
    pub fn fill_layer(&mut self, y: i32, kind: BlockKind) {
        for x in 0..self.size_x as i32 {
            for z in 0..self.size_z as i32 {
                self.set_cell(
                    BlockPos::new(self.origin.x + x, y, self.origin.z + z),
                    Some(kind),
                );
            }
        }
    }
}

impl WorldPort for GridWorld {
    fn block_at(&self, pos: BlockPos) -> Result<Option<BlockKind>, WorldFault> {
        Ok(self.cell(pos))
    }

    fn place(
        &mut self,
        kind: BlockKind,
        reference: BlockPos,
        face: BlockPos,
    ) -> Result<(), WorldFault> {
        let target = reference.offset(face.x, face.y, face.z);
        if self.fault_cells.contains(&target) {
            return Err(WorldFault::PlacementRejected(target));
        }
        let Some(i) = self.index(target) else {
            return Err(WorldFault::PlacementRejected(target));
        };
        if self.cells[i].is_some() {
            return Err(WorldFault::PlacementRejected(target));
        }
        if self.require_materials {
            let name = kind.item_name();
            match self.inventory.get_mut(name) {
                Some(count) if *count > 0 => *count -= 1,
                _ => return Err(WorldFault::PlacementRejected(target)),
            }
        }
        self.cells[i] = Some(kind);
        Ok(())
    }

    fn dig(&mut self, pos: BlockPos) -> Result<(), WorldFault> {
        if let Some(i) = self.index(pos) {
            self.cells[i] = None;
        }
        Ok(())
    }

    fn move_to(&mut self, pos: BlockPos) -> Result<(), WorldFault> {
        if self.block_moves {
            return Err(WorldFault::MoveRejected(pos));
        }
        self.agent_position = pos;
        Ok(())
    }

    fn inventory(&self) -> Result<Vec<ItemStack>, WorldFault> {
        Ok(self
            .inventory
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(name, &count)| ItemStack::new(name.clone(), count))
            .collect())
    }

    fn nearby_entities(&self, radius: f64) -> Result<Vec<Entity>, WorldFault> {
        Ok(self
            .entities
            .iter()
            .filter(|e| e.position.distance(self.agent_position) <= radius)
            .cloned()
            .collect())
    }

    fn agent_position(&self) -> Result<BlockPos, WorldFault> {
        Ok(self.agent_position)
    }

    fn agent_vitals(&self) -> Result<AgentVitals, WorldFault> {
        Ok(self.vitals)
    }

    fn weather(&self) -> Result<Weather, WorldFault> {
        Ok(self.weather)
    }
}
