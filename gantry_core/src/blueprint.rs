// Blueprint data model for the construction driver.
//
// A blueprint is the immutable description of the target structure: the
// building type, the full block list in absolute world coordinates, and the
// site-preparation flags. Build order is never taken from block insertion
// order — it is derived here by geometric phase classification:
//
// - foundation: blocks on the lowest Y layer,
// - roof:       blocks on the highest Y layer,
// - detail:     blocks whose kind is in the palette's decorative table,
// - wall:       everything else, grouped by Y and built bottom-up.
//
// Classification is applied in that precedence order, which makes the
// partition disjoint and exhaustive: a single-layer blueprint is all
// foundation, and a decorative block on the top layer builds with the roof.
// Bottom-up wall ordering is load-bearing — building top-down would leave
// unsupported blocks.
//
// See also: `session.rs` for the phase handlers that consume these groups,
// `verify.rs` which diffs the blueprint against the live world,
// `config.rs` for the `MaterialPalette` capability tables.

use crate::config::MaterialPalette;
use crate::types::{BlockKind, BlockPos};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One block of the target structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub kind: BlockKind,
    pub pos: BlockPos,
}

impl BlockSpec {
    pub const fn new(kind: BlockKind, pos: BlockPos) -> Self {
        Self { kind, pos }
    }
}

/// The phase a block belongs to, derived from its geometry and kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseClass {
    Foundation,
    Wall,
    Roof,
    Detail,
}

/// Axis-aligned bounding box of a blueprint, inclusive on both corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

/// Immutable description of the target structure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blueprint {
    pub building_type: String,
    pub blocks: Vec<BlockSpec>,
    pub clear_area: bool,
    pub level_ground: bool,
}

impl Blueprint {
    pub fn new(building_type: impl Into<String>, blocks: Vec<BlockSpec>) -> Self {
        Self {
            building_type: building_type.into(),
            blocks,
            clear_area: false,
            level_ground: false,
        }
    }

    /// Lowest Y of any block. `None` for a degenerate empty blueprint.
    pub fn min_y(&self) -> Option<i32> {
        self.blocks.iter().map(|b| b.pos.y).min()
    }

    /// Highest Y of any block.
    pub fn max_y(&self) -> Option<i32> {
        self.blocks.iter().map(|b| b.pos.y).max()
    }

    /// Classify one block. See the module header for the precedence rules.
    pub fn classify(&self, spec: &BlockSpec, palette: &MaterialPalette) -> PhaseClass {
        let (min_y, max_y) = match (self.min_y(), self.max_y()) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return PhaseClass::Foundation, // unreachable for a non-empty blueprint
        };
        if spec.pos.y == min_y {
            PhaseClass::Foundation
        } else if spec.pos.y == max_y {
            PhaseClass::Roof
        } else if palette.is_detail(spec.kind) {
            PhaseClass::Detail
        } else {
            PhaseClass::Wall
        }
    }

    fn blocks_in_class(&self, class: PhaseClass, palette: &MaterialPalette) -> Vec<BlockSpec> {
        self.blocks
            .iter()
            .filter(|b| self.classify(b, palette) == class)
            .copied()
            .collect()
    }

    /// Blocks on the lowest Y layer.
    pub fn foundation_blocks(&self, palette: &MaterialPalette) -> Vec<BlockSpec> {
        self.blocks_in_class(PhaseClass::Foundation, palette)
    }

    /// Blocks on the highest Y layer (when distinct from the foundation).
    pub fn roof_blocks(&self, palette: &MaterialPalette) -> Vec<BlockSpec> {
        self.blocks_in_class(PhaseClass::Roof, palette)
    }

    /// Decorative blocks between foundation and roof.
    pub fn detail_blocks(&self, palette: &MaterialPalette) -> Vec<BlockSpec> {
        self.blocks_in_class(PhaseClass::Detail, palette)
    }

    /// Wall blocks grouped by Y layer, ascending. The ordering is
    /// load-bearing: lower layers support upper ones.
    pub fn wall_layers(&self, palette: &MaterialPalette) -> Vec<(i32, Vec<BlockSpec>)> {
        let mut layers: BTreeMap<i32, Vec<BlockSpec>> = BTreeMap::new();
        for spec in &self.blocks {
            if self.classify(spec, palette) == PhaseClass::Wall {
                layers.entry(spec.pos.y).or_default().push(*spec);
            }
        }
        layers.into_iter().collect()
    }

    /// Axis-aligned bounding box of all blocks.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.blocks.first()?;
        let mut min = first.pos;
        let mut max = first.pos;
        for spec in &self.blocks[1..] {
            min.x = min.x.min(spec.pos.x);
            min.y = min.y.min(spec.pos.y);
            min.z = min.z.min(spec.pos.z);
            max.x = max.x.max(spec.pos.x);
            max.y = max.y.max(spec.pos.y);
            max.z = max.z.max(spec.pos.z);
        }
        Some(BoundingBox { min, max })
    }

    /// Arithmetic-mean center of the block list, in fractional coordinates.
    /// The guardian measures agent distance from the site against this.
    pub fn centroid(&self) -> Option<(f64, f64, f64)> {
        if self.blocks.is_empty() {
            return None;
        }
        let n = self.blocks.len() as f64;
        let (mut sx, mut sy, mut sz) = (0.0, 0.0, 0.0);
        for spec in &self.blocks {
            sx += f64::from(spec.pos.x);
            sy += f64::from(spec.pos.y);
            sz += f64::from(spec.pos.z);
        }
        Some((sx / n, sy / n, sz / n))
    }

    /// Required material counts per kind, in deterministic kind order.
    pub fn material_bill(&self) -> BTreeMap<BlockKind, u32> {
        let mut bill = BTreeMap::new();
        for spec in &self.blocks {
            *bill.entry(spec.kind).or_insert(0) += 1;
        }
        bill
    }

    /// Distinct (x, z) columns containing blueprint blocks, in order.
    /// The wall functionality battery walks these as "the wall's path".
    pub fn footprint_columns(&self) -> Vec<(i32, i32)> {
        let mut columns: Vec<(i32, i32)> = self.blocks.iter().map(|b| (b.pos.x, b.pos.z)).collect();
        columns.sort_unstable();
        columns.dedup();
        columns
    }
}
