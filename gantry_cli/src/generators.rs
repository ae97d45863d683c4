// Parametric blueprint generators.
//
// Builds the block lists for the stock structure shapes the CLI can drive:
// a single-room house (stone-brick floor, plank walls with a door and
// windows, flat plank roof), a free-standing wall, and a flat platform.
//
// Layout rules for the house:
// - Floor: the full footprint at the anchor level.
// - Walls: the footprint perimeter, anchor+1 up to anchor+height.
// - Roof: the full footprint one above the top wall layer.
// - One ground-level door, centered on the +Z edge.
// - One window pane per remaining side, centered, at anchor+2.
//
// The anchor is the minimum corner of the footprint at foundation level;
// callers pick it so the foundation rests on existing ground.

use gantry_core::blueprint::{BlockSpec, Blueprint};
use gantry_core::types::{BlockKind, BlockPos};

/// Minimum sensible footprint for a house: walls plus one interior cell.
pub const MIN_HOUSE_SIDE: i32 = 3;

/// A single-room house. `width`/`depth` are clamped to `MIN_HOUSE_SIDE`;
/// `height` is the number of wall layers between floor and roof.
pub fn house(anchor: BlockPos, width: i32, depth: i32, height: i32) -> Blueprint {
    let width = width.max(MIN_HOUSE_SIDE);
    let depth = depth.max(MIN_HOUSE_SIDE);
    let height = height.max(2);
    let mut blocks = Vec::new();

    let x_max = anchor.x + width - 1;
    let z_max = anchor.z + depth - 1;
    let roof_y = anchor.y + height + 1;

    for x in anchor.x..=x_max {
        for z in anchor.z..=z_max {
            blocks.push(BlockSpec::new(BlockKind::StoneBricks, BlockPos::new(x, anchor.y, z)));
            blocks.push(BlockSpec::new(BlockKind::OakPlanks, BlockPos::new(x, roof_y, z)));
        }
    }
    for y in (anchor.y + 1)..roof_y {
        for x in anchor.x..=x_max {
            for z in anchor.z..=z_max {
                if x == anchor.x || x == x_max || z == anchor.z || z == z_max {
                    blocks.push(BlockSpec::new(BlockKind::OakPlanks, BlockPos::new(x, y, z)));
                }
            }
        }
    }

    // Door at ground level, center of the +Z edge.
    let door = BlockPos::new(anchor.x + width / 2, anchor.y + 1, z_max);
    swap_block(&mut blocks, door, BlockKind::OakDoor);

    // A window pane centered on each of the other three sides.
    let window_y = anchor.y + 2;
    if window_y < roof_y {
        for pos in [
            BlockPos::new(anchor.x + width / 2, window_y, anchor.z),
            BlockPos::new(anchor.x, window_y, anchor.z + depth / 2),
            BlockPos::new(x_max, window_y, anchor.z + depth / 2),
        ] {
            swap_block(&mut blocks, pos, BlockKind::GlassPane);
        }
    }

    let mut blueprint = Blueprint::new("house", blocks);
    blueprint.clear_area = true;
    blueprint.level_ground = true;
    blueprint
}

/// A straight cobblestone wall along +X, `height` blocks tall.
pub fn wall(anchor: BlockPos, length: i32, height: i32) -> Blueprint {
    let length = length.max(1);
    let height = height.max(1);
    let mut blocks = Vec::new();
    for x in anchor.x..(anchor.x + length) {
        for y in anchor.y..(anchor.y + height) {
            blocks.push(BlockSpec::new(
                BlockKind::Cobblestone,
                BlockPos::new(x, y, anchor.z),
            ));
        }
    }
    Blueprint::new("wall", blocks)
}

/// A flat plank platform.
pub fn platform(anchor: BlockPos, width: i32, depth: i32) -> Blueprint {
    let width = width.max(1);
    let depth = depth.max(1);
    let mut blocks = Vec::new();
    for x in anchor.x..(anchor.x + width) {
        for z in anchor.z..(anchor.z + depth) {
            blocks.push(BlockSpec::new(
                BlockKind::OakPlanks,
                BlockPos::new(x, anchor.y, z),
            ));
        }
    }
    Blueprint::new("platform", blocks)
}

/// Replace the block at `pos` with `kind`, keeping the list free of
/// duplicate positions.
fn swap_block(blocks: &mut Vec<BlockSpec>, pos: BlockPos, kind: BlockKind) {
    blocks.retain(|b| b.pos != pos);
    blocks.push(BlockSpec::new(kind, pos));
}
