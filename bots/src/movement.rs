//! Where a bot should walk next.

use crate::bot::Bot;
use crate::error::WorldError;
use crate::world::WorldView;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Vector3d, Vector3i};

pub trait MovementModel: Send {
    /// Picks the next walk target for `bot`, which joined at `spawn`.
    fn new_target_location(&mut self, bot: &Bot, spawn: Vector3d) -> Vector3i;
}

/// Uniform targets inside a square box around the bot or its spawn point.
#[derive(Debug, Clone)]
pub struct SimpleMovementModel {
    box_diameter: u32,
    spawn_anchor: bool,
    rng: StdRng,
}

impl SimpleMovementModel {
    /// How far above and below the origin to look for ground
    const HEIGHT_SEARCH: i32 = 8;

    pub fn new(box_diameter: u32, spawn_anchor: bool, seed: u64) -> Self {
        Self {
            box_diameter,
            spawn_anchor,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn box_diameter(&self) -> u32 {
        self.box_diameter
    }

    pub fn spawn_anchor(&self) -> bool {
        self.spawn_anchor
    }
}

impl MovementModel for SimpleMovementModel {
    fn new_target_location(&mut self, bot: &Bot, spawn: Vector3d) -> Vector3i {
        let origin = if self.spawn_anchor {
            spawn
        } else {
            bot.location()
        }
        .floor();

        let half = (self.box_diameter / 2) as i32;
        let x = origin.x + self.rng.gen_range(-half..=half);
        let z = origin.z + self.rng.gen_range(-half..=half);

        let y = standing_height(bot.world(), x, z, origin.y)
            .ok()
            .flatten()
            .unwrap_or(origin.y);
        Vector3i::new(x, y, z)
    }
}

/// Nearest height to `around` where a player fits on solid ground.
fn standing_height(
    world: &dyn WorldView,
    x: i32,
    z: i32,
    around: i32,
) -> Result<Option<i32>, WorldError> {
    for distance in 0..=SimpleMovementModel::HEIGHT_SEARCH {
        for y in [around + distance, around - distance] {
            let feet = Vector3i::new(x, y, z);
            let below = world.block_at(feet.offset(0, -1, 0))?.material;
            let body = world.block_at(feet)?.material;
            let head = world.block_at(feet.offset(0, 1, 0))?.material;
            if below.is_solid() && !body.is_solid() && !head.is_solid() {
                return Ok(Some(y));
            }
        }
    }
    Ok(None)
}
