use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

pub const CLIENT_VERSION: u32 = 1;
pub const CHUNK_SIZE: i32 = 16;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        username: String,
    },
    Move {
        x: f64,
        y: f64,
        z: f64,
    },
    Chat {
        message: String,
    },
    Disconnect {
        reason: String,
    },

    Connected {
        client_id: u32,
        spawn: Vector3d,
    },
    ChunkData {
        chunk_x: i32,
        chunk_z: i32,
        blocks: Vec<(Vector3i, Material)>,
    },
    Teleport {
        location: Vector3d,
    },
    Disconnected {
        reason: String,
    },
}

/// Block-grid coordinate.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vector3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vector3i {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn as_f64(&self) -> Vector3d {
        Vector3d::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Chunk column containing this block.
    pub fn chunk(&self) -> (i32, i32) {
        (self.x.div_euclid(CHUNK_SIZE), self.z.div_euclid(CHUNK_SIZE))
    }
}

impl Add for Vector3i {
    type Output = Vector3i;

    fn add(self, other: Vector3i) -> Vector3i {
        Vector3i::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl fmt::Display for Vector3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Continuous position in block units.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vector3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3d {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn distance_squared(&self, other: Vector3d) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Block containing this position.
    pub fn floor(&self) -> Vector3i {
        Vector3i::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl Add for Vector3d {
    type Output = Vector3d;

    fn add(self, other: Vector3d) -> Vector3d {
        Vector3d::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector3d {
    type Output = Vector3d;

    fn sub(self, other: Vector3d) -> Vector3d {
        Vector3d::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl fmt::Display for Vector3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Material {
    #[default]
    Air,
    Stone,
    Grass,
    Dirt,
    SoulSand,
    Water,
    Ladder,
    Vine,
}

impl Material {
    pub fn is_solid(&self) -> bool {
        matches!(
            self,
            Material::Stone | Material::Grass | Material::Dirt | Material::SoulSand
        )
    }

    pub fn is_liquid(&self) -> bool {
        matches!(self, Material::Water)
    }

    pub fn is_climbable(&self) -> bool {
        matches!(self, Material::Ladder | Material::Vine)
    }

    /// Surfaces that sink the walker slightly and halve its speed.
    pub fn slows_movement(&self) -> bool {
        matches!(self, Material::SoulSand)
    }
}
