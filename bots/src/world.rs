//! Bot-side view of the game world.
//!
//! Chunks arrive asynchronously from the server, so every lookup can fail with
//! [`WorldError::ChunkNotLoaded`]. Callers treat that as transient: probe again
//! on a later tick or fail the current task.

use crate::error::WorldError;
use shared::{Material, Vector3i};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub location: Vector3i,
    pub material: Material,
}

pub trait WorldView: Send + Sync {
    fn block_at(&self, location: Vector3i) -> Result<Block, WorldError>;
}

/// Whether the block at `location` can be climbed instead of jumped.
pub fn can_climb(world: &dyn WorldView, location: Vector3i) -> Result<bool, WorldError> {
    Ok(world.block_at(location)?.material.is_climbable())
}

#[derive(Debug, Default)]
struct Chunk {
    blocks: HashMap<Vector3i, Material>,
}

/// Chunk map filled in by the network receiver.
///
/// Blocks absent from a loaded chunk are air.
#[derive(Debug, Default)]
pub struct ChunkWorld {
    chunks: RwLock<HashMap<(i32, i32), Chunk>>,
}

impl ChunkWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a chunk, replacing any previous copy.
    ///
    /// Blocks outside the chunk's column are ignored.
    pub fn load_chunk(&self, chunk_x: i32, chunk_z: i32, blocks: Vec<(Vector3i, Material)>) {
        let blocks = blocks
            .into_iter()
            .filter(|(location, _)| location.chunk() == (chunk_x, chunk_z))
            .collect();

        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        chunks.insert((chunk_x, chunk_z), Chunk { blocks });
    }

    pub fn unload_chunk(&self, chunk_x: i32, chunk_z: i32) -> bool {
        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        chunks.remove(&(chunk_x, chunk_z)).is_some()
    }

    pub fn is_loaded(&self, chunk_x: i32, chunk_z: i32) -> bool {
        let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        chunks.contains_key(&(chunk_x, chunk_z))
    }

    pub fn loaded_chunks(&self) -> usize {
        self.chunks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl WorldView for ChunkWorld {
    fn block_at(&self, location: Vector3i) -> Result<Block, WorldError> {
        let (chunk_x, chunk_z) = location.chunk();
        let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        let chunk = chunks
            .get(&(chunk_x, chunk_z))
            .ok_or(WorldError::ChunkNotLoaded { chunk_x, chunk_z })?;

        Ok(Block {
            location,
            material: chunk.blocks.get(&location).copied().unwrap_or_default(),
        })
    }
}

/// Blocks for a flat chunk: `surface` at `ground_y` on top of stone.
pub fn flat_chunk(
    chunk_x: i32,
    chunk_z: i32,
    ground_y: i32,
    surface: Material,
) -> Vec<(Vector3i, Material)> {
    let mut blocks = Vec::with_capacity((shared::CHUNK_SIZE * shared::CHUNK_SIZE * 2) as usize);
    for dx in 0..shared::CHUNK_SIZE {
        for dz in 0..shared::CHUNK_SIZE {
            let x = chunk_x * shared::CHUNK_SIZE + dx;
            let z = chunk_z * shared::CHUNK_SIZE + dz;
            blocks.push((Vector3i::new(x, ground_y, z), surface));
            blocks.push((Vector3i::new(x, ground_y - 1, z), Material::Stone));
        }
    }
    blocks
}
