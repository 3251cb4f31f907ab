//! Path search contract and a simple default search.

use crate::error::{PathError, WorldError};
use crate::world::WorldView;
use shared::Vector3i;
use std::sync::Arc;

/// One waypoint of a computed route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    pub location: Vector3i,
    pub next: Option<Box<PathNode>>,
}

impl PathNode {
    pub fn new(location: Vector3i) -> Self {
        Self {
            location,
            next: None,
        }
    }

    /// Links `locations` front to back. Returns `None` for an empty input.
    pub fn from_locations<I>(locations: I) -> Option<Box<PathNode>>
    where
        I: IntoIterator<Item = Vector3i>,
        I::IntoIter: DoubleEndedIterator,
    {
        locations.into_iter().rev().fold(None, |next, location| {
            Some(Box::new(PathNode { location, next }))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathNode> {
        std::iter::successors(Some(self), |node| node.next.as_deref())
    }

    /// A chain always holds at least one node.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn last(&self) -> Vector3i {
        self.iter().last().map_or(self.location, |node| node.location)
    }
}

/// Computes a route between two blocks. Runs off the tick thread.
pub trait PathFinder: Send + Sync {
    fn search(&self, start: Vector3i, target: Vector3i) -> Result<Box<PathNode>, PathError>;
}

impl<F> PathFinder for F
where
    F: Fn(Vector3i, Vector3i) -> Result<Box<PathNode>, PathError> + Send + Sync,
{
    fn search(&self, start: Vector3i, target: Vector3i) -> Result<Box<PathNode>, PathError> {
        self(start, target)
    }
}

/// Walks toward the target column one block at a time, x axis first.
///
/// Steps up at most one block and drops at most three. There is no
/// backtracking: the first column without a standable block ends the search.
pub struct GreedyPathFinder {
    world: Arc<dyn WorldView>,
    max_nodes: usize,
}

impl GreedyPathFinder {
    const HEIGHT_PROBES: [i32; 5] = [0, 1, -1, -2, -3];

    pub fn new(world: Arc<dyn WorldView>) -> Self {
        Self {
            world,
            max_nodes: 256,
        }
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    fn is_standable(&self, location: Vector3i) -> Result<bool, WorldError> {
        let below = self.world.block_at(location.offset(0, -1, 0))?.material;
        let feet = self.world.block_at(location)?.material;
        let head = self.world.block_at(location.offset(0, 1, 0))?.material;
        Ok(below.is_solid() && !feet.is_solid() && !head.is_solid())
    }

    fn standing_height(&self, x: i32, z: i32, from_y: i32) -> Result<Option<i32>, WorldError> {
        for dy in Self::HEIGHT_PROBES {
            if self.is_standable(Vector3i::new(x, from_y + dy, z))? {
                return Ok(Some(from_y + dy));
            }
        }
        Ok(None)
    }
}

impl PathFinder for GreedyPathFinder {
    fn search(&self, start: Vector3i, target: Vector3i) -> Result<Box<PathNode>, PathError> {
        let mut locations = vec![start];
        let mut current = start;

        while (current.x, current.z) != (target.x, target.z) {
            if locations.len() >= self.max_nodes {
                return Err(PathError::TooLong {
                    limit: self.max_nodes,
                });
            }

            let (x, z) = if current.x != target.x {
                (current.x + (target.x - current.x).signum(), current.z)
            } else {
                (current.x, current.z + (target.z - current.z).signum())
            };

            let y = self
                .standing_height(x, z, current.y)?
                .ok_or(PathError::Unreachable {
                    location: Vector3i::new(x, current.y, z),
                })?;

            current = Vector3i::new(x, y, z);
            locations.push(current);
        }

        PathNode::from_locations(locations).ok_or(PathError::Unreachable { location: start })
    }
}
