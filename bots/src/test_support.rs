//! Doubles shared by the unit tests.

use crate::bot::{Bot, BotPlayer, Controller};
use crate::connector::BotConnector;
use crate::error::{ConnectError, PathError};
use crate::pathfinding::{GreedyPathFinder, PathFinder, PathNode};
use crate::world::{flat_chunk, ChunkWorld};
use async_trait::async_trait;
use shared::{Material, Vector3d, Vector3i};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct RecordingController {
    moves: Mutex<Vec<Vector3d>>,
    chats: Mutex<Vec<String>>,
    disconnects: Mutex<Vec<String>>,
}

impl RecordingController {
    pub fn moves(&self) -> Vec<Vector3d> {
        self.moves.lock().unwrap().clone()
    }

    pub fn chats(&self) -> Vec<String> {
        self.chats.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.disconnects.lock().unwrap().clone()
    }
}

impl Controller for RecordingController {
    fn update_location(&self, location: Vector3d) {
        self.moves.lock().unwrap().push(location);
    }

    fn send_chat(&self, message: &str) {
        self.chats.lock().unwrap().push(message.to_string());
    }

    fn disconnect(&self, reason: &str) {
        self.disconnects.lock().unwrap().push(reason.to_string());
    }
}

/// Grass at y = 63 over chunks -1..=1 on both axes.
pub fn flat_world() -> Arc<ChunkWorld> {
    let world = ChunkWorld::new();
    for chunk_x in -1..=1 {
        for chunk_z in -1..=1 {
            world.load_chunk(chunk_x, chunk_z, flat_chunk(chunk_x, chunk_z, 63, Material::Grass));
        }
    }
    Arc::new(world)
}

pub fn test_bot(
    location: Vector3d,
    world: Arc<ChunkWorld>,
    controller: Arc<RecordingController>,
) -> Bot {
    let finder = Arc::new(GreedyPathFinder::new(world.clone()));
    bot_with_finder(location, world, controller, finder)
}

pub fn bot_with_finder(
    location: Vector3d,
    world: Arc<ChunkWorld>,
    controller: Arc<RecordingController>,
    finder: Arc<dyn PathFinder>,
) -> Bot {
    Bot::new(
        "test-bot",
        Arc::new(BotPlayer::new(location)),
        world,
        controller,
        finder,
    )
}

/// Always answers with the same route.
pub fn chain_finder(route: Vec<Vector3i>) -> Arc<dyn PathFinder> {
    Arc::new(
        move |_start: Vector3i, target: Vector3i| -> Result<Box<PathNode>, PathError> {
            PathNode::from_locations(route.clone()).ok_or(PathError::Unreachable { location: target })
        },
    )
}

/// Answers only once the returned sender is dropped.
pub fn gated_finder(route: Vec<Vector3i>) -> (Arc<dyn PathFinder>, mpsc::Sender<()>) {
    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let finder = move |_start: Vector3i, target: Vector3i| -> Result<Box<PathNode>, PathError> {
        let _ = gate.lock().unwrap().recv();
        PathNode::from_locations(route.clone()).ok_or(PathError::Unreachable { location: target })
    };
    (Arc::new(finder), release)
}

/// Hands out bots sharing one world, each with its own recording controller.
///
/// Bot ids are read back from the `-<id>` suffix of the requested name.
pub struct FakeConnector {
    world: Arc<ChunkWorld>,
    spawns: HashMap<u32, Vector3d>,
    fail_first: usize,
    attempts: AtomicUsize,
    controllers: Mutex<HashMap<u32, Arc<RecordingController>>>,
}

impl FakeConnector {
    pub fn new(world: Arc<ChunkWorld>) -> Self {
        Self {
            world,
            spawns: HashMap::new(),
            fail_first: 0,
            attempts: AtomicUsize::new(0),
            controllers: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing_first(mut self, attempts: usize) -> Self {
        self.fail_first = attempts;
        self
    }

    pub fn spawn_at(mut self, id: u32, location: Vector3d) -> Self {
        self.spawns.insert(id, location);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn world(&self) -> Arc<ChunkWorld> {
        self.world.clone()
    }

    pub fn controller(&self, id: u32) -> Arc<RecordingController> {
        self.controllers.lock().unwrap()[&id].clone()
    }
}

#[async_trait]
impl BotConnector for FakeConnector {
    async fn connect(&self, name: String) -> Result<Bot, ConnectError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.fail_first {
            return Err(ConnectError::Timeout(Duration::from_secs(10)));
        }

        let id: u32 = name
            .rsplit('-')
            .next()
            .and_then(|id| id.parse().ok())
            .unwrap_or_default();
        let controller = Arc::new(RecordingController::default());
        self.controllers.lock().unwrap().insert(id, controller.clone());

        let spawn = self
            .spawns
            .get(&id)
            .copied()
            .unwrap_or(Vector3d::new(0.5, 64.0, 0.5));
        let finder = Arc::new(GreedyPathFinder::new(self.world.clone()));
        Ok(Bot::new(
            name,
            Arc::new(BotPlayer::new(spawn)),
            self.world.clone(),
            controller,
            finder,
        ))
    }
}

/// Every attempt is refused.
pub struct NoConnector;

#[async_trait]
impl BotConnector for NoConnector {
    async fn connect(&self, name: String) -> Result<Bot, ConnectError> {
        Err(ConnectError::Rejected(format!("{} is not welcome", name)))
    }
}

/// Attempts never finish.
pub struct HangingConnector;

#[async_trait]
impl BotConnector for HangingConnector {
    async fn connect(&self, _name: String) -> Result<Bot, ConnectError> {
        futures::future::pending().await
    }
}
