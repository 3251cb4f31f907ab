//! A single simulated client and the capabilities it carries around.

use crate::pathfinding::PathFinder;
use crate::task::{TaskExecutor, TaskStatus};
use crate::world::WorldView;
use shared::Vector3d;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Movement command sink. Fire-and-forget: nothing here waits for the server.
pub trait Controller: Send + Sync {
    fn update_location(&self, location: Vector3d);
    fn send_chat(&self, message: &str);
    fn disconnect(&self, reason: &str);
}

/// Player state shared between the tick thread and the network receiver.
#[derive(Debug)]
pub struct BotPlayer {
    location: Mutex<Vector3d>,
    joined: AtomicBool,
}

impl BotPlayer {
    pub fn new(location: Vector3d) -> Self {
        Self {
            location: Mutex::new(location),
            joined: AtomicBool::new(true),
        }
    }

    pub fn location(&self) -> Vector3d {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_location(&self, location: Vector3d) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = location;
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::Acquire)
    }

    pub fn set_joined(&self, joined: bool) {
        self.joined.store(joined, Ordering::Release);
    }
}

pub struct Bot {
    name: String,
    player: Arc<BotPlayer>,
    world: Arc<dyn WorldView>,
    controller: Arc<dyn Controller>,
    path_finder: Arc<dyn PathFinder>,
    task_executor: Option<TaskExecutor>,
    receiver: Option<JoinHandle<()>>,
}

impl Bot {
    pub fn new(
        name: impl Into<String>,
        player: Arc<BotPlayer>,
        world: Arc<dyn WorldView>,
        controller: Arc<dyn Controller>,
        path_finder: Arc<dyn PathFinder>,
    ) -> Self {
        Self {
            name: name.into(),
            player,
            world,
            controller,
            path_finder,
            task_executor: None,
            receiver: None,
        }
    }

    /// Ties the lifetime of a network receiver task to this bot.
    pub fn attach_receiver(&mut self, receiver: JoinHandle<()>) {
        if let Some(previous) = self.receiver.replace(receiver) {
            previous.abort();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn player(&self) -> &Arc<BotPlayer> {
        &self.player
    }

    pub fn location(&self) -> Vector3d {
        self.player.location()
    }

    pub fn is_joined(&self) -> bool {
        self.player.is_joined()
    }

    pub fn world(&self) -> &dyn WorldView {
        self.world.as_ref()
    }

    pub fn controller(&self) -> &Arc<dyn Controller> {
        &self.controller
    }

    pub fn path_finder(&self) -> &Arc<dyn PathFinder> {
        &self.path_finder
    }

    /// Moves the player locally and tells the server.
    pub fn update_location(&self, location: Vector3d) {
        self.player.set_location(location);
        self.controller.update_location(location);
    }

    pub fn task_executor(&self) -> Option<&TaskExecutor> {
        self.task_executor.as_ref()
    }

    pub fn task_status(&self) -> Option<TaskStatus> {
        self.task_executor.as_ref().map(|executor| executor.status().clone())
    }

    /// Installs a new executor. An executor that is still running is stopped first.
    pub fn set_task_executor(&mut self, executor: TaskExecutor) {
        self.clear_task();
        self.task_executor = Some(executor);
    }

    pub fn clear_task(&mut self) {
        if let Some(mut previous) = self.task_executor.take() {
            if previous.status().is_in_progress() {
                previous.stop();
            }
        }
    }

    /// Advances the current task by one tick.
    pub fn tick_task(&mut self) -> Option<TaskStatus> {
        let mut executor = self.task_executor.take()?;
        let status = executor.tick(self);
        self.task_executor = Some(executor);
        Some(status)
    }

    pub fn disconnect(&mut self, reason: &str) {
        self.clear_task();
        self.controller.disconnect(reason);
        self.player.set_joined(false);
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}

impl Drop for Bot {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.name)
            .field("location", &self.location())
            .field("joined", &self.is_joined())
            .field("task", &self.task_executor.as_ref().map(TaskExecutor::short_name))
            .finish()
    }
}
