//! Navigation task: search a path in the background, then follow it tick by tick.
//!
//! ## Lifecycle
//!
//! Construction starts the search on its own worker. While the search is out,
//! each tick only checks the timeout. Once a path arrives the task integrates
//! the bot's position toward the next waypoint, one clamped step per axis per
//! tick, and sends the new position to the server every tick.
//!
//! ## Failure modes
//!
//! Timeouts, search errors, straying from the route, exceeding the per-waypoint
//! tick budget and missing world data under the bot all end the task with
//! `TaskStatus::Failure`. Nothing is retried here; the orchestrator hands out a
//! new task on a later tick.

use crate::bot::Bot;
use crate::error::PathError;
use crate::pathfinding::PathNode;
use crate::task::TaskStatus;
use crate::world;
use log::{debug, info, warn};
use shared::{Vector3d, Vector3i};
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Tuning for one walk task. Cloned into every task at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkSettings {
    /// Blocks per tick
    pub speed: f64,
    pub jump_factor: f64,
    pub fall_factor: f64,
    pub liquid_factor: f64,
    /// `None` waits for the search forever
    pub timeout: Option<Duration>,
    pub skip_distance_squared: f64,
    pub stray_distance_squared: f64,
    pub max_ticks_per_step: u32,
    pub slow_surface_sink: f64,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            speed: 0.15,
            jump_factor: 3.0,
            fall_factor: 4.0,
            liquid_factor: 0.5,
            timeout: Some(Duration::from_millis(6000)),
            skip_distance_squared: 0.05,
            stray_distance_squared: 5.0,
            max_ticks_per_step: 80,
            slow_surface_sink: 0.12,
        }
    }
}

impl WalkSettings {
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// A zero duration disables the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_factors(mut self, jump: f64, fall: f64, liquid: f64) -> Self {
        self.jump_factor = jump;
        self.fall_factor = fall;
        self.liquid_factor = liquid;
        self
    }
}

/// Bounds how many path searches run at once across all bots.
#[derive(Debug, Clone)]
pub struct SearchLimiter {
    slots: Arc<Semaphore>,
}

impl SearchLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

type SearchResult = Result<Box<PathNode>, PathError>;

/// Handle to an in-flight search. Dropping it aborts the worker and frees its slot.
#[derive(Debug)]
struct PathSearch {
    worker: JoinHandle<()>,
    running_since: Option<Instant>,
    slot_granted: oneshot::Receiver<Instant>,
    result: oneshot::Receiver<SearchResult>,
}

impl PathSearch {
    fn spawn(bot: &Bot, target: Vector3i, limiter: &SearchLimiter) -> Self {
        let (tx, result) = oneshot::channel();
        let (granted, slot_granted) = oneshot::channel();
        let finder = Arc::clone(bot.path_finder());
        let start = bot.location().floor();
        let slots = Arc::clone(&limiter.slots);

        let ready = Arc::clone(&slots).try_acquire_owned().ok();
        let running_since = ready.as_ref().map(|_| Instant::now());

        let worker = tokio::spawn(async move {
            let permit = match ready {
                Some(permit) => permit,
                None => {
                    let Ok(permit) = slots.acquire_owned().await else {
                        return;
                    };
                    let _ = granted.send(Instant::now());
                    permit
                }
            };
            // The permit stays with this task so aborting it releases the slot
            let outcome = tokio::task::spawn_blocking(move || finder.search(start, target))
                .await
                .unwrap_or_else(|e| Err(PathError::Interrupted(e.to_string())));
            drop(permit);
            let _ = tx.send(outcome);
        });

        Self {
            worker,
            running_since,
            slot_granted,
            result,
        }
    }

    /// When the search got a slot, if it has one yet.
    fn running_since(&mut self) -> Option<Instant> {
        if self.running_since.is_none() {
            self.running_since = self.slot_granted.try_recv().ok();
        }
        self.running_since
    }
}

impl Drop for PathSearch {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[derive(Debug)]
pub struct WalkTask {
    short_name: String,
    target: Vector3i,
    settings: WalkSettings,
    started: Instant,
    search: Option<PathSearch>,
    next_step: Option<Box<PathNode>>,
    ticks_since_step_change: u32,
    status: TaskStatus,
}

impl WalkTask {
    pub fn new(bot: &Bot, target: Vector3i, settings: WalkSettings, limiter: &SearchLimiter) -> Self {
        let search = PathSearch::spawn(bot, target, limiter);
        Self {
            short_name: format!("WalkTask[{}]", target),
            target,
            settings,
            started: Instant::now(),
            search: Some(search),
            next_step: None,
            ticks_since_step_change: 0,
            status: TaskStatus::InProgress,
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn target(&self) -> Vector3i {
        self.target
    }

    pub fn settings(&self) -> &WalkSettings {
        &self.settings
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn is_moving(&self) -> bool {
        self.next_step.is_some()
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    pub fn tick(&mut self, bot: &Bot) -> TaskStatus {
        if self.status.is_terminal() {
            return self.status.clone();
        }
        self.status = self.advance(bot);
        self.status.clone()
    }

    /// Cancels any outstanding search and drops the remaining route.
    pub fn stop(&mut self) {
        self.search = None;
        self.next_step = None;
    }

    fn advance(&mut self, bot: &Bot) -> TaskStatus {
        if let Some(status) = self.poll_search() {
            return status;
        }

        let location = bot.location();

        if self.next_next_location().is_some_and(|next| {
            location.distance_squared(next.as_f64()) < self.settings.skip_distance_squared
        }) {
            self.next_waypoint();
        }

        let Some(waypoint) = self.next_step.as_ref().map(|step| step.location) else {
            return TaskStatus::Success;
        };

        if location.distance_squared(waypoint.as_f64()) > self.settings.stray_distance_squared {
            info!(
                "{}: strayed from path. {} -> {}",
                self.short_name, location, waypoint
            );
            self.next_step = None;
            return TaskStatus::failure(format!("Strayed from path. {} -> {}", location, waypoint));
        }

        self.ticks_since_step_change += 1;
        if self.ticks_since_step_change > self.settings.max_ticks_per_step {
            self.next_step = None;
            return TaskStatus::failure("Too many ticks since step change");
        }

        let below = location.floor().offset(0, -1, 0);
        let ground = match bot.world().block_at(below) {
            Ok(block) => block.material,
            Err(e) => {
                warn!("{}: block under player: {}", self.short_name, below);
                warn!("{}: player at {}", self.short_name, location);
                return TaskStatus::failure_with_cause(e.to_string(), e);
            }
        };
        // Sunk into a slowing block, it is the feet block that carries the bot
        let feet = bot
            .world()
            .block_at(location.floor())
            .map(|block| block.material)
            .unwrap_or_default();
        let in_liquid = feet.is_liquid();

        // Stand on the centre of the block
        let mut step_target = waypoint.as_f64().offset(0.5, 0.0, 0.5);
        let mut speed = self.settings.speed;
        if ground.slows_movement() || feet.slows_movement() {
            step_target = step_target.offset(0.0, -self.settings.slow_surface_sink, 0.0);
            speed *= self.settings.liquid_factor;
        } else if in_liquid {
            speed *= self.settings.liquid_factor;
        }

        let mut moved = location;
        if moved.y != step_target.y {
            let can_climb = match world::can_climb(bot.world(), location.floor()) {
                Ok(can_climb) => can_climb,
                Err(_) => return TaskStatus::InProgress,
            };
            let mut vertical = speed;
            if !in_liquid && !can_climb {
                vertical *= if moved.y < step_target.y {
                    self.settings.jump_factor
                } else {
                    self.settings.fall_factor
                };
            }
            moved.y = approach(moved.y, step_target.y, vertical);
        }
        moved.x = approach(moved.x, step_target.x, speed);
        moved.z = approach(moved.z, step_target.z, speed);

        bot.update_location(moved);

        if moved == step_target {
            self.next_waypoint();
        }

        TaskStatus::InProgress
    }

    /// Returns a status when the tick should end while waiting on the search.
    fn poll_search(&mut self) -> Option<TaskStatus> {
        let search = self.search.as_mut()?;
        let running_since = search.running_since();

        match search.result.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => {
                // Time spent queued for a search slot does not count
                if let (Some(timeout), Some(since)) = (self.settings.timeout, running_since) {
                    if since.elapsed() > timeout {
                        self.stop();
                        return Some(TaskStatus::failure(format!(
                            "Path search timed out ({} ms)",
                            timeout.as_millis()
                        )));
                    }
                }
                Some(TaskStatus::InProgress)
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                self.search = None;
                let cause = PathError::Interrupted("search worker stopped".to_string());
                Some(TaskStatus::failure_with_cause(cause.to_string(), cause))
            }
            Ok(Ok(path)) => {
                self.search = None;
                debug!(
                    "{}: path of {} nodes after {:?}",
                    self.short_name,
                    path.len(),
                    self.started.elapsed()
                );
                self.next_step = Some(path);
                self.ticks_since_step_change = 0;
                None
            }
            Ok(Err(e)) => {
                self.search = None;
                Some(TaskStatus::failure_with_cause(e.to_string(), e))
            }
        }
    }

    fn next_next_location(&self) -> Option<Vector3i> {
        self.next_step.as_ref()?.next.as_ref().map(|node| node.location)
    }

    fn next_waypoint(&mut self) {
        self.next_step = self.next_step.take().and_then(|step| step.next);
        self.ticks_since_step_change = 0;
    }
}

/// Moves `current` toward `target` by at most `speed`, landing exactly on it.
fn approach(current: f64, target: f64, speed: f64) -> f64 {
    let remaining = target - current;
    if remaining.abs() <= speed {
        target
    } else {
        current + speed.copysign(remaining)
    }
}
