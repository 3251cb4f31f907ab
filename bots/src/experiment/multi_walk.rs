use super::{Experiment, ExperimentContext};
use crate::bot::Bot;
use crate::config::ExperimentParams;
use crate::connector::BotConnector;
use crate::error::{ConfigError, ConnectError, ExperimentError};
use crate::heartbeat::Heartbeat;
use crate::movement::{MovementModel, SimpleMovementModel};
use crate::task::TaskExecutor;
use crate::walk::{SearchLimiter, WalkSettings};
use futures::FutureExt;
use log::{debug, info, warn};
use shared::Vector3d;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

const SUMMARY_EVERY_TICKS: u64 = 100;

/// Parameters of a multi-walk run, read once from the experiment parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiWalkConfig {
    pub bots_total: u32,
    pub duration: Duration,
    pub join_interval: Duration,
    pub bots_per_join: u32,
    pub seed: u64,
    pub single_stand_still: bool,
    pub send_pings: bool,
    pub ping_interval: Duration,
    pub box_diameter: u32,
    pub spawn_anchor: bool,
}

impl Default for MultiWalkConfig {
    fn default() -> Self {
        Self {
            bots_total: 0,
            duration: Duration::from_secs(600),
            join_interval: Duration::from_secs(1),
            bots_per_join: 1,
            seed: 42,
            single_stand_still: false,
            send_pings: true,
            ping_interval: Duration::from_secs(1),
            box_diameter: 32,
            spawn_anchor: false,
        }
    }
}

impl MultiWalkConfig {
    pub fn from_params(params: &ExperimentParams) -> Result<Self, ConfigError> {
        let ping_interval = params.count_or("pingInterval", 1)?;
        if ping_interval == 0 {
            return Err(ConfigError::invalid("pingInterval", "0", "a positive integer"));
        }

        Ok(Self {
            bots_total: params.count("bots")?,
            duration: Duration::from_secs(params.count_or("duration", 600)?.into()),
            join_interval: Duration::from_secs(params.count_or("joininterval", 1)?.into()),
            bots_per_join: params.count_or("numbotsperjoin", 1)?,
            seed: params.int_or("seed", 42)? as u64,
            single_stand_still: params.bool_or("singleStandStill", false)?,
            send_pings: params.bool_or("sendPings", true)?,
            ping_interval: Duration::from_secs(ping_interval.into()),
            box_diameter: params.count_or("boxDiameter", 32)?,
            spawn_anchor: params.bool_or("spawnAnchor", false)?,
        })
    }
}

/// A connected bot and the bookkeeping kept for it.
struct TrackedBot {
    id: u32,
    spawn: Vector3d,
    loaded_in: bool,
    stand_still: bool,
    bot: Bot,
}

struct ConnectOutcome {
    result: Result<Bot, ConnectError>,
    elapsed: Duration,
}

/// A connection attempt launched on an earlier tick.
struct PendingBot {
    id: u32,
    stand_still: bool,
    handle: JoinHandle<ConnectOutcome>,
}

/// Bots join in batches and wander around according to a movement model.
///
/// All state lives on the tick thread. Connection attempts run as spawned
/// tasks and hand back a finished [`Bot`]; ids, spawn points and readiness
/// flags are only ever touched here.
pub struct MultiWalkAround {
    params: ExperimentParams,
    connector: Arc<dyn BotConnector>,
    walk_settings: WalkSettings,
    limiter: SearchLimiter,
    config: MultiWalkConfig,
    movement: Option<Box<dyn MovementModel>>,

    started: Option<Instant>,
    last_join: Option<Instant>,
    next_id: u32,
    stand_still_launched: bool,
    bots: Vec<TrackedBot>,
    pending: Vec<PendingBot>,
    heartbeat: Option<Heartbeat>,
    ticks: u64,
}

impl MultiWalkAround {
    pub const ID: u32 = 4;

    pub fn new(params: ExperimentParams, context: ExperimentContext) -> Self {
        Self {
            params,
            connector: context.connector,
            walk_settings: context.walk_settings,
            limiter: context.limiter,
            config: MultiWalkConfig::default(),
            movement: None,
            started: None,
            last_join: None,
            next_id: 0,
            stand_still_launched: false,
            bots: Vec::new(),
            pending: Vec::new(),
            heartbeat: None,
            ticks: 0,
        }
    }

    /// Replaces the movement model that `before` would build from the parameters.
    pub fn with_movement_model(mut self, movement: Box<dyn MovementModel>) -> Self {
        self.movement = Some(movement);
        self
    }

    pub fn config(&self) -> &MultiWalkConfig {
        &self.config
    }

    pub fn bots_total(&self) -> u32 {
        self.config.bots_total
    }

    pub fn join_interval(&self) -> Duration {
        self.config.join_interval
    }

    pub fn bots_per_join(&self) -> u32 {
        self.config.bots_per_join
    }

    /// Live bots plus connection attempts still in flight.
    pub fn population(&self) -> usize {
        self.bots.len() + self.pending.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn bots(&self) -> impl Iterator<Item = (u32, &Bot)> {
        self.bots.iter().map(|tracked| (tracked.id, &tracked.bot))
    }

    pub fn bot(&self, id: u32) -> Option<&Bot> {
        self.bots
            .iter()
            .find(|tracked| tracked.id == id)
            .map(|tracked| &tracked.bot)
    }

    pub fn is_loaded_in(&self, id: u32) -> Option<bool> {
        self.bots
            .iter()
            .find(|tracked| tracked.id == id)
            .map(|tracked| tracked.loaded_in)
    }

    pub fn started(&self) -> Option<Instant> {
        self.started
    }

    pub fn last_join(&self) -> Option<Instant> {
        self.last_join
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.as_ref().is_some_and(Heartbeat::is_running)
    }

    /// Disconnects up to `count` live bots. They are dropped on the next tick.
    pub fn disconnect_bots(&mut self, count: usize, reason: &str) {
        for tracked in self.bots.iter_mut().take(count) {
            tracked.bot.disconnect(reason);
        }
    }

    fn drop_disconnected(&mut self) {
        let (live, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut self.bots)
            .into_iter()
            .partition(|tracked| tracked.bot.is_joined());
        self.bots = live;

        for mut tracked in gone {
            info!(
                "Bot {} ({}) is no longer joined, dropping it",
                tracked.id,
                tracked.bot.name()
            );
            tracked.bot.disconnect("Bot is not connected");
            if tracked.stand_still {
                if let Some(heartbeat) = self.heartbeat.as_mut() {
                    heartbeat.stop();
                }
            }
        }
    }

    fn merge_connected(&mut self) {
        let (finished, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pending| pending.handle.is_finished());
        self.pending = waiting;

        for pending in finished {
            match pending.handle.now_or_never() {
                Some(Ok(ConnectOutcome {
                    result: Ok(bot), ..
                })) => self.track(pending.id, pending.stand_still, bot),
                Some(Ok(ConnectOutcome {
                    result: Err(e),
                    elapsed,
                })) => warn!(
                    "Could not connect bot {} after {} ms: {}",
                    pending.id,
                    elapsed.as_millis(),
                    e
                ),
                Some(Err(e)) => warn!("Connection attempt for bot {} died: {}", pending.id, e),
                None => warn!("Connection attempt for bot {} lost its result", pending.id),
            }
        }
    }

    fn track(&mut self, id: u32, stand_still: bool, bot: Bot) {
        let spawn = bot.location();
        debug!("Bot {} ({}) joined at {}", id, bot.name(), spawn);

        if stand_still {
            if let Some(heartbeat) = self.heartbeat.as_mut() {
                heartbeat.start(Arc::clone(bot.controller()));
            }
        }

        self.bots.push(TrackedBot {
            id,
            spawn,
            loaded_in: stand_still,
            stand_still,
            bot,
        });
    }

    fn launch_batch(&mut self, now: Instant) {
        let due = self
            .last_join
            .map_or(true, |last| now.duration_since(last) >= self.config.join_interval);
        let missing = (self.config.bots_total as usize).saturating_sub(self.population());
        if !due || missing == 0 {
            return;
        }

        let mut to_connect = missing.min(self.config.bots_per_join as usize);
        if to_connect == 0 {
            return;
        }

        if self.config.single_stand_still && !self.stand_still_launched {
            self.stand_still_launched = true;
            self.launch(true);
            to_connect -= 1;
        }
        for _ in 0..to_connect {
            self.launch(false);
        }
        self.last_join = Some(now);
    }

    fn launch(&mut self, stand_still: bool) {
        let id = self.next_id;
        self.next_id += 1;

        let name = if stand_still {
            format!("still-{}", id)
        } else {
            format!("bot-{}", id)
        };
        let connector = Arc::clone(&self.connector);
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = connector.connect(name).await;
            ConnectOutcome {
                result,
                elapsed: started.elapsed(),
            }
        });

        self.pending.push(PendingBot {
            id,
            stand_still,
            handle,
        });
    }

    fn probe_loaded_in(&mut self) {
        for tracked in self.bots.iter_mut().filter(|tracked| !tracked.loaded_in) {
            let below = tracked.bot.location().floor().offset(0, -1, 0);
            // Missing chunks are expected right after joining; try again next tick
            if tracked.bot.world().block_at(below).is_ok() {
                debug!("Bot {} loaded in", tracked.id);
                tracked.loaded_in = true;
            }
        }
    }

    fn drive_bots(&mut self) {
        let all_loaded = self.bots.iter().all(|tracked| tracked.loaded_in);
        let Some(movement) = self.movement.as_mut() else {
            return;
        };

        for tracked in self.bots.iter_mut().filter(|tracked| !tracked.stand_still) {
            let needs_task = tracked
                .bot
                .task_executor()
                .map_or(true, |executor| !executor.status().is_in_progress());

            if all_loaded && needs_task {
                let target = movement.new_target_location(&tracked.bot, tracked.spawn);
                let executor =
                    TaskExecutor::walk(&tracked.bot, target, &self.walk_settings, &self.limiter);
                tracked.bot.set_task_executor(executor);
            }

            if let Some(status) = tracked.bot.tick_task() {
                if status.is_failure() {
                    debug!("Bot {}: {}", tracked.id, status);
                }
            }
        }
    }
}

impl Experiment for MultiWalkAround {
    fn id(&self) -> u32 {
        Self::ID
    }

    fn description(&self) -> &str {
        "Bots walking around based on a movement model for Second Life."
    }

    fn before(&mut self) -> Result<(), ExperimentError> {
        self.config = MultiWalkConfig::from_params(&self.params)?;
        if self.movement.is_none() {
            self.movement = Some(Box::new(SimpleMovementModel::new(
                self.config.box_diameter,
                self.config.spawn_anchor,
                self.config.seed,
            )));
        }
        if self.config.single_stand_still && self.config.send_pings {
            self.heartbeat = Some(Heartbeat::new(self.config.ping_interval));
        }

        let now = Instant::now();
        self.started = Some(now);
        self.last_join = Some(now);
        info!(
            "Connecting {} bots, {} every {:?}, for {:?}",
            self.config.bots_total,
            self.config.bots_per_join,
            self.config.join_interval,
            self.config.duration
        );
        Ok(())
    }

    fn tick(&mut self) {
        self.drop_disconnected();
        self.merge_connected();
        self.launch_batch(Instant::now());
        self.probe_loaded_in();
        self.drive_bots();

        self.ticks += 1;
        if self.ticks % SUMMARY_EVERY_TICKS == 0 {
            debug!(
                "Tick {}: {} live, {} connecting, {} loaded in",
                self.ticks,
                self.bots.len(),
                self.pending.len(),
                self.bots.iter().filter(|tracked| tracked.loaded_in).count()
            );
        }
    }

    fn is_done(&self) -> bool {
        let Some(started) = self.started else {
            return false;
        };
        if started.elapsed() > self.config.duration {
            return true;
        }
        !self.bots.is_empty() && self.bots.iter().all(|tracked| !tracked.bot.is_joined())
    }

    fn after(&mut self) {
        if let Some(heartbeat) = self.heartbeat.as_mut() {
            if heartbeat.stop() {
                info!("Heartbeat stopped");
            }
        }

        for mut tracked in self.bots.drain(..) {
            tracked.bot.disconnect("disconnect");
        }
        for pending in self.pending.drain(..) {
            pending.handle.abort();
        }
    }
}
