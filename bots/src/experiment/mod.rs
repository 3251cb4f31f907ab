//! Tick-driven experiment lifecycle.
//!
//! An experiment is set up once (`before`), ticked at a fixed cadence until it
//! reports that it is done, and torn down once (`after`). Ticks must return
//! promptly; anything slow is spawned and polled on later ticks.

mod multi_walk;

pub use multi_walk::{MultiWalkAround, MultiWalkConfig};

use crate::config::ExperimentParams;
use crate::connector::BotConnector;
use crate::error::{ConfigError, ExperimentError};
use crate::walk::{SearchLimiter, WalkSettings};
use log::info;
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

pub trait Experiment: Send {
    fn id(&self) -> u32;
    fn description(&self) -> &str;

    /// Reads parameters and prepares state. Called exactly once.
    fn before(&mut self) -> Result<(), ExperimentError>;
    fn tick(&mut self);
    fn is_done(&self) -> bool;
    fn after(&mut self);
}

/// What every experiment gets from the harness.
#[derive(Clone)]
pub struct ExperimentContext {
    pub connector: Arc<dyn BotConnector>,
    pub walk_settings: WalkSettings,
    pub limiter: SearchLimiter,
}

/// Creates the experiment registered under `id`.
pub fn build(
    id: u32,
    params: ExperimentParams,
    context: ExperimentContext,
) -> Result<Box<dyn Experiment>, ConfigError> {
    match id {
        MultiWalkAround::ID => Ok(Box::new(MultiWalkAround::new(params, context))),
        other => Err(ConfigError::UnknownExperiment(other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Running,
    Done,
}

/// Enforces `before` once, `tick` while running, `after` once.
pub struct ExperimentRunner {
    experiment: Box<dyn Experiment>,
    phase: Phase,
    ticks: u64,
    started: Option<Instant>,
}

impl ExperimentRunner {
    pub fn new(experiment: Box<dyn Experiment>) -> Self {
        Self {
            experiment,
            phase: Phase::Created,
            ticks: 0,
            started: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn experiment(&self) -> &dyn Experiment {
        self.experiment.as_ref()
    }

    pub fn start(&mut self) -> Result<(), ExperimentError> {
        match self.phase {
            Phase::Created => {}
            Phase::Running => return Err(ExperimentError::Lifecycle("running")),
            Phase::Done => return Err(ExperimentError::Lifecycle("finished")),
        }

        info!(
            "Starting experiment {}: {}",
            self.experiment.id(),
            self.experiment.description()
        );
        self.experiment.before()?;
        self.phase = Phase::Running;
        self.started = Some(Instant::now());
        Ok(())
    }

    /// Ticks once unless the experiment is not running or already done.
    pub fn step(&mut self) -> bool {
        if self.phase != Phase::Running || self.experiment.is_done() {
            return false;
        }
        self.experiment.tick();
        self.ticks += 1;
        true
    }

    /// Tears down a started experiment. Returns whether `after` ran.
    pub fn finish(&mut self) -> bool {
        let was_running = self.phase == Phase::Running;
        self.phase = Phase::Done;
        if !was_running {
            return false;
        }

        self.experiment.after();
        info!(
            "Experiment {} finished after {} ticks ({:?})",
            self.experiment.id(),
            self.ticks,
            self.started.map(|started| started.elapsed()).unwrap_or_default()
        );
        true
    }

    /// Starts, ticks every `tick_interval` until done or Ctrl+C, then finishes.
    pub async fn run(&mut self, tick_interval: Duration) -> Result<(), ExperimentError> {
        self.start()?;

        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.step() {
                        break;
                    }
                }
                _ = &mut shutdown => {
                    info!("Received Ctrl+C, stopping experiment");
                    break;
                }
            }
        }

        self.finish();
        Ok(())
    }
}
