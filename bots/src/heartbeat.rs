//! Periodic chat traffic from one bot.

use crate::bot::Controller;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

pub const MESSAGE_LENGTH: usize = 5;

/// Sends a short random chat message at a fixed period, the first one immediately.
#[derive(Debug)]
pub struct Heartbeat {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Does nothing if already running.
    pub fn start(&mut self, controller: Arc<dyn Controller>) {
        if self.handle.is_some() {
            return;
        }

        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let message = random_message(MESSAGE_LENGTH);
                debug!("Heartbeat chat: {}", message);
                controller.send_chat(&message);
            }
        }));
    }

    /// Returns whether there was anything to stop.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn random_message(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
