//! Per-tick units of bot behaviour and the executor that drives them.

use crate::bot::Bot;
use crate::walk::{SearchLimiter, WalkSettings, WalkTask};
use shared::Vector3i;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Progress of a task. Replaced wholesale on every tick.
#[derive(Debug, Clone)]
pub enum TaskStatus {
    InProgress,
    Success,
    Failure {
        message: String,
        cause: Option<Arc<dyn Error + Send + Sync>>,
    },
}

impl TaskStatus {
    pub fn failure(message: impl Into<String>) -> Self {
        TaskStatus::Failure {
            message: message.into(),
            cause: None,
        }
    }

    pub fn failure_with_cause(
        message: impl Into<String>,
        cause: impl Error + Send + Sync + 'static,
    ) -> Self {
        TaskStatus::Failure {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failure { .. })
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            TaskStatus::Failure { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync)> {
        match self {
            TaskStatus::Failure { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::InProgress => write!(f, "in progress"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failure {
                message,
                cause: Some(cause),
            } => write!(f, "failure: {} ({})", message, cause),
            TaskStatus::Failure { message, .. } => write!(f, "failure: {}", message),
        }
    }
}

/// The kinds of work a bot can be given.
#[derive(Debug)]
pub enum Task {
    Walk(WalkTask),
}

impl Task {
    pub fn tick(&mut self, bot: &Bot) -> TaskStatus {
        match self {
            Task::Walk(walk) => walk.tick(bot),
        }
    }

    pub fn stop(&mut self) {
        match self {
            Task::Walk(walk) => walk.stop(),
        }
    }

    pub fn status(&self) -> &TaskStatus {
        match self {
            Task::Walk(walk) => walk.status(),
        }
    }

    pub fn short_name(&self) -> &str {
        match self {
            Task::Walk(walk) => walk.short_name(),
        }
    }
}

/// Owns one task for one bot and records the status of its last tick.
///
/// A terminal task is never ticked again; the orchestrator replaces the
/// executor instead.
#[derive(Debug)]
pub struct TaskExecutor {
    task: Task,
    status: TaskStatus,
}

impl TaskExecutor {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            status: TaskStatus::InProgress,
        }
    }

    pub fn walk(
        bot: &Bot,
        target: Vector3i,
        settings: &WalkSettings,
        limiter: &SearchLimiter,
    ) -> Self {
        Self::new(Task::Walk(WalkTask::new(bot, target, settings.clone(), limiter)))
    }

    pub fn tick(&mut self, bot: &Bot) -> TaskStatus {
        if self.status.is_terminal() {
            return self.status.clone();
        }
        self.status = self.task.tick(bot);
        self.status.clone()
    }

    pub fn stop(&mut self) {
        self.task.stop();
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn short_name(&self) -> &str {
        self.task.short_name()
    }
}
