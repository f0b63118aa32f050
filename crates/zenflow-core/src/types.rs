use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CoreError;

/// Opaque task identifier (UUIDv4 string, assigned at creation, never changes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Outcome rating the user assigns after finishing a task.
///
/// Has no effect on scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Quality {
    #[default]
    Perfect,
    Good,
    Fair,
    #[serde(rename = "Needs Work")]
    NeedsWork,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Perfect => write!(f, "Perfect"),
            Quality::Good => write!(f, "Good"),
            Quality::Fair => write!(f, "Fair"),
            Quality::NeedsWork => write!(f, "Needs Work"),
        }
    }
}

impl std::str::FromStr for Quality {
    type Err = CoreError;

    /// Case-insensitive; accepts `needs-work`, `needs_work` and `needs work`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "perfect" => Ok(Quality::Perfect),
            "good" => Ok(Quality::Good),
            "fair" => Ok(Quality::Fair),
            "needs work" => Ok(Quality::NeedsWork),
            _ => Err(CoreError::InvalidQuality(s.trim().to_string())),
        }
    }
}

/// A single to-do item.
///
/// Serialised as a flat camelCase record, the same shape the task list is
/// persisted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    /// Display label, also used as the notification body.
    pub text: String,
    pub completed: bool,
    #[serde(default)]
    pub quality: Quality,
    /// Absolute due instant. `None` means the task is never scheduled.
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// At-most-once gate: set when the reminder for the current `due_date`
    /// has fired. Every change to `due_date` must reset it.
    #[serde(default)]
    pub reminder_sent: bool,
    /// Escalate to a ringing alarm in addition to the notification.
    #[serde(default)]
    pub alarm_enabled: bool,
}

impl Task {
    /// A fresh, unfired, incomplete task.
    pub fn new(
        text: impl Into<String>,
        due_date: Option<DateTime<Utc>>,
        alarm_enabled: bool,
    ) -> Self {
        Self {
            id: TaskId::new(),
            text: text.into(),
            completed: false,
            quality: Quality::default(),
            due_date,
            reminder_sent: false,
            alarm_enabled,
        }
    }

    /// True when the poll loop should fire this task at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => !self.reminder_sent && !self.completed && due <= now,
            None => false,
        }
    }
}
