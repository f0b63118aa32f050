use chrono::{DateTime, Utc};
use zenflow_core::{Task, TaskId};

/// The task currently presented as an active alarm.
///
/// Holds the id plus a display snapshot taken when ringing began; the task
/// itself stays owned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RingingAlarm {
    pub task_id: TaskId,
    pub text: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<&Task> for RingingAlarm {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            text: task.text.clone(),
            due_date: task.due_date,
        }
    }
}

/// Alarm controller state: at most one ringing task.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AlarmState {
    #[default]
    Idle,
    Ringing(RingingAlarm),
}

impl AlarmState {
    pub fn is_ringing(&self) -> bool {
        matches!(self, AlarmState::Ringing(_))
    }
}

/// Lifecycle events forwarded to an optional observer channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderEvent {
    /// A due task was marked reminded and its notification dispatched.
    Fired { task_id: TaskId, text: String },
    /// A task took the alarm slot.
    Ringing(RingingAlarm),
    /// The ringing task was completed from the alarm.
    Dismissed { task_id: TaskId },
    /// The ringing task was re-armed for `due_date`.
    Snoozed {
        task_id: TaskId,
        due_date: DateTime<Utc>,
    },
}

/// Outcome of a single poll pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tasks whose reminder fired this pass, in list order.
    pub fired: Vec<TaskId>,
    /// Task that entered the alarm slot this pass, if any.
    pub rang: Option<TaskId>,
    /// Alarm-enabled tasks that fired while the slot was taken. Their
    /// escalation is not retried.
    pub escalation_dropped: Vec<TaskId>,
}
