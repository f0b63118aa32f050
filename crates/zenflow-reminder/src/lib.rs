//! `zenflow-reminder`: due-date reminders and the ringing alarm.
//!
//! # Overview
//!
//! [`ReminderEngine`] polls the [`zenflow_store::TaskStore`] on a fixed
//! period. Every due task (scheduled, unfired, open, `due_date <= now`) gets
//! its reminder flag set and one notification through the
//! [`NotificationSink`]. Alarm-enabled tasks also try to take the single alarm
//! slot held by [`AlarmController`], which loops the alarm sound through an
//! [`AudioDriver`] until the user dismisses or snoozes.
//!
//! # Alarm transitions
//!
//! | From        | Action   | To   | Task effect                                   |
//! |-------------|----------|------|-----------------------------------------------|
//! | `Idle`      | due tick | `Ringing(t)` | `reminder_sent = true`                |
//! | `Ringing`   | due tick | `Ringing` (unchanged) | escalation dropped           |
//! | `Ringing(t)`| dismiss  | `Idle` | `completed = true`                          |
//! | `Ringing(t)`| snooze   | `Idle` | `due_date = now + offset`, `reminder_sent = false` |

pub mod alarm;
pub mod audio;
pub mod engine;
pub mod error;
pub mod notify;
pub mod snooze;
pub mod types;

pub use alarm::AlarmController;
pub use audio::{AudioDriver, AudioHandle, CommandAudio, SilentAudio};
pub use engine::ReminderEngine;
pub use error::{ReminderError, Result};
pub use notify::{ChimeNotifier, CommandNotifier, LogNotifier, NotificationSink};
pub use snooze::snooze;
pub use types::{AlarmState, ReminderEvent, RingingAlarm, TickReport};
