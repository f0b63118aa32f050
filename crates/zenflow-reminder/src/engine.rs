use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};
use zenflow_core::{config::ReminderConfig, Task};
use zenflow_store::TaskStore;

use crate::{
    alarm::AlarmController,
    audio::AudioDriver,
    notify::NotificationSink,
    snooze::snooze,
    types::{AlarmState, ReminderEvent, RingingAlarm, TickReport},
};

/// Owns the poll loop and the alarm slot for one running application.
///
/// Construct once, call [`start`](Self::start) to begin polling and
/// [`stop`](Self::stop) to end it. User transitions ([`dismiss`](Self::dismiss),
/// [`snooze_at`](Self::snooze_at)) may be called from any thread.
pub struct ReminderEngine {
    core: Arc<EngineCore>,
    poll_loop: Mutex<Option<PollLoop>>,
}

/// A spawned poll loop and the channel that stops it.
struct PollLoop {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

struct EngineCore {
    config: ReminderConfig,
    store: Arc<TaskStore>,
    alarm: AlarmController,
    sink: Arc<dyn NotificationSink>,
    /// If set, lifecycle events are sent here (non-blocking).
    events_tx: Option<mpsc::Sender<ReminderEvent>>,
}

impl ReminderEngine {
    /// Build an engine over `store`.
    ///
    /// Pass `Some(tx)` to receive a [`ReminderEvent`] for every transition.
    /// Events go out with `try_send`, so a slow observer never stalls a tick.
    pub fn new(
        config: ReminderConfig,
        store: Arc<TaskStore>,
        sink: Arc<dyn NotificationSink>,
        audio: Arc<dyn AudioDriver>,
        asset: impl Into<String>,
        events_tx: Option<mpsc::Sender<ReminderEvent>>,
    ) -> Self {
        Self {
            core: Arc::new(EngineCore {
                config,
                store,
                alarm: AlarmController::new(audio, asset),
                sink,
                events_tx,
            }),
            poll_loop: Mutex::new(None),
        }
    }

    /// Spawn the poll loop on the current Tokio runtime.
    ///
    /// Returns `false` if the loop is already running.
    pub fn start(&self) -> bool {
        let mut poll_loop = self.poll_loop();
        if poll_loop.as_ref().is_some_and(|l| !l.handle.is_finished()) {
            return false;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let core = Arc::clone(&self.core);
        *poll_loop = Some(PollLoop {
            handle: tokio::spawn(core.run(shutdown_rx)),
            shutdown_tx,
        });
        true
    }

    /// Stop the poll loop. Safe to call any number of times, running or not.
    ///
    /// The alarm slot is left as is; a ringing alarm keeps ringing until the
    /// user acts or the engine is dropped.
    pub fn stop(&self) {
        if let Some(poll_loop) = self.poll_loop().take() {
            let _ = poll_loop.shutdown_tx.send(true);
            info!("reminder engine stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.poll_loop()
            .as_ref()
            .is_some_and(|l| !l.handle.is_finished())
    }

    /// Run one poll pass as of `now`.
    pub fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        self.core.tick_at(now)
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.core.alarm.state()
    }

    pub fn ringing(&self) -> Option<RingingAlarm> {
        self.core.alarm.ringing()
    }

    /// Complete the ringing task and return to idle.
    ///
    /// Returns the completed task, or `None` if nothing was ringing or the
    /// task has since been deleted.
    pub fn dismiss(&self) -> Option<Task> {
        self.core.dismiss()
    }

    /// Snooze the ringing task using the wall clock.
    pub fn snooze(&self) -> Option<Task> {
        self.snooze_at(Utc::now())
    }

    /// Re-arm the ringing task for `now + snooze offset` and return to idle.
    ///
    /// Returns the re-armed task, or `None` if nothing was ringing or the
    /// task has since been deleted.
    pub fn snooze_at(&self, now: DateTime<Utc>) -> Option<Task> {
        self.core.snooze_at(now)
    }

    fn poll_loop(&self) -> MutexGuard<'_, Option<PollLoop>> {
        self.poll_loop.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ReminderEngine {
    fn drop(&mut self) {
        self.stop();
        self.core.alarm.shutdown();
    }
}

impl EngineCore {
    /// Poll until `shutdown` broadcasts `true`.
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.poll_interval();
        info!(period_ms = period.as_millis() as u64, "reminder engine started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_at(Utc::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reminder engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let mut outbox: Vec<(Task, bool)> = Vec::new();

        // Scan, ring and flag under the store lock; notify after releasing it.
        self.store.update(|tasks| {
            for task in tasks.iter_mut().filter(|t| t.is_due(now)) {
                let mut rang = false;
                if task.alarm_enabled {
                    if self.alarm.ring(task) {
                        report.rang = Some(task.id.clone());
                        rang = true;
                    } else {
                        debug!(task_id = %task.id, "escalation dropped: alarm already ringing");
                        report.escalation_dropped.push(task.id.clone());
                    }
                }
                task.reminder_sent = true;
                report.fired.push(task.id.clone());
                outbox.push((task.clone(), rang));
            }
            !report.fired.is_empty()
        });

        for (task, rang) in outbox {
            info!(task_id = %task.id, alarm = rang, "reminder fired");
            let body = format!("{}{}", self.config.notification_prefix, task.text);
            self.sink.notify(&self.config.notification_title, &body);
            self.emit(ReminderEvent::Fired {
                task_id: task.id.clone(),
                text: task.text.clone(),
            });
            if rang {
                self.emit(ReminderEvent::Ringing(RingingAlarm::from(&task)));
            }
        }
        report
    }

    fn dismiss(&self) -> Option<Task> {
        let mut released = None;
        let mut completed = None;
        self.store.update(|tasks| {
            released = self.alarm.release();
            let Some(alarm) = released.as_ref() else {
                return false;
            };
            match tasks.iter_mut().find(|t| t.id == alarm.task_id) {
                Some(task) => {
                    task.completed = true;
                    completed = Some(task.clone());
                    true
                }
                None => false,
            }
        });

        let alarm = released?;
        if completed.is_none() {
            warn!(task_id = %alarm.task_id, "dismissed alarm for a task that no longer exists");
        }
        self.emit(ReminderEvent::Dismissed {
            task_id: alarm.task_id,
        });
        completed
    }

    fn snooze_at(&self, now: DateTime<Utc>) -> Option<Task> {
        let offset = self.config.snooze_offset();
        let mut released = None;
        let mut snoozed = None;
        self.store.update(|tasks| {
            released = self.alarm.release();
            let Some(alarm) = released.as_ref() else {
                return false;
            };
            match tasks.iter_mut().find(|t| t.id == alarm.task_id) {
                Some(task) => {
                    *task = snooze(task, now, offset);
                    snoozed = Some(task.clone());
                    true
                }
                None => false,
            }
        });

        let alarm = released?;
        match snoozed.as_ref().and_then(|t| t.due_date) {
            Some(due_date) => {
                info!(task_id = %alarm.task_id, due = %due_date, "alarm snoozed");
                self.emit(ReminderEvent::Snoozed {
                    task_id: alarm.task_id,
                    due_date,
                });
            }
            None => warn!(task_id = %alarm.task_id, "snoozed alarm for a task that no longer exists"),
        }
        snoozed
    }

    fn emit(&self, event: ReminderEvent) {
        if let Some(ref tx) = self.events_tx {
            // try_send never blocks the tick; drop the event if the observer lags.
            if tx.try_send(event).is_err() {
                warn!("reminder event channel full or closed; event dropped");
            }
        }
    }
}
