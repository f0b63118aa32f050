use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use zenflow_core::Task;

use crate::{
    audio::{AudioDriver, AudioHandle},
    types::{AlarmState, RingingAlarm},
};

/// Single-slot alarm state machine: `Idle` or `Ringing(task)`.
///
/// The slot and the audio handle sit under one lock, so check-and-set is
/// atomic and two callers can never both see `Idle` and both ring.
pub struct AlarmController {
    driver: Arc<dyn AudioDriver>,
    asset: String,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    state: AlarmState,
    /// Opened on the first ring and reused for every later one.
    audio: Option<Box<dyn AudioHandle>>,
}

impl AlarmController {
    pub fn new(driver: Arc<dyn AudioDriver>, asset: impl Into<String>) -> Self {
        Self {
            driver,
            asset: asset.into(),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn state(&self) -> AlarmState {
        self.lock().state.clone()
    }

    pub fn ringing(&self) -> Option<RingingAlarm> {
        match &self.lock().state {
            AlarmState::Ringing(alarm) => Some(alarm.clone()),
            AlarmState::Idle => None,
        }
    }

    /// Enter `Ringing(task)` if idle and start the looping alarm sound.
    ///
    /// Returns `false` (and changes nothing) when another task already rings.
    /// Audio failures are logged; the alarm counts as ringing regardless.
    pub fn ring(&self, task: &Task) -> bool {
        let mut slot = self.lock();
        if let AlarmState::Ringing(current) = &slot.state {
            debug!(task_id = %task.id, ringing = %current.task_id, "alarm slot busy");
            return false;
        }
        slot.state = AlarmState::Ringing(RingingAlarm::from(task));
        info!(task_id = %task.id, "alarm ringing");

        if slot.audio.is_none() {
            match self.driver.open(&self.asset) {
                Ok(handle) => slot.audio = Some(handle),
                Err(e) => warn!(asset = %self.asset, "alarm audio unavailable: {e}"),
            }
        }
        if let Some(audio) = slot.audio.as_mut() {
            if let Err(e) = audio.play(true) {
                warn!("alarm audio did not start: {e}");
            }
        }
        true
    }

    /// Leave `Ringing`, silencing and rewinding the audio.
    ///
    /// Returns the alarm that was ringing, or `None` when already idle.
    pub fn release(&self) -> Option<RingingAlarm> {
        let mut slot = self.lock();
        let AlarmState::Ringing(alarm) = std::mem::take(&mut slot.state) else {
            return None;
        };
        if let Some(audio) = slot.audio.as_mut() {
            audio.pause();
            audio.reset_position();
        }
        info!(task_id = %alarm.task_id, "alarm released");
        Some(alarm)
    }

    /// Release any ringing alarm and close the audio handle.
    pub fn shutdown(&self) {
        self.release();
        self.lock().audio = None;
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
