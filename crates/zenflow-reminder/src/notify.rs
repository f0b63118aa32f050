//! Transient user notifications.
//!
//! Delivery is fire-and-forget: a sink never reports failure and never makes
//! the caller wait for the notification to appear.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::{debug, info, warn};

use crate::{
    audio::{AudioDriver, AudioHandle},
    error::{ReminderError, Result},
};

/// Best-effort delivery of a short user-visible notification.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!(%title, %body, "notification");
    }
}

/// Runs an external program (`notify-send` style) as `<program> <title> <body>`.
///
/// The program is spawned on the Tokio runtime and never awaited by the
/// caller. When it is not installed the sink behaves as if notifications were
/// not permitted and drops everything.
pub struct CommandNotifier {
    program: Option<PathBuf>,
}

impl CommandNotifier {
    pub fn new(command: &str) -> Self {
        let program = match resolve_program(command) {
            Ok(path) => {
                info!(program = %path.display(), "desktop notifications enabled");
                Some(path)
            }
            Err(e) => {
                warn!("desktop notifications disabled: {e}");
                None
            }
        };
        Self { program }
    }

    pub fn is_enabled(&self) -> bool {
        self.program.is_some()
    }
}

impl NotificationSink for CommandNotifier {
    fn notify(&self, title: &str, body: &str) {
        let Some(program) = self.program.clone() else {
            debug!(%title, "notification dropped: no notifier");
            return;
        };
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            debug!(%title, "notification dropped: no runtime");
            return;
        };
        let (title, body) = (title.to_string(), body.to_string());
        rt.spawn(async move {
            let status = tokio::process::Command::new(&program)
                .arg(&title)
                .arg(&body)
                .kill_on_drop(true)
                .status()
                .await;
            match status {
                Ok(s) if s.success() => debug!(%title, "notification delivered"),
                Ok(s) => warn!(%title, code = ?s.code(), "notifier exited with failure"),
                Err(e) => warn!(%title, "notifier failed to start: {e}"),
            }
        });
    }
}

/// Wraps another sink and plays a short chime with every notification.
///
/// A chime still playing from the previous notification is cut off and the
/// new one starts from the top. Playback failures are logged only.
pub struct ChimeNotifier {
    inner: Arc<dyn NotificationSink>,
    chime: Mutex<Box<dyn AudioHandle>>,
}

impl ChimeNotifier {
    /// Open `asset` through `driver` once; the handle is reused for every
    /// notification.
    pub fn new(
        inner: Arc<dyn NotificationSink>,
        driver: &dyn AudioDriver,
        asset: &str,
    ) -> Result<Self> {
        let chime = driver.open(asset)?;
        Ok(Self {
            inner,
            chime: Mutex::new(chime),
        })
    }
}

impl NotificationSink for ChimeNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.inner.notify(title, body);
        let mut chime = self.chime.lock().unwrap_or_else(PoisonError::into_inner);
        chime.pause();
        chime.reset_position();
        if let Err(e) = chime.play(false) {
            debug!(%title, "notification chime did not play: {e}");
        }
    }
}

/// Look `program` up on `PATH` (or accept it as a path).
pub(crate) fn resolve_program(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| ReminderError::ProgramNotFound {
        program: program.to_string(),
    })
}
