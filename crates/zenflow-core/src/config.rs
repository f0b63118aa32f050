use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Floor for the poll period; anything tighter just burns CPU on full scans.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SNOOZE_MINUTES: i64 = 5;
/// Accepted range for `reminder.snooze_minutes` is `1..=MAX_SNOOZE_MINUTES`.
pub const MAX_SNOOZE_MINUTES: i64 = 24 * 60;
pub const DEFAULT_NOTIFICATION_TITLE: &str = "⏰ ZenFlow Reminder";
pub const DEFAULT_NOTIFICATION_PREFIX: &str = "Target identified: ";
pub const DEFAULT_ALARM_ASSET: &str =
    "https://assets.mixkit.co/active_storage/sfx/995/995-preview.mp3";
pub const DEFAULT_CHIME_ASSET: &str =
    "https://assets.mixkit.co/active_storage/sfx/2869/2869-preview.mp3";
pub const DEFAULT_NOTIFIER_COMMAND: &str = "notify-send";

/// Top-level config (zenflow.toml + ZENFLOW_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZenflowConfig {
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Poll loop and alarm behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// How often the task list is scanned for due reminders.
    /// Smaller values lower firing latency at the cost of more full scans.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Offset applied to "now" when a ringing alarm is snoozed.
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: i64,
    #[serde(default = "default_notification_title")]
    pub notification_title: String,
    /// Prepended to the task text to form the notification body.
    #[serde(default = "default_notification_prefix")]
    pub notification_prefix: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            notification_title: default_notification_title(),
            notification_prefix: default_notification_prefix(),
        }
    }
}

impl ReminderConfig {
    /// Poll period with the lower bound applied.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    /// Snooze offset, clamped into the accepted range so a config that
    /// skipped [`validate`](Self::validate) still yields a usable offset.
    pub fn snooze_offset(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.snooze_minutes.clamp(1, MAX_SNOOZE_MINUTES))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SNOOZE_MINUTES).contains(&self.snooze_minutes) {
            return Err(CoreError::Config(format!(
                "reminder.snooze_minutes must be between 1 and {MAX_SNOOZE_MINUTES}, got {}",
                self.snooze_minutes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file holding the key-value table.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Desktop notification delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Program invoked as `<command> <title> <body>`. Not found on PATH means
    /// notifications are treated as not permitted and dropped.
    #[serde(default = "default_notifier_command")]
    pub command: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            command: default_notifier_command(),
        }
    }
}

/// Alarm sound playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// The one alarm tone, as a URL or local path handed to the player.
    #[serde(default = "default_alarm_asset")]
    pub asset: String,
    /// Player program invoked as `<player> <asset>`, e.g. `paplay` or `mpv`.
    /// Unset means alarms ring silently and notifications carry no chime.
    #[serde(default)]
    pub player: Option<String>,
    /// Short sound played with every delivered notification when a player
    /// is configured.
    #[serde(default = "default_chime_asset")]
    pub chime: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            asset: default_alarm_asset(),
            player: None,
            chime: default_chime_asset(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_snooze_minutes() -> i64 {
    DEFAULT_SNOOZE_MINUTES
}
fn default_notification_title() -> String {
    DEFAULT_NOTIFICATION_TITLE.to_string()
}
fn default_notification_prefix() -> String {
    DEFAULT_NOTIFICATION_PREFIX.to_string()
}
fn default_notifier_command() -> String {
    DEFAULT_NOTIFIER_COMMAND.to_string()
}
fn default_alarm_asset() -> String {
    DEFAULT_ALARM_ASSET.to_string()
}
fn default_chime_asset() -> String {
    DEFAULT_CHIME_ASSET.to_string()
}
fn default_store_path() -> String {
    format!("{}/zenflow.db", zenflow_home())
}

fn zenflow_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.zenflow", home)
}

impl ZenflowConfig {
    /// Load config from a TOML file with ZENFLOW_* env var overrides.
    ///
    /// File lookup: explicit path, else `~/.zenflow/zenflow.toml`. A missing
    /// file is not an error. Nested keys use a double underscore in env vars,
    /// e.g. `ZENFLOW_REMINDER__POLL_INTERVAL_MS=1000`.
    /// Out-of-range values are rejected as [`CoreError::Config`].
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: Self = Self::figment(&path)
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config.reminder.validate()?;
        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("ZENFLOW_").split("__"))
    }
}

fn default_config_path() -> String {
    format!("{}/zenflow.toml", zenflow_home())
}

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
