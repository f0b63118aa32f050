//! Alarm sound playback.
//!
//! A driver opens one handle for the configured asset; the alarm controller
//! keeps that handle for the life of the engine and drives it with
//! play/pause/reset only.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{ReminderError, Result},
    notify::resolve_program,
};

/// A persistent playback handle for a single audio asset.
pub trait AudioHandle: Send {
    /// Start playback. Must return promptly; playback runs in the background.
    fn play(&mut self, looping: bool) -> Result<()>;
    fn pause(&mut self);
    /// Rewind so the next `play` starts from the top.
    fn reset_position(&mut self);
}

/// Factory for [`AudioHandle`]s.
pub trait AudioDriver: Send + Sync {
    fn open(&self, asset: &str) -> Result<Box<dyn AudioHandle>>;
}

/// Driver whose handles do nothing. Used when no player is configured.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioDriver for SilentAudio {
    fn open(&self, asset: &str) -> Result<Box<dyn AudioHandle>> {
        debug!(%asset, "silent audio handle opened");
        Ok(Box::new(SilentHandle))
    }
}

struct SilentHandle;

impl AudioHandle for SilentHandle {
    fn play(&mut self, _looping: bool) -> Result<()> {
        Ok(())
    }
    fn pause(&mut self) {}
    fn reset_position(&mut self) {}
}

/// Plays the asset through an external player program (`paplay`, `afplay`,
/// `mpv`, ...), re-launching it after each run while looping.
pub struct CommandAudio {
    player: String,
}

impl CommandAudio {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
        }
    }
}

impl AudioDriver for CommandAudio {
    fn open(&self, asset: &str) -> Result<Box<dyn AudioHandle>> {
        if asset.trim().is_empty() {
            return Err(ReminderError::Audio("no audio asset configured".to_string()));
        }
        let program = resolve_program(&self.player)?;
        info!(player = %program.display(), %asset, "alarm player ready");
        Ok(Box::new(CommandHandle {
            program,
            asset: asset.to_string(),
            playing: None,
        }))
    }
}

struct CommandHandle {
    program: PathBuf,
    asset: String,
    /// Cancels the background player loop; `None` while paused.
    playing: Option<CancellationToken>,
}

impl AudioHandle for CommandHandle {
    fn play(&mut self, looping: bool) -> Result<()> {
        if self.playing.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return Ok(());
        }
        let rt = tokio::runtime::Handle::try_current().map_err(|_| ReminderError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let program = self.program.clone();
        let asset = self.asset.clone();
        rt.spawn(async move {
            loop {
                let mut child = match tokio::process::Command::new(&program)
                    .arg(&asset)
                    .kill_on_drop(true)
                    .spawn()
                {
                    Ok(child) => child,
                    Err(e) => {
                        warn!(player = %program.display(), "alarm player failed to start: {e}");
                        break;
                    }
                };
                tokio::select! {
                    _ = token.cancelled() => {
                        // Dropping the child kills it.
                        break;
                    }
                    status = child.wait() => match status {
                        Ok(s) if s.success() && looping => continue,
                        Ok(s) if s.success() => break,
                        Ok(s) => {
                            warn!(code = ?s.code(), "alarm player exited with failure");
                            break;
                        }
                        Err(e) => {
                            warn!("alarm player wait failed: {e}");
                            break;
                        }
                    },
                }
            }
            debug!("alarm player loop finished");
        });
        self.playing = Some(cancel);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(token) = self.playing.take() {
            token.cancel();
        }
    }

    fn reset_position(&mut self) {
        // Every play launches a fresh player process, which starts at the top.
    }
}

impl Drop for CommandHandle {
    fn drop(&mut self) {
        self.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_handle_accepts_everything() {
        let mut handle = SilentAudio.open("tone.mp3").unwrap();
        handle.play(true).unwrap();
        handle.pause();
        handle.reset_position();
    }

    #[test]
    fn missing_player_fails_to_open() {
        let driver = CommandAudio::new("zenflow-no-such-player");
        let err = driver.open("tone.mp3").err().expect("open should fail");
        assert!(matches!(err, ReminderError::ProgramNotFound { .. }));
    }

    #[test]
    fn empty_asset_fails_to_open() {
        let driver = CommandAudio::new("sh");
        let err = driver.open("  ").err().expect("open should fail");
        assert!(matches!(err, ReminderError::Audio(_)));
    }

    #[test]
    fn play_outside_runtime_reports_error() {
        let mut handle = CommandHandle {
            program: PathBuf::from("/bin/true"),
            asset: "tone.mp3".to_string(),
            playing: None,
        };
        assert!(matches!(handle.play(true), Err(ReminderError::NoRuntime)));
        assert!(handle.playing.is_none());
    }

    #[tokio::test]
    async fn pause_cancels_player_loop() {
        let mut handle = CommandHandle {
            program: PathBuf::from("/nonexistent/player"),
            asset: "tone.mp3".to_string(),
            playing: None,
        };
        handle.play(true).unwrap();
        let token = handle.playing.clone().unwrap();
        handle.pause();
        assert!(token.is_cancelled());
        assert!(handle.playing.is_none());
    }
}
