//! `zenflow run`: foreground reminder engine with a line-based control
//! channel on stdin.

use std::{
    io::{BufRead, BufReader},
    sync::Arc,
};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};
use zenflow_core::ZenflowConfig;
use zenflow_reminder::{
    AudioDriver, ChimeNotifier, CommandAudio, CommandNotifier, LogNotifier, NotificationSink,
    ReminderEngine, ReminderEvent, SilentAudio,
};
use zenflow_store::TaskStore;

use crate::output;

/// Stdin control commands.
#[derive(Debug, PartialEq, Eq)]
enum Control {
    Dismiss,
    Snooze,
    List,
    Quit,
    Unknown(String),
}

impl Control {
    fn parse(line: &str) -> Option<Self> {
        let cmd = line.trim().to_ascii_lowercase();
        if cmd.is_empty() {
            return None;
        }
        Some(match cmd.as_str() {
            "d" | "dismiss" | "done" => Control::Dismiss,
            "s" | "snooze" => Control::Snooze,
            "l" | "ls" | "list" => Control::List,
            "q" | "quit" | "exit" => Control::Quit,
            _ => Control::Unknown(cmd),
        })
    }
}

pub async fn run(config: ZenflowConfig, store: Arc<TaskStore>) -> Result<()> {
    let audio: Arc<dyn AudioDriver> = match config.audio.player.as_deref() {
        Some(player) => Arc::new(CommandAudio::new(player)),
        None => {
            info!("no audio.player configured; alarms ring silently");
            Arc::new(SilentAudio)
        }
    };
    let sink = notification_sink(&config, audio.as_ref());

    // Event channel: engine → terminal printer
    let (events_tx, events_rx) = mpsc::channel::<ReminderEvent>(64);
    let engine = ReminderEngine::new(
        config.reminder.clone(),
        Arc::clone(&store),
        sink,
        audio,
        config.audio.asset.clone(),
        Some(events_tx),
    );
    tokio::spawn(print_events(
        events_rx,
        config.reminder.snooze_offset().num_minutes(),
    ));

    engine.start();
    println!("Reminder engine running. Commands: dismiss, snooze, list, quit.");

    let mut lines = spawn_line_reader(BufReader::new(std::io::stdin()));
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let Some(control) = Control::parse(&line) else {
            continue;
        };
        match control {
            Control::Dismiss => match engine.dismiss() {
                Some(task) => println!("Completed: {}", task.text),
                None => println!("No alarm is ringing."),
            },
            Control::Snooze => match engine.snooze() {
                Some(task) => println!("{}", output::task_line(&task)),
                None => println!("No alarm is ringing."),
            },
            Control::List => output::print_tasks(&store.all()),
            Control::Quit => break,
            Control::Unknown(cmd) => println!("Unknown command: {cmd}"),
        }
    }

    engine.stop();
    if !store.flush() {
        warn!("task list could not be saved on exit");
    }
    info!("reminder engine exited");
    Ok(())
}

/// Desktop notifier, or the log when no notifier program is installed. With
/// an audio player configured every desktop notification also chimes.
fn notification_sink(
    config: &ZenflowConfig,
    audio: &dyn AudioDriver,
) -> Arc<dyn NotificationSink> {
    let notifier = CommandNotifier::new(&config.notifier.command);
    if !notifier.is_enabled() {
        return Arc::new(LogNotifier);
    }
    let notifier: Arc<dyn NotificationSink> = Arc::new(notifier);
    if config.audio.player.is_none() {
        return notifier;
    }
    match ChimeNotifier::new(Arc::clone(&notifier), audio, &config.audio.chime) {
        Ok(chimed) => Arc::new(chimed),
        Err(e) => {
            warn!("notification chime unavailable: {e}");
            notifier
        }
    }
}

/// Forward lines from `reader` over a channel, reading on a plain thread.
///
/// A read blocked on that thread never holds up runtime shutdown, so Ctrl-C
/// exits even while stdin stays open. The channel closes at EOF.
fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}

async fn print_events(mut events_rx: mpsc::Receiver<ReminderEvent>, snooze_minutes: i64) {
    while let Some(event) = events_rx.recv().await {
        match event {
            ReminderEvent::Fired { text, .. } => println!("Reminder: {text}"),
            ReminderEvent::Ringing(alarm) => println!(
                "ALARM: {} (type `dismiss` to complete or `snooze` for {} min)",
                alarm.text, snooze_minutes
            ),
            ReminderEvent::Dismissed { .. } => println!("Alarm dismissed."),
            ReminderEvent::Snoozed { due_date, .. } => println!(
                "Alarm snoozed until {}.",
                due_date.with_timezone(&chrono::Local).format("%H:%M")
            ),
        }
    }
}
