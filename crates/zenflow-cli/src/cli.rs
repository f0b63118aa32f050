use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "zenflow", about = "Tasks with due-date reminders and alarms")]
pub struct Cli {
    /// Path to the config file [default: ~/.zenflow/zenflow.toml]
    #[arg(long, env = "ZENFLOW_CONFIG", global = true)]
    pub config: Option<String>,

    /// Path to the task database (overrides `store.path` from config)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a task
    Add {
        /// Task text
        text: String,
        /// Absolute due time (RFC 3339, e.g. 2026-10-16T09:30:00+02:00)
        #[arg(long, conflicts_with = "in_minutes")]
        due: Option<String>,
        /// Due this many minutes from now
        #[arg(long)]
        in_minutes: Option<i64>,
        /// Ring an alarm (not just a notification) when due
        #[arg(long)]
        alarm: bool,
    },

    /// List all tasks, newest first
    List,

    /// Show the next few open tasks that have a due date
    Upcoming {
        #[arg(short, long, default_value_t = 3)]
        limit: usize,
    },

    /// Toggle a task between open and done
    Done {
        /// Task id or unique id prefix
        id: String,
    },

    /// Rate a completed task (perfect, good, fair, needs-work)
    Rate {
        /// Task id or unique id prefix
        id: String,
        quality: String,
    },

    /// Remove a task
    Rm {
        /// Task id or unique id prefix
        id: String,
    },

    /// Show completion counts
    Stats,

    /// Run the reminder engine in the foreground.
    ///
    /// Reads commands from stdin: `dismiss`, `snooze`, `list`, `quit`.
    Run,
}
