use chrono::{DateTime, Local, Utc};
use zenflow_core::Task;
use zenflow_store::TaskStats;

/// Characters of the task id shown in listings; enough to be a unique prefix
/// in any realistic list.
const SHORT_ID_LEN: usize = 8;

pub fn short_id(task: &Task) -> &str {
    let id = task.id.as_str();
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn format_due(due: DateTime<Utc>) -> String {
    due.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// One listing line: `[x] 1a2b3c4d  text  (due ..., alarm, reminded, Good)`.
pub fn task_line(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut tags = Vec::new();
    if let Some(due) = task.due_date {
        tags.push(format!("due {}", format_due(due)));
    }
    if task.alarm_enabled {
        tags.push("alarm".to_string());
    }
    if task.reminder_sent {
        tags.push("reminded".to_string());
    }
    if task.completed {
        tags.push(task.quality.to_string());
    }
    let suffix = if tags.is_empty() {
        String::new()
    } else {
        format!("  ({})", tags.join(", "))
    };
    format!("[{mark}] {}  {}{suffix}", short_id(task), task.text)
}

pub fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in tasks {
        println!("{}", task_line(task));
    }
}

pub fn print_stats(stats: &TaskStats) {
    println!("Active:    {}", stats.active);
    println!("Completed: {}", stats.completed);
    println!("Perfect:   {}", stats.perfect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenflow_core::{Quality, TaskId};

    #[test]
    fn open_task_line() {
        let task = Task {
            id: TaskId::from("0123456789abcdef"),
            ..Task::new("buy milk", None, false)
        };
        assert_eq!(task_line(&task), "[ ] 01234567  buy milk");
    }

    #[test]
    fn completed_task_shows_quality_and_flags() {
        let mut task = Task::new("ship it", Some(Utc::now()), true);
        task.completed = true;
        task.reminder_sent = true;
        task.quality = Quality::NeedsWork;
        let line = task_line(&task);
        assert!(line.starts_with("[x] "));
        assert!(line.contains("alarm, reminded, Needs Work"));
    }

    #[test]
    fn short_id_handles_short_ids() {
        let task = Task {
            id: TaskId::from("ab"),
            ..Task::new("x", None, false)
        };
        assert_eq!(short_id(&task), "ab");
    }
}
