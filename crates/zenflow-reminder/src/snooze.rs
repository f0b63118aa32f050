use chrono::{DateTime, Duration, Utc};
use zenflow_core::Task;

/// Re-arm `task` to fire again `offset` after `now`.
///
/// Only `due_date` and `reminder_sent` change; completion, quality and the
/// alarm flag are carried over as-is. A due date past the representable
/// range saturates at [`DateTime::<Utc>::MAX_UTC`].
pub fn snooze(task: &Task, now: DateTime<Utc>, offset: Duration) -> Task {
    Task {
        due_date: Some(
            now.checked_add_signed(offset)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        ),
        reminder_sent: false,
        ..task.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenflow_core::Quality;

    #[test]
    fn advances_due_and_rearms() {
        let now = Utc::now();
        let mut task = Task::new("stretch", Some(now - Duration::minutes(1)), true);
        task.reminder_sent = true;
        task.quality = Quality::Good;

        let snoozed = snooze(&task, now, Duration::minutes(5));
        assert_eq!(snoozed.due_date, Some(now + Duration::minutes(5)));
        assert!(!snoozed.reminder_sent);
        assert_eq!(snoozed.id, task.id);
        assert_eq!(snoozed.text, task.text);
        assert_eq!(snoozed.quality, Quality::Good);
        assert!(snoozed.alarm_enabled);
        assert!(!snoozed.completed);
    }

    #[test]
    fn due_date_saturates_at_end_of_time() {
        let now = DateTime::<Utc>::MAX_UTC - Duration::minutes(1);
        let task = Task::new("forever", Some(now), true);
        assert_eq!(
            snooze(&task, now, Duration::minutes(5)).due_date,
            Some(DateTime::<Utc>::MAX_UTC)
        );
    }

    #[test]
    fn unscheduled_task_gains_a_due_date() {
        let now = Utc::now();
        let task = Task::new("x", None, false);
        assert_eq!(snooze(&task, now, Duration::minutes(5)).due_date, Some(now + Duration::minutes(5)));
    }
}
