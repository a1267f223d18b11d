use std::collections::HashMap;

use chrono::{NaiveDateTime, NaiveTime};
use hearth_core::{Ledger, Reminder};
use tracing::debug;

/// Emits each reminder once when it falls due. Untimed reminders fall due at
/// the start of their date.
///
/// A reminder moved to a new date or time fires again at the new moment.
#[derive(Debug, Default)]
pub struct ReminderScheduler {
    /// Reminder id to the due moment it was last announced for.
    notified: HashMap<String, NaiveDateTime>,
}

impl ReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn due(&mut self, ledger: &Ledger, now: NaiveDateTime) -> Vec<Reminder> {
        self.notified
            .retain(|id, _| ledger.reminders.iter().any(|reminder| &reminder.id == id));

        let mut fired = Vec::new();
        for reminder in &ledger.reminders {
            let at = due_at(reminder);
            if reminder.done || at > now || self.notified.get(&reminder.id) == Some(&at) {
                continue;
            }
            self.notified.insert(reminder.id.clone(), at);
            fired.push(reminder.clone());
        }
        if !fired.is_empty() {
            debug!(count = fired.len(), "reminders due");
        }
        fired
    }

    pub fn notified_count(&self) -> usize {
        self.notified.len()
    }
}

fn due_at(reminder: &Reminder) -> NaiveDateTime {
    reminder
        .date
        .and_time(reminder.time.unwrap_or(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("datetime")
    }

    #[test]
    fn fires_each_reminder_once_when_due() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 2).expect("date");
        let mut ledger = Ledger::new();
        ledger.reminders.push(Reminder::new(
            "Pay Rent",
            date,
            NaiveTime::from_hms_opt(9, 30, 0),
        ));
        ledger.reminders.push(Reminder::new("Call mom", date, None));

        let mut scheduler = ReminderScheduler::new();
        assert!(scheduler.due(&ledger, at(1, 23, 59)).is_empty());

        let early = scheduler.due(&ledger, at(2, 8, 0));
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].title, "Call mom");

        let later = scheduler.due(&ledger, at(2, 9, 30));
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].title, "Pay Rent");
        assert!(scheduler.due(&ledger, at(3, 0, 0)).is_empty());
        assert_eq!(scheduler.notified_count(), 2);
    }

    #[test]
    fn completed_reminders_never_fire() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
        let mut reminder = Reminder::new("Gym", date, None);
        reminder.done = true;
        let mut ledger = Ledger::new();
        ledger.reminders.push(reminder);
        let mut scheduler = ReminderScheduler::new();
        assert!(scheduler.due(&ledger, at(5, 12, 0)).is_empty());
    }

    #[test]
    fn rescheduled_reminder_fires_again() {
        let mut ledger = Ledger::new();
        let first = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
        ledger.reminders.push(Reminder::new("Renew passport", first, None));

        let mut scheduler = ReminderScheduler::new();
        assert_eq!(scheduler.due(&ledger, at(1, 10, 0)).len(), 1);
        assert!(scheduler.due(&ledger, at(2, 10, 0)).is_empty());

        ledger.reminders[0].date = NaiveDate::from_ymd_opt(2026, 6, 5).expect("date");
        assert!(scheduler.due(&ledger, at(4, 23, 0)).is_empty());
        let again = scheduler.due(&ledger, at(5, 9, 0));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].title, "Renew passport");
        assert!(scheduler.due(&ledger, at(6, 9, 0)).is_empty());
    }

    #[test]
    fn deleted_reminders_are_forgotten() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
        let mut ledger = Ledger::new();
        ledger.reminders.push(Reminder::new("Water plants", date, None));
        ledger.reminders.push(Reminder::new("Call bank", date, None));

        let mut scheduler = ReminderScheduler::new();
        assert_eq!(scheduler.due(&ledger, at(1, 12, 0)).len(), 2);
        assert_eq!(scheduler.notified_count(), 2);

        ledger.reminders.remove(0);
        assert!(scheduler.due(&ledger, at(1, 13, 0)).is_empty());
        assert_eq!(scheduler.notified_count(), 1);
    }
}
