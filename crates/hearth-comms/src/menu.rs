use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks the latest message with buttons per chat so stale menus can be
/// removed once they outlive their TTL.
#[derive(Debug)]
pub struct MenuTracker {
    ttl: Duration,
    menus: HashMap<i64, (i64, Instant)>,
}

impl MenuTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            menus: HashMap::new(),
        }
    }

    /// Records a new menu; returns the one it replaces, which should be deleted.
    pub fn track(&mut self, chat_id: i64, message_id: i64, now: Instant) -> Option<i64> {
        self.menus
            .insert(chat_id, (message_id, now))
            .map(|(previous, _)| previous)
            .filter(|previous| *previous != message_id)
    }

    pub fn clear(&mut self, chat_id: i64) -> Option<i64> {
        self.menus.remove(&chat_id).map(|(message_id, _)| message_id)
    }

    /// Removes and returns `(chat_id, message_id)` for every expired menu.
    pub fn take_expired(&mut self, now: Instant) -> Vec<(i64, i64)> {
        let ttl = self.ttl;
        let expired: Vec<(i64, i64)> = self
            .menus
            .iter()
            .filter(|(_, (_, sent))| now.saturating_duration_since(*sent) >= ttl)
            .map(|(chat, (message, _))| (*chat, *message))
            .collect();
        for (chat, _) in &expired {
            self.menus.remove(chat);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.menus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.menus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menus_expire_after_ttl() {
        let start = Instant::now();
        let mut tracker = MenuTracker::new(Duration::from_secs(60));
        tracker.track(1, 10, start);
        tracker.track(2, 20, start + Duration::from_secs(30));

        assert!(tracker.take_expired(start + Duration::from_secs(59)).is_empty());
        assert_eq!(
            tracker.take_expired(start + Duration::from_secs(60)),
            vec![(1, 10)]
        );
        assert_eq!(tracker.len(), 1);
        assert_eq!(
            tracker.take_expired(start + Duration::from_secs(95)),
            vec![(2, 20)]
        );
        assert!(tracker.is_empty());
    }

    #[test]
    fn newer_menu_replaces_older_one() {
        let now = Instant::now();
        let mut tracker = MenuTracker::new(Duration::from_secs(60));
        assert_eq!(tracker.track(1, 10, now), None);
        assert_eq!(tracker.track(1, 11, now), Some(10));
        assert_eq!(tracker.clear(1), Some(11));
        assert_eq!(tracker.clear(1), None);
    }
}
