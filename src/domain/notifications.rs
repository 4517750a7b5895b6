//! Transient user-facing notices (toasts) owned by the session layer.

use std::collections::VecDeque;

pub const DEFAULT_NOTIFICATION_TTL_MS: i64 = 5_000;
pub const DEFAULT_MAX_VISIBLE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub text: String,
    pub expires_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct NotificationQueue {
    ttl_ms: i64,
    max_visible: usize,
    next_id: u64,
    items: VecDeque<Notification>,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL_MS, DEFAULT_MAX_VISIBLE)
    }
}

impl NotificationQueue {
    pub fn new(ttl_ms: i64, max_visible: usize) -> Self {
        Self {
            ttl_ms,
            max_visible: max_visible.max(1),
            next_id: 1,
            items: VecDeque::new(),
        }
    }

    /// Enqueues a notice. A repeat of a visible notice only refreshes its deadline.
    pub fn push(&mut self, level: NotificationLevel, text: impl Into<String>, now_ms: i64) -> u64 {
        let text = text.into();
        self.expire(now_ms);

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.level == level && item.text == text)
        {
            existing.expires_at_ms = now_ms + self.ttl_ms;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.items.push_back(Notification {
            id,
            level,
            text,
            expires_at_ms: now_ms + self.ttl_ms,
        });

        while self.items.len() > self.max_visible {
            self.items.pop_front();
        }

        id
    }

    pub fn expire(&mut self, now_ms: i64) {
        self.items.retain(|item| item.expires_at_ms > now_ms);
    }

    pub fn visible(&self, now_ms: i64) -> Vec<Notification> {
        self.items
            .iter()
            .filter(|item| item.expires_at_ms > now_ms)
            .cloned()
            .collect()
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|item| item.id != id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_expire_after_ttl() {
        let mut queue = NotificationQueue::new(1_000, 3);
        queue.push(NotificationLevel::Info, "copied", 0);

        assert_eq!(queue.visible(999).len(), 1);
        assert!(queue.visible(1_000).is_empty());
    }

    #[test]
    fn oldest_notice_is_evicted_over_capacity() {
        let mut queue = NotificationQueue::new(10_000, 2);
        queue.push(NotificationLevel::Info, "one", 0);
        queue.push(NotificationLevel::Info, "two", 1);
        queue.push(NotificationLevel::Warning, "three", 2);

        let texts: Vec<_> = queue.visible(3).into_iter().map(|n| n.text).collect();

        assert_eq!(texts, vec!["two".to_owned(), "three".to_owned()]);
    }

    #[test]
    fn duplicate_notice_refreshes_deadline_instead_of_stacking() {
        let mut queue = NotificationQueue::new(1_000, 3);
        let first = queue.push(NotificationLevel::Error, "send failed", 0);
        let second = queue.push(NotificationLevel::Error, "send failed", 800);

        assert_eq!(first, second);
        assert_eq!(queue.visible(1_500).len(), 1);
    }

    #[test]
    fn dismiss_removes_only_the_target() {
        let mut queue = NotificationQueue::default();
        let a = queue.push(NotificationLevel::Info, "a", 0);
        queue.push(NotificationLevel::Info, "b", 0);

        queue.dismiss(a);

        let visible = queue.visible(1);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].text, "b");
    }
}
