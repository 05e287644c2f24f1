use std::fmt;

use crate::error::CrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Error,
}

/// A non-blocking message shown over the current view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    /// `"<action> failed: <reason>"`, logged at warn level.
    pub fn failed(action: &str, reason: impl fmt::Display) -> Self {
        tracing::warn!(action, %reason, "operation failed");
        Self::error(format!("{action} failed: {reason}"))
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl From<&CrmError> for Notification {
    fn from(e: &CrmError) -> Self {
        Notification::error(e.to_string())
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Stack of visible notifications, newest last. Each entry has an id so it
/// can be dismissed.
#[derive(Debug, Default)]
pub struct Notifications {
    next_id: u64,
    items: Vec<(u64, Notification)>,
}

impl Notifications {
    const LIMIT: usize = 5;

    pub fn push(&mut self, notification: Notification) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push((id, notification));
        if self.items.len() > Self::LIMIT {
            self.items.remove(0);
        }
        id
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|(item_id, _)| *item_id != id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u64, Notification)> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_notification_drops_past_limit() {
        let mut stack = Notifications::default();
        let first = stack.push(Notification::info("first"));
        for i in 0..Notifications::LIMIT {
            stack.push(Notification::info(format!("n{i}")));
        }
        assert_eq!(stack.iter().count(), Notifications::LIMIT);
        assert!(stack.iter().all(|(id, _)| *id != first));
    }

    #[test]
    fn dismiss_removes_only_that_entry() {
        let mut stack = Notifications::default();
        let a = stack.push(Notification::success("saved"));
        let b = stack.push(Notification::failed("Delete", "boom"));
        stack.dismiss(a);
        let remaining: Vec<_> = stack.iter().collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, b);
        assert_eq!(remaining[0].1.message, "Delete failed: boom");
        assert!(remaining[0].1.is_error());
    }
}
