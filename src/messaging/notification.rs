// Notifications reported by the audio loop to control threads

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// What part of the engine a notification comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    /// A queued or scheduled task failed
    Task,
    /// A recall stage returned an error during a tick
    Recall,
    Audio,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Task => "task",
            NotificationCategory::Recall => "recall",
            NotificationCategory::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    /// Soundcard tic the notification was raised on
    pub tic: u64,
    /// Unix time in milliseconds
    pub timestamp: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        category: NotificationCategory,
        tic: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            category,
            message: message.into(),
            tic,
            timestamp: now_ms(),
        }
    }

    pub fn warning(category: NotificationCategory, tic: u64, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, category, tic, message)
    }

    pub fn error(category: NotificationCategory, tic: u64, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, category, tic, message)
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }

    /// Whether the notification is younger than `max_age_ms`
    pub fn is_recent(&self, max_age_ms: u64) -> bool {
        now_ms().saturating_sub(self.timestamp) < max_age_ms
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} @{}] {}",
            self.category.as_str(),
            self.tic,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recall_error_display() {
        let notification = Notification::error(NotificationCategory::Recall, 42, "stuck");

        assert!(notification.is_error());
        assert_eq!(notification.to_string(), "[recall @42] stuck");
        assert!(notification.timestamp > 0);
    }

    #[test]
    fn test_level_order() {
        let warning = Notification::warning(NotificationCategory::Task, 0, "late");
        assert!(!warning.is_error());
        assert!(warning.level < NotificationLevel::Error);
        assert!(NotificationLevel::Info < warning.level);
    }

    #[test]
    fn test_is_recent() {
        let notification = Notification::warning(NotificationCategory::Audio, 7, "xrun");
        assert!(notification.is_recent(10_000));

        let old = Notification {
            timestamp: 0,
            ..notification
        };
        assert!(!old.is_recent(10_000));
    }
}
