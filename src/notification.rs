//! User-visible notices raised by the editing session
//!
//! Errors stay around longer than informational notices. Front ends either
//! show [`NotificationManager::current`] or drain new notices with
//! [`NotificationManager::take_unseen`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl NotificationLevel {
    fn lifetime(self) -> Duration {
        match self {
            NotificationLevel::Info => Duration::from_secs(4),
            NotificationLevel::Warning => Duration::from_secs(6),
            NotificationLevel::Error => Duration::from_secs(10),
        }
    }
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    expires_at: Instant,
}

/// Notices in the order they were raised
#[derive(Debug, Default)]
pub struct NotificationManager {
    notices: VecDeque<Notification>,
    /// How many notices at the back have not been handed out yet
    unseen: usize,
}

impl NotificationManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, level: NotificationLevel, message: String) {
        self.notices.push_back(Notification {
            message,
            level,
            expires_at: Instant::now() + level.lifetime(),
        });
        self.unseen += 1;
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message.into());
    }

    /// Drop expired notices. Returns true if any were dropped.
    pub fn update(&mut self) -> bool {
        self.expire(Instant::now())
    }

    fn expire(&mut self, now: Instant) -> bool {
        let before = self.notices.len();
        // Only handed-out notices may expire
        let seen = before - self.unseen;
        let mut index = 0;
        self.notices.retain(|n| {
            let keep = index >= seen || n.expires_at > now;
            index += 1;
            keep
        });
        self.notices.len() != before
    }

    /// Notices raised since the last call, oldest first
    pub fn take_unseen(&mut self) -> Vec<Notification> {
        let start = self.notices.len() - self.unseen;
        self.unseen = 0;
        self.notices.range(start..).cloned().collect()
    }

    /// Most recent notice
    #[must_use]
    pub fn current(&self) -> Option<&Notification> {
        self.notices.back()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.notices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_notice_is_current() {
        let mut manager = NotificationManager::new();
        manager.info("Opened doc.pdf");
        manager.error("Commit failed: bad xref");

        let current = manager.current().unwrap();
        assert_eq!(current.message, "Commit failed: bad xref");
        assert_eq!(current.level, NotificationLevel::Error);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn unseen_notices_are_handed_out_once_in_order() {
        let mut manager = NotificationManager::new();
        manager.info("opened");
        manager.error("commit failed");

        let unseen: Vec<_> = manager
            .take_unseen()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(unseen, vec!["opened", "commit failed"]);
        assert!(manager.take_unseen().is_empty());

        manager.warn("later");
        assert_eq!(manager.take_unseen().len(), 1);
        assert_eq!(manager.count(), 3);
    }

    #[test]
    fn errors_outlive_info_notices() {
        let mut manager = NotificationManager::new();
        manager.info("opened");
        manager.error("render failed");
        let _ = manager.take_unseen();

        let later = Instant::now() + Duration::from_secs(5);
        assert!(manager.expire(later));
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.current().unwrap().level, NotificationLevel::Error);

        assert!(manager.expire(later + Duration::from_secs(10)));
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn unseen_notices_never_expire() {
        let mut manager = NotificationManager::new();
        manager.info("pending");

        assert!(!manager.expire(Instant::now() + Duration::from_secs(60)));
        assert_eq!(manager.take_unseen().len(), 1);
    }
}
