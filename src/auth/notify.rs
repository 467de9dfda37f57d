//! Delivery of password reset links.
//!
//! The outbound mail transport lives outside this crate; it plugs in through
//! [`ResetNotifier`].

use std::sync::Mutex;

use thiserror::Error;
use tracing::info;

/// What the account owner needs in order to finish a reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetNotice {
    /// Account identifier (email address) to deliver to.
    pub identifier: String,
    /// Reset token.
    pub token: String,
    /// Link to the reset page carrying the token.
    pub link: String,
}

/// Delivery failure reported by a notifier.
#[derive(Error, Debug)]
#[error("reset notice delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Sink for reset notices.
pub trait ResetNotifier: Send + Sync {
    /// Hand a notice to the transport.
    fn deliver(&self, notice: &ResetNotice) -> Result<(), NotifyError>;
}

/// Build the reset page link for `token`.
pub fn reset_link(base_url: &str, token: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}token={}", urlencoding::encode(token))
}

/// Writes the reset link to the log. For development setups without mail.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ResetNotifier for LogNotifier {
    fn deliver(&self, notice: &ResetNotice) -> Result<(), NotifyError> {
        info!(
            identifier = %notice.identifier,
            link = %notice.link,
            "Password reset link issued"
        );
        Ok(())
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<ResetNotice>>,
}

impl MemoryNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices delivered so far, oldest first.
    pub fn sent(&self) -> Vec<ResetNotice> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The most recent notice for `identifier`.
    pub fn last_for(&self, identifier: &str) -> Option<ResetNotice> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|n| n.identifier == identifier)
            .cloned()
    }
}

impl ResetNotifier for MemoryNotifier {
    fn deliver(&self, notice: &ResetNotice) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(identifier: &str, token: &str) -> ResetNotice {
        ResetNotice {
            identifier: identifier.to_string(),
            token: token.to_string(),
            link: reset_link("http://localhost/reset", token),
        }
    }

    #[test]
    fn test_reset_link() {
        assert_eq!(
            reset_link("http://0.0.0.0:8080/reset_password", "abc-123"),
            "http://0.0.0.0:8080/reset_password?token=abc-123"
        );
        assert_eq!(
            reset_link("https://example.com/reset?lang=en", "abc"),
            "https://example.com/reset?lang=en&token=abc"
        );
        assert_eq!(
            reset_link("https://example.com/reset", "a b&c"),
            "https://example.com/reset?token=a%20b%26c"
        );
    }

    #[test]
    fn test_memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.deliver(&notice("a@x.com", "t1")).unwrap();
        notifier.deliver(&notice("b@x.com", "t2")).unwrap();
        notifier.deliver(&notice("a@x.com", "t3")).unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].token, "t1");
        assert_eq!(notifier.last_for("a@x.com").unwrap().token, "t3");
        assert!(notifier.last_for("c@x.com").is_none());
    }

    #[test]
    fn test_log_notifier_accepts() {
        assert!(LogNotifier.deliver(&notice("a@x.com", "t1")).is_ok());
    }
}
