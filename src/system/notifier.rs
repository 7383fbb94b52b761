//! Notification collaborator

use crate::error::{TenantryError, TenantryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Delivery channel, e.g. `email` or `webhook`
    pub channel: String,
    pub recipient: String,
    pub message: String,
}

/// Outbound notification port
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> TenantryResult<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct SentNotification {
    pub sent_at: DateTime<Utc>,
    pub notification: Notification,
}

/// Notifier that appends to an in-memory outbox
#[derive(Default)]
pub struct MemoryNotifier {
    outbox: Mutex<Vec<SentNotification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox(&self) -> Vec<SentNotification> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, notification: Notification) -> TenantryResult<()> {
        if notification.recipient.trim().is_empty() {
            return Err(TenantryError::EffectFailed {
                effect_type: "notify/send".to_string(),
                message: format!("no recipient for {} notification", notification.channel),
            });
        }
        tracing::debug!(
            channel = %notification.channel,
            recipient = %notification.recipient,
            "Queued notification"
        );
        self.outbox.lock()?.push(SentNotification {
            sent_at: Utc::now(),
            notification,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_appends_to_outbox() {
        let notifier = MemoryNotifier::new();
        notifier
            .send(Notification {
                channel: "email".to_string(),
                recipient: "ops@acme.test".to_string(),
                message: "low stock".to_string(),
            })
            .unwrap();

        let outbox = notifier.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].notification.recipient, "ops@acme.test");
    }

    #[test]
    fn test_send_without_recipient_fails() {
        let notifier = MemoryNotifier::new();
        let result = notifier.send(Notification {
            channel: "email".to_string(),
            recipient: " ".to_string(),
            message: "low stock".to_string(),
        });

        assert_eq!(result.unwrap_err().kind(), "effect-error");
        assert!(notifier.outbox().is_empty());
    }
}
