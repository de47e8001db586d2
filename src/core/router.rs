use log::debug;

use super::registry::DeviceRegistry;
use crate::message::ServerMessage;

/// Delivers events to live channels, best-effort per recipient.
///
/// There is no queued redelivery for offline devices; a reconnecting device
/// catches up through the resync performed on registration.
#[derive(Clone)]
pub struct NotificationRouter {
    registry: DeviceRegistry,
}

impl NotificationRouter {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self { registry }
    }

    /// Deliver to every currently connected device. A closed or broken
    /// channel is skipped; it never blocks delivery to the others.
    pub async fn broadcast(&self, message: &ServerMessage) {
        // Hold the registry lock only long enough to clone the senders.
        let senders = self.registry.online_senders().await;
        for (device_id, sender) in senders {
            if sender.send(message.clone()).is_err() {
                debug!("Dropping event for {}: channel closed", device_id);
            }
        }
    }

    /// Targeted delivery to one device; silently dropped if offline.
    pub async fn notify(&self, device_id: &str, message: &ServerMessage) {
        if let Some(sender) = self.registry.sender_of(device_id).await {
            if sender.send(message.clone()).is_err() {
                debug!("Dropping event for {}: channel closed", device_id);
            }
        }
    }
}
