use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::domain::device::Device;
use crate::message::ServerMessage;

/// Live-channel handle bound to one connected device. Sends never block;
/// the transport side drains the queue onto the socket.
pub type EventSender = mpsc::UnboundedSender<ServerMessage>;

struct Entry {
    device: Device,
    sender: Option<EventSender>,
}

/// Tracks every device that has ever registered, plus its live channel.
///
/// Ephemeral by design: rebuilt from connection events after restart, since
/// liveness cannot be reconstructed. Entries are never removed; disconnecting
/// only drops the channel binding and marks the device offline. New cuts
/// draw their pending set from all known ids, so devices that are currently
/// offline still participate if they reconnect before the deadline.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the device, mark it online, and bind its live channel.
    pub async fn register(&self, id: &str, name: &str, sender: EventSender) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(id.to_string()).or_insert_with(|| Entry {
            device: Device::new(id, name),
            sender: None,
        });
        entry.device.name = name.to_string();
        entry.device.online = true;
        entry.device.last_seen = Utc::now();
        entry.sender = Some(sender);
        info!("Device {} ({}) registered", id, name);
    }

    /// Refresh `last_seen` for any registry activity.
    pub async fn touch(&self, id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(id) {
            entry.device.last_seen = Utc::now();
            entry.device.online = true;
        }
    }

    /// Mark offline and clear the channel binding, retaining the record.
    pub async fn disconnect(&self, id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(id) {
            entry.device.online = false;
            entry.device.last_seen = Utc::now();
            entry.sender = None;
            info!("Device {} disconnected", id);
        }
    }

    /// Ids of every device ever registered, online or not.
    pub async fn known_ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn is_online(&self, id: &str) -> bool {
        let entries = self.entries.read().await;
        entries.get(id).map_or(false, |e| e.device.online)
    }

    /// Registry view for the device listing endpoint.
    pub async fn snapshot(&self) -> Vec<Device> {
        let entries = self.entries.read().await;
        let mut devices: Vec<Device> = entries.values().map(|e| e.device.clone()).collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub(crate) async fn sender_of(&self, id: &str) -> Option<EventSender> {
        let entries = self.entries.read().await;
        entries.get(id).and_then(|e| e.sender.clone())
    }

    pub(crate) async fn online_senders(&self) -> Vec<(String, EventSender)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter_map(|(id, e)| e.sender.clone().map(|s| (id.clone(), s)))
            .collect()
    }
}
