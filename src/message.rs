//! Wire messages for the persistent per-device channel.
//!
//! JSON objects tagged by `type`, field names in camelCase. The protocol is
//! level-triggered: every server event describes a final state, so a device
//! that misses an intermediate `paste-ack` still converges once it sees
//! `item-deleted` or resyncs on reconnect.

use serde::{Deserialize, Serialize};

use crate::domain::item::CutState;

/// Device → coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Must be the first message on a fresh connection. An anonymous id is
    /// minted when `deviceId` is absent.
    #[serde(rename_all = "camelCase")]
    Register {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    PasteAck {
        item_id: String,
        token: String,
        device_id: String,
    },
}

/// Coordinator → device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Registered { device_id: String },

    /// Broadcast on cut creation, and replayed per open cut on registration
    /// so a reconnecting device catches up.
    #[serde(rename_all = "camelCase")]
    CutCreated { item_id: String, cut: CutState },

    /// Sent to the cut owner after each acknowledgment.
    #[serde(rename_all = "camelCase")]
    PasteAck {
        item_id: String,
        device_id: String,
        pending: Vec<String>,
    },

    /// Direct reply to a channel-issued paste-ack.
    #[serde(rename_all = "camelCase")]
    PasteAckResult {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deleted: Option<bool>,
    },

    #[serde(rename_all = "camelCase")]
    ItemDeleted { item_id: String },

    #[serde(rename_all = "camelCase")]
    CutExpired { item_id: String },
}
