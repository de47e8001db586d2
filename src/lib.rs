//! lanclip — LAN shared-clipboard coordinator.
//!
//! Several devices on a local network share one logical clipboard. Items
//! (text or files) are published by one device and retrieved by others; an
//! optional cut marks an item as a move-in-progress that must be consumed by
//! every known device before it disappears. The coordinator tracks connected
//! devices, routes cut/ack/deletion events over persistent channels, and
//! reclaims cut state on timeout.

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod message;

pub use crate::config::{DeviceIdentity, Setting};
pub use crate::core::{
    spawn_sweeper, AckOutcome, CutCoordinator, DeviceRegistry, NotificationRouter,
};
pub use crate::domain::device::Device;
pub use crate::domain::item::{CutState, Item, ItemContent};
pub use crate::error::{Error, Result};
pub use crate::infrastructure::storage::ItemStore;
pub use crate::infrastructure::web::{AppState, WebServer};
pub use crate::message::{ClientMessage, ServerMessage};
