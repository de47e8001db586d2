pub mod coordinator;
pub mod registry;
pub mod router;
pub mod sweeper;

pub use coordinator::{AckOutcome, CutCoordinator};
pub use registry::{DeviceRegistry, EventSender};
pub use router::NotificationRouter;
pub use sweeper::spawn_sweeper;
