pub mod device;
pub mod item;

pub use device::Device;
pub use item::{CutState, Item, ItemContent};
