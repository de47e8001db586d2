pub mod delete;
pub mod devices;
pub mod download;
pub mod items;
pub mod upload;
