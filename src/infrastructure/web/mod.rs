pub mod handlers;
pub mod response;
pub mod routes;
pub mod webserver;

pub use webserver::{build_routes, AppState, WebServer};
