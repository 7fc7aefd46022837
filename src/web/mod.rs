//! Local HTTP listener for the browser companion.
//!
//! Receives session contexts and exposes health, status and manual refresh.

mod api;
mod server;

pub use api::ApiState;
pub use server::{router, WebServer};
