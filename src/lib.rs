//! quotamon application: wiring of the core state machine to the HTTP
//! listener, the HTTP client and the indicator/notification sinks.

pub mod app;
pub mod cli;
pub mod client;
pub mod logging;
pub mod sinks;
pub mod web;
