//! Core library for quotamon.
//!
//! Polls a remote usage endpoint through a browser-supplied session, turns the
//! raw utilization into a remaining-capacity percentage, escalates repeated
//! fetch failures and fires de-duplicated low/zero quota notifications. A demo
//! generator and a scheduled greeting share the same display/notification path.

pub mod config;
pub mod demo;
pub mod error;
pub mod greeting;
pub mod monitor;
pub mod session;
pub mod usage;

pub use error::{ConfigError, FetchError, SendError};
