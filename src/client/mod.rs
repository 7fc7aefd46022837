//! HTTP access to the usage endpoint and the greeting conversation.

mod http_client;

pub use http_client::{greeting_url, HttpClient};
