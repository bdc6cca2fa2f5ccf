//! HTTP front end for the relay
//!
//! Translates the browser client's requests into relay operations:
//! a POST publishes, a GET long-polls, everything else is a static file.

pub mod assets;
pub mod config;
pub mod connection;
pub mod http;
pub mod listener;
pub mod routes;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use listener::RelayServer;
pub use routes::{Action, Router};
