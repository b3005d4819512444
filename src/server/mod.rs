//! WebSocket server side: configuration, subscriber gateway, listener

pub mod config;
pub(crate) mod gateway;
pub mod listener;

pub use config::ServerConfig;
pub use listener::NetwatchServer;
