pub mod common;
pub mod config;
pub mod relay;
pub mod server;
pub mod sources;
pub mod transport;
