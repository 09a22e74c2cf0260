//! Daemon process driving one game client window.

pub mod bridge;
pub mod client;
pub mod driver;
pub mod paths;
pub mod server;

// Public API - used by main.rs
pub use client::DaemonClient;
pub use server::DaemonServer;
