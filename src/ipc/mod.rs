//! IPC module for daemon-UI communication

mod protocol;
mod server;

pub use protocol::{DetectorStatus, Notification, Request, Response};
pub use server::Server;
