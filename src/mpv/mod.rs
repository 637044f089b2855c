//! MPV IPC module - spawns and controls the MPV companion via JSON IPC.
//!
//! Architecture:
//! - `process.rs` - MPV binary detection, spawning and process signature
//! - `ipc.rs` - Async Unix socket connection with request/response matching
//! - `protocol.rs` - JSON command/response types and serialization
//! - `client.rs` - High-level MPV client: lifecycle, health and commands

mod client;
mod ipc;
mod process;
mod protocol;

pub use client::{MpvClient, MpvError, OBSERVED_PROPERTIES};
pub use ipc::IpcError;
pub use protocol::{MpvCommand, MpvEvent, MpvResponse, PropertyValue};
