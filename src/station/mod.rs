//! Supervisor for the pipe-controlled station player.
//!
//! Architecture:
//! - `command.rs` - commands and their FIFO wire format
//! - `fifo.rs` - FIFO creation/repair and the redundant write paths
//! - `supervisor.rs` - start/stop/command state machine and orphan cleanup

mod command;
mod fifo;
mod supervisor;

pub use command::StationCommand;
pub use fifo::{ControlFifo, FifoError};
pub use supervisor::{
  CommandReport, DeliveryReport, ProcessHandle, StartReport, StationError, StationState, StationStatus,
  StationSupervisor, StopReport,
};
