//! Media playback through the MPV companion.
//!
//! Architecture:
//! - `track.rs` - tracks and file name parsing
//! - `queue.rs` - two-slot play queue
//! - `machine.rs` - event-driven playback state machine
//! - `library.rs` - confined access to the local library
//! - `progress.rs` - observer fan-out
//! - `backend.rs` - the player seam, implemented by `MpvClient`
//! - `controller.rs` - playback operations and the event listener

mod backend;
mod controller;
mod library;
mod machine;
mod progress;
mod queue;
mod track;

pub use backend::PlayerBackend;
pub use controller::{DeleteReport, MediaController, MediaError, MediaStatus, SaveStatus, SaveTicket};
pub use library::{Library, LibraryError};
pub use machine::{transition, Effect, Machine, Phase, PlayerEvent};
pub use progress::{MediaNotice, ProgressHub, Subscription};
pub use queue::{Queue, QueueFull, QueueSlot};
pub use track::{Track, TrackMetadata, TrackSource};
