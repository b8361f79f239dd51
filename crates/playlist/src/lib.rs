//! Playlist management for the wallpaper daemon.
//!
//! The [`Manager`] owns the rotating wallpaper list and the renderer handle
//! and runs the daemon's state machine on the render-owning thread:
//!
//! ```text
//!   Starting ──▶ Idle ◀────────────┐
//!                 │ delay elapsed  │ fade done
//!                 ▼                │
//!             Transitioning ───────┘
//!                 │ display lost          Stop ──▶ Stopping
//!                 ▼
//!             Reconnecting (1 s back-off, indefinite)
//! ```
//!
//! Control clients talk to it exclusively through a [`ManagerHandle`]: a
//! bounded command queue plus a read-only view of the current wallpaper.
//! The queue is inspected non-blockingly once per tick, and a pending
//! command always preempts the scheduled timer.

mod command;
mod list;
mod manager;

pub use command::{command_queue, Command, CommandReceiver, CommandSender, EnqueueError};
pub use list::{EmptyListError, WallpaperList};
pub use manager::{Manager, ManagerError, ManagerHandle, ManagerOptions};
