//! Control channel for the wallpaper daemon.
//!
//! Short-lived client invocations talk to the long-lived daemon over a
//! local stream socket with one JSON object per line in each direction.
//! The server side translates requests into enqueued [`playlist::Command`]s
//! and answers `status` synchronously from a live snapshot; it never
//! touches the renderer or the wallpaper list itself. A failed `status`
//! call is the canonical "no daemon running" probe.

mod client;
mod protocol;
mod server;

use std::path::PathBuf;

pub use client::{is_running, request, status, ClientError};
pub use protocol::{Request, Response, StatusResponse};
pub use server::{ControlServer, DaemonInfo, ManagerPort, ServeError};

/// Environment override for the socket location, used by tests.
pub const SOCKET_ENV: &str = "SMOOTHPAPER_SOCKET";

const SOCKET_NAME: &str = "smoothpaper.sock";

/// `$XDG_RUNTIME_DIR/smoothpaper.sock`, falling back to the system temp
/// directory when the runtime dir is unset.
pub fn socket_path() -> PathBuf {
    if let Some(path) = std::env::var_os(SOCKET_ENV) {
        return PathBuf::from(path);
    }
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) => PathBuf::from(dir).join(SOCKET_NAME),
        None => std::env::temp_dir().join(SOCKET_NAME),
    }
}
