use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use playlist::{Command, EnqueueError, ManagerHandle};

use crate::protocol::{Request, Response, StatusResponse};

/// The slice of the manager the adapter is allowed to see.
pub trait ManagerPort: Send + Sync {
    fn enqueue(&self, command: Command) -> Result<(), EnqueueError>;
    fn current_wallpaper(&self) -> Option<PathBuf>;
}

impl ManagerPort for ManagerHandle {
    fn enqueue(&self, command: Command) -> Result<(), EnqueueError> {
        ManagerHandle::enqueue(self, command)
    }

    fn current_wallpaper(&self) -> Option<PathBuf> {
        ManagerHandle::current_wallpaper(self)
    }
}

/// Static facts baked into every status snapshot.
#[derive(Debug, Clone)]
pub struct DaemonInfo {
    pub version: String,
    pub config: PathBuf,
    pub socket: PathBuf,
}

/// The daemon-side socket server; accepts connections on its own thread
/// until `shutdown` is called.
pub struct ControlServer {
    socket: PathBuf,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ControlServer {
    /// Binds the socket (replacing a stale file; the caller has already
    /// probed for a live daemon) and starts the accept loop.
    pub fn spawn(
        port: Arc<dyn ManagerPort>,
        info: DaemonInfo,
    ) -> Result<Self, ServeError> {
        let socket = info.socket.clone();
        if socket.exists() {
            let _ = std::fs::remove_file(&socket);
        }

        let listener = UnixListener::bind(&socket).map_err(|source| ServeError::Bind {
            path: socket.clone(),
            source,
        })?;
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&socket, std::fs::Permissions::from_mode(0o600));
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_thread = {
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || {
                accept_loop(listener, port, info, shutdown);
            })
        };

        tracing::info!(socket = %socket.display(), "control socket listening");
        Ok(Self {
            socket,
            shutdown: Arc::clone(&shutdown),
            accept_thread: Some(accept_thread),
        })
    }

    pub fn socket(&self) -> &std::path::Path {
        &self.socket
    }

    /// Stops the accept loop and removes the socket file. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        // Wake the blocking accept with a throwaway connection.
        let _ = UnixStream::connect(&self.socket);
        if let Some(thread) = self.accept_thread.take() {
            let _ = thread.join();
        }
        let _ = std::fs::remove_file(&self.socket);
        tracing::info!("control socket closed");
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(
    listener: UnixListener,
    port: Arc<dyn ManagerPort>,
    info: DaemonInfo,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        let stream = match listener.accept() {
            Ok((stream, _addr)) => stream,
            Err(err) => {
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                tracing::warn!(error = %err, "control accept failed");
                continue;
            }
        };
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = handle_client(stream, port.as_ref(), &info) {
            tracing::debug!(error = %err, "control client error");
        }
    }
}

fn handle_client(
    stream: UnixStream,
    port: &dyn ManagerPort,
    info: &DaemonInfo,
) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(request, port, info),
            Err(err) => {
                tracing::error!(error = %err, "rejecting malformed control request");
                Response::error("invalid request")
            }
        };
        let mut body = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"status":"error","message":"failed to encode response"}"#.to_string()
        });
        body.push('\n');
        writer.write_all(body.as_bytes())?;
        writer.flush()?;
    }

    Ok(())
}

fn dispatch(request: Request, port: &dyn ManagerPort, info: &DaemonInfo) -> Response {
    match request {
        Request::Status => Response::Status(snapshot(port, info)),
        Request::Next => enqueue(port, Command::Next),
        Request::Stop => enqueue(port, Command::Stop),
        Request::Load { paths } => {
            if paths.is_empty() {
                tracing::error!("load request carried no wallpapers");
                return Response::error("load requires a non-empty list of wallpapers");
            }
            let count = paths.len();
            match port.enqueue(Command::Load(paths)) {
                Ok(()) => Response::loaded(count),
                Err(EnqueueError::Full) => Response::retry("command queue is full"),
            }
        }
    }
}

fn enqueue(port: &dyn ManagerPort, command: Command) -> Response {
    match port.enqueue(command) {
        Ok(()) => Response::ok(),
        Err(EnqueueError::Full) => Response::retry("command queue is full"),
    }
}

fn snapshot(port: &dyn ManagerPort, info: &DaemonInfo) -> StatusResponse {
    StatusResponse {
        status: "ok".into(),
        message: "smoothpaper is running".into(),
        version: info.version.clone(),
        pid: std::process::id(),
        socket: info.socket.clone(),
        config: info.config.clone(),
        current_wallpaper: port
            .current_wallpaper()
            .map(|path| path.display().to_string())
            .unwrap_or_default(),
    }
}
