//! End-to-end exercises of the control socket against a stub manager.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use control::{
    is_running, request, status, ClientError, ControlServer, DaemonInfo, ManagerPort, Request,
    Response,
};
use playlist::{Command, EnqueueError};

/// Records enqueued commands; optionally reports a full queue.
struct StubPort {
    commands: Mutex<Vec<Command>>,
    full: bool,
    current: Option<PathBuf>,
}

impl StubPort {
    fn new(current: Option<PathBuf>) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            full: false,
            current,
        }
    }
}

impl ManagerPort for StubPort {
    fn enqueue(&self, command: Command) -> Result<(), EnqueueError> {
        if self.full {
            return Err(EnqueueError::Full);
        }
        self.commands.lock().unwrap().push(command);
        Ok(())
    }

    fn current_wallpaper(&self) -> Option<PathBuf> {
        self.current.clone()
    }
}

fn spawn_server(port: Arc<StubPort>) -> (ControlServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("smoothpaper.sock");
    let info = DaemonInfo {
        version: "0.3.0-test".into(),
        config: PathBuf::from("/tmp/smoothpaper.toml"),
        socket: socket.clone(),
    };
    let server = ControlServer::spawn(port, info).unwrap();
    (server, dir)
}

#[test]
fn status_reports_the_live_snapshot() {
    let port = Arc::new(StubPort::new(Some(PathBuf::from("/walls/current.png"))));
    let (mut server, _dir) = spawn_server(Arc::clone(&port));

    let snapshot = status(server.socket()).unwrap();
    assert_eq!(snapshot.status, "ok");
    assert_eq!(snapshot.version, "0.3.0-test");
    assert_eq!(snapshot.pid, std::process::id());
    assert_eq!(snapshot.current_wallpaper, "/walls/current.png");

    server.shutdown();
}

#[test]
fn next_and_stop_enqueue_commands() {
    let port = Arc::new(StubPort::new(None));
    let (mut server, _dir) = spawn_server(Arc::clone(&port));

    assert_eq!(request(server.socket(), &Request::Next).unwrap(), Response::ok());
    assert_eq!(request(server.socket(), &Request::Stop).unwrap(), Response::ok());

    let commands = port.commands.lock().unwrap();
    assert_eq!(*commands, vec![Command::Next, Command::Stop]);
    drop(commands);

    server.shutdown();
}

#[test]
fn load_enqueues_and_reports_the_count() {
    let port = Arc::new(StubPort::new(None));
    let (mut server, _dir) = spawn_server(Arc::clone(&port));

    let paths = vec![PathBuf::from("/w/a.png"), PathBuf::from("/w/b.jpg")];
    let response = request(
        server.socket(),
        &Request::Load {
            paths: paths.clone(),
        },
    )
    .unwrap();
    assert_eq!(response, Response::loaded(2));
    assert_eq!(
        *port.commands.lock().unwrap(),
        vec![Command::Load(paths)]
    );

    server.shutdown();
}

#[test]
fn empty_load_is_refused_and_not_enqueued() {
    let port = Arc::new(StubPort::new(None));
    let (mut server, _dir) = spawn_server(Arc::clone(&port));

    let err = request(server.socket(), &Request::Load { paths: Vec::new() }).unwrap_err();
    match err {
        ClientError::Refused { status, .. } => assert_eq!(status, "error"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(port.commands.lock().unwrap().is_empty());

    server.shutdown();
}

#[test]
fn full_queue_asks_the_client_to_retry() {
    let port = Arc::new(StubPort {
        commands: Mutex::new(Vec::new()),
        full: true,
        current: None,
    });
    let (mut server, _dir) = spawn_server(Arc::clone(&port));

    let err = request(server.socket(), &Request::Next).unwrap_err();
    match err {
        ClientError::Refused { status, .. } => assert_eq!(status, "retry"),
        other => panic!("unexpected error: {other:?}"),
    }

    server.shutdown();
}

#[test]
fn is_running_probe_tracks_server_lifetime() {
    let port = Arc::new(StubPort::new(None));
    let (mut server, _dir) = spawn_server(port);
    let socket = server.socket().to_path_buf();

    assert!(is_running(&socket));
    server.shutdown();
    assert!(!is_running(&socket));
}
