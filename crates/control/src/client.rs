use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::protocol::{Request, Response, StatusResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not reach the daemon: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed daemon response: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("daemon refused the request ({status}): {message}")]
    Refused { status: String, message: String },
}

/// One request/response exchange with the daemon.
pub fn request(socket: &Path, request: &Request) -> Result<Response, ClientError> {
    let mut stream = UnixStream::connect(socket)?;
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream.write_all(line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(stream);
    let mut body = String::new();
    reader.read_line(&mut body)?;
    let response: Response = serde_json::from_str(body.trim())?;

    if let Response::Failure { status, message } = &response {
        return Err(ClientError::Refused {
            status: status.clone(),
            message: message.clone(),
        });
    }
    Ok(response)
}

/// Fetches the live status snapshot.
pub fn status(socket: &Path) -> Result<StatusResponse, ClientError> {
    match request(socket, &Request::Status)? {
        Response::Status(status) => Ok(status),
        other => Err(ClientError::Refused {
            status: other.status_field().to_string(),
            message: "unexpected response to status request".into(),
        }),
    }
}

/// The single-instance probe: a daemon is running iff `status` answers.
pub fn is_running(socket: &Path) -> bool {
    status(socket).is_ok()
}
