use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A client request; one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "lowercase")]
pub enum Request {
    Status,
    Next,
    Stop,
    Load { paths: Vec<PathBuf> },
}

/// Live daemon snapshot returned for `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub pid: u32,
    pub socket: PathBuf,
    pub config: PathBuf,
    pub current_wallpaper: String,
}

/// Daemon replies. Variant order matters: serde tries them top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Status(StatusResponse),
    Loaded { status: String, loaded: usize },
    Failure { status: String, message: String },
    Ack { status: String },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack {
            status: "ok".into(),
        }
    }

    pub fn loaded(count: usize) -> Self {
        Response::Loaded {
            status: "ok".into(),
            loaded: count,
        }
    }

    /// Invalid request; the client should not retry.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Failure {
            status: "error".into(),
            message: message.into(),
        }
    }

    /// Transient condition (queue full); the client may retry.
    pub fn retry(message: impl Into<String>) -> Self {
        Response::Failure {
            status: "retry".into(),
            message: message.into(),
        }
    }

    pub fn status_field(&self) -> &str {
        match self {
            Response::Status(status) => &status.status,
            Response::Loaded { status, .. } => status,
            Response::Failure { status, .. } => status,
            Response::Ack { status } => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_as_json_lines() {
        for request in [
            Request::Status,
            Request::Next,
            Request::Stop,
            Request::Load {
                paths: vec![PathBuf::from("/a.png"), PathBuf::from("/b.jpg")],
            },
        ] {
            let line = serde_json::to_string(&request).unwrap();
            assert!(!line.contains('\n'));
            let parsed: Request = serde_json::from_str(&line).unwrap();
            assert_eq!(parsed, request);
        }
    }

    #[test]
    fn request_wire_format_is_tagged() {
        let line = serde_json::to_string(&Request::Next).unwrap();
        assert_eq!(line, r#"{"request":"next"}"#);
    }

    #[test]
    fn responses_deserialize_to_the_right_variant() {
        let ack: Response = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(ack, Response::ok());

        let loaded: Response = serde_json::from_str(r#"{"status":"ok","loaded":4}"#).unwrap();
        assert_eq!(loaded, Response::loaded(4));

        let failure: Response =
            serde_json::from_str(r#"{"status":"error","message":"nope"}"#).unwrap();
        assert_eq!(failure, Response::error("nope"));

        let status: Response = serde_json::from_str(
            r#"{"status":"ok","message":"smoothpaper is running","version":"0.3.0","pid":42,"socket":"/run/smoothpaper.sock","config":"/home/u/.config/smoothpaper/smoothpaper.toml","current_wallpaper":"/walls/a.png"}"#,
        )
        .unwrap();
        assert!(matches!(status, Response::Status(_)));
    }

    #[test]
    fn unknown_requests_fail_to_parse() {
        assert!(serde_json::from_str::<Request>(r#"{"request":"reboot"}"#).is_err());
    }
}
