// Error type shared by the library modules. The binary wraps these in
// `anyhow` with extra context; nothing here is retried.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not read settings {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse settings {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("could not write settings {}: {source}", .path.display())]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no configuration directory could be determined for this platform")]
    NoConfigDir,

    #[error("client credentials are missing: set ClientID in {} or TODO_CLIENT_ID", .path.display())]
    MissingClientId { path: PathBuf },

    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("authorization callback carried an unexpected state value")]
    StateMismatch,

    #[error("no authorization callback received within {}s", .0.as_secs())]
    AuthorizationTimeout(Duration),

    #[error("token endpoint rejected the request: {status} - {body}")]
    TokenExchange {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("access token is not a valid header value")]
    InvalidToken,

    #[error("{method} {uri} failed: {status} - {body}")]
    Status {
        method: reqwest::Method,
        uri: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("task has no resource identifier")]
    MissingTaskUri,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
