// Error model shared by the API client and the command dispatcher.
// Every failure the client can observe maps onto one of these variants so
// the dispatcher can match on the cause instead of inspecting messages.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Local input problem detected before any request was sent: a missing
    /// file, a missing argument or an unusable configuration value.
    #[error("{0}")]
    Validation(String),

    /// Network failure, timeout or a non-2xx response. `status` is set when
    /// the server answered.
    #[error("{}", transport_message(.status, .source))]
    Transport {
        status: Option<u16>,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response whose body did not match the expected shape.
    #[error("unexpected response from {endpoint}: {source}")]
    Protocol {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The service processed the request and reported `success: false`.
    #[error("{0}")]
    ApplicationFailure(String),

    /// Local disk failure while writing a download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn missing_file(path: &std::path::Path) -> Self {
        Error::Validation(format!("file not found: {}", path.display()))
    }

    /// HTTP status attached to a transport failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(source: reqwest::Error) -> Self {
        Error::Transport {
            status: source.status().map(|s| s.as_u16()),
            source,
        }
    }
}

fn transport_message(status: &Option<u16>, source: &reqwest::Error) -> String {
    if source.is_timeout() {
        return format!("request timed out: {}", source);
    }
    match status {
        Some(code) => format!("server returned HTTP {}: {}", code, source),
        None => format!("request failed: {}", source),
    }
}
