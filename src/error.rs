//! Error handling

use std::error::Error as _;
use std::path::PathBuf;

/// Coarse failure buckets, used to tell failures apart in logs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// The request never got a usable response.
    Transport,
    /// A response arrived but didn't have the expected shape.
    MalformedResponse,
    /// A well-formed response that carried no image.
    NoImageProduced,
    /// The image payload couldn't be decoded or persisted.
    DecodeOrWrite,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Transport => "transport failure",
            Self::MalformedResponse => "malformed response",
            Self::NoImageProduced => "no image produced",
            Self::DecodeOrWrite => "decode/write failure",
        };
        f.write_str(label)
    }
}

/// Everything that can go wrong generating a single image.
#[derive(Debug)]
pub enum GenerationError {
    /// Connection error, timeout, or an unreadable body.
    Transport(reqwest::Error),
    /// The service answered with a non-success status.
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },
    /// The body wasn't JSON, or not the JSON we expect.
    MalformedResponse(String),
    /// The service answered but returned no inline image.
    NoImageProduced {
        /// Block reason, finish reason or the text the model sent back instead.
        reason: Option<String>,
    },
    /// The inline payload wasn't valid base64.
    Decode(base64::DecodeError),
    /// The image couldn't be written to disk.
    Write {
        /// Destination we were writing to
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

impl GenerationError {
    /// Which bucket this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) | Self::HttpStatus { .. } => FailureKind::Transport,
            Self::MalformedResponse(_) => FailureKind::MalformedResponse,
            Self::NoImageProduced { .. } => FailureKind::NoImageProduced,
            Self::Decode(_) | Self::Write { .. } => FailureKind::DecodeOrWrite,
        }
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => {
                if err.is_timeout() {
                    write!(f, "Request timed out: {err}")?;
                } else {
                    write!(f, "Request failed: {err}")?;
                }
                // reqwest keeps the interesting part (refused, dns, ...) in the source chain
                if let Some(source) = err.source() {
                    write!(f, " ({source})")?;
                }
                Ok(())
            }
            Self::HttpStatus { status, body } => {
                write!(f, "Image service returned HTTP {status}: {body}")
            }
            Self::MalformedResponse(detail) => {
                write!(f, "Unexpected response shape: {detail}")
            }
            Self::NoImageProduced { reason: Some(reason) } => {
                write!(f, "No image in response: {reason}")
            }
            Self::NoImageProduced { reason: None } => write!(f, "No image in response"),
            Self::Decode(err) => write!(f, "Failed to base64-decode image: {err}"),
            Self::Write { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for GenerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        // the request URL carries the API key
        GenerationError::Transport(err.without_url())
    }
}

impl From<base64::DecodeError> for GenerationError {
    fn from(err: base64::DecodeError) -> Self {
        GenerationError::Decode(err)
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::MalformedResponse(err.to_string())
    }
}
