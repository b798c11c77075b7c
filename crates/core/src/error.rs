//! Error types for the RAOP receiver library.

use std::fmt;

/// Errors that can occur in the RAOP receiver library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Protocol**: [`Parse`](Self::Parse) — malformed or truncated requests.
/// - **Dispatch**: [`UnmatchedRoute`](Self::UnmatchedRoute),
///   [`MalformedHandshakeBody`](Self::MalformedHandshakeBody).
/// - **Transport**: [`Io`](Self::Io) — socket/network failures.
/// - **Server**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
/// - **Discovery**: [`Announce`](Self::Announce).
///
/// Every variant is scoped to a single connection or a single startup call.
#[derive(Debug, thiserror::Error)]
pub enum RaopError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a request off the connection.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// No route is registered for this verb/resource pair.
    #[error("no route for {verb} {resource}")]
    UnmatchedRoute { verb: String, resource: String },

    /// The FairPlay setup body is too short to hold the stage byte.
    #[error("handshake body too short: {len} bytes, stage byte at offset {offset}")]
    MalformedHandshakeBody { len: usize, offset: usize },

    /// [`Server::stop`](crate::Server::stop) was called before
    /// [`Server::start`](crate::Server::start).
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// The discovery collaborator refused the advertisement.
    #[error("service advertisement failed: {0}")]
    Announce(String),
}

impl RaopError {
    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        Self::Parse { kind }
    }

    /// True for a connection that closed before sending a single byte.
    ///
    /// Such connections are not worth logging as malformed.
    pub fn is_no_request(&self) -> bool {
        matches!(
            self,
            Self::Parse {
                kind: ParseErrorKind::NoRequest
            }
        )
    }
}

/// Specific kind of request parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The stream ended cleanly before any byte was read.
    NoRequest,
    /// Start line did not have a verb and a resource separated by spaces.
    MalformedStartLine,
    /// A header line was not `Name: Value`, or could not be decoded.
    MalformedHeaders,
    /// The stream ended in the middle of the header block or body.
    UnexpectedEndOfStream,
    /// Declared `Content-Length` exceeds the configured limit.
    BodyTooLarge,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRequest => write!(f, "no request"),
            Self::MalformedStartLine => write!(f, "malformed start line"),
            Self::MalformedHeaders => write!(f, "malformed headers"),
            Self::UnexpectedEndOfStream => write!(f, "unexpected end of stream"),
            Self::BodyTooLarge => write!(f, "body too large"),
        }
    }
}

/// Convenience alias for `Result<T, RaopError>`.
pub type Result<T> = std::result::Result<T, RaopError>;
