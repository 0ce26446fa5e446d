//! # Error Module
//!
//! Crate-wide error taxonomy for the transport core.
//!
//! ## Overview
//!
//! Errors fall into five classes, each handled at a different boundary:
//!
//! - **Transport**: socket create/bind/listen/accept failures. Fatal to
//!   [`MiniServer::start`](crate::server::MiniServer::start), recoverable by
//!   retrying with a different port.
//! - **Framing**: malformed start line / header / chunk grammar
//!   ([`FrameError`]). Scoped to one connection: answered with a 4xx/5xx
//!   status line and the connection is closed.
//! - **Timeout**: a socket read exceeded the configured deadline. Treated
//!   identically to a client disconnect: silent close, no response.
//! - **Resource exhaustion**: the pool refused a job. Surfaced to the caller
//!   of `schedule`; at the connection layer it degrades to a `500`.
//! - **Programmer error**: double pushback, etc. These panic, since they
//!   indicate a core-logic bug rather than an environmental condition.
//!
//! Framing and timeout errors never propagate past the connection-handler
//! boundary; everything else is an explicit `Result` to the direct caller.

use std::fmt;
use std::io;

/// Grammar-level failure while framing one message off the wire.
///
/// Each variant maps to the HTTP status owed to the peer via
/// [`FrameError::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Request or status line did not match the wire grammar.
    BadStartLine,
    /// A header line was structurally broken (no name, no colon, bad fold).
    BadHeader,
    /// Chunk-size line or chunk framing was malformed.
    BadChunk,
    /// A quoted string ended before its closing quote.
    UnterminatedQuote,
    /// A bare `\r` was followed by something other than `\n`.
    BareCarriageReturn,
    /// Body-bearing request without `Content-Length` or `Transfer-Encoding`.
    LengthRequired,
    /// The stream ended before `Content-Length` bytes arrived.
    IncompleteEntity,
    /// Declared or accumulated entity size beyond the in-memory ceiling.
    EntityTooLarge,
    /// Method token not in the recognized set.
    UnknownMethod(String),
}

impl FrameError {
    /// HTTP status owed to the peer for this failure.
    ///
    /// Unrecognized methods answer `501 Not Implemented`; older UPnP stacks
    /// answered `511` here, but the modern status registry assigns 511 to
    /// "Network Authentication Required".
    pub fn status(&self) -> u16 {
        match self {
            FrameError::LengthRequired => 411,
            FrameError::EntityTooLarge => 413,
            FrameError::UnknownMethod(_) => 501,
            _ => 400,
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BadStartLine => write!(f, "malformed request or status line"),
            FrameError::BadHeader => write!(f, "malformed header line"),
            FrameError::BadChunk => write!(f, "malformed chunk framing"),
            FrameError::UnterminatedQuote => write!(f, "quoted string never closed"),
            FrameError::BareCarriageReturn => write!(f, "bare CR not followed by LF"),
            FrameError::LengthRequired => {
                write!(f, "body-bearing request without a length header")
            }
            FrameError::IncompleteEntity => {
                write!(f, "stream ended before the declared entity length")
            }
            FrameError::EntityTooLarge => {
                write!(f, "entity exceeds the in-memory size ceiling")
            }
            FrameError::UnknownMethod(m) => write!(f, "unrecognized method {m:?}"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Top-level error type for the transport core.
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure outside the bind/listen path.
    Io(io::Error),
    /// Could not create the listening socket.
    Socket(io::Error),
    /// Could not bind the requested port.
    Bind(io::Error),
    /// Could not start listening on the bound socket.
    Listen(io::Error),
    /// A socket read exceeded the configured deadline.
    Timeout,
    /// The peer closed the connection mid-message.
    ConnectionClosed,
    /// Message framing failed; carries the status owed to the peer.
    Frame(FrameError),
    /// The pool rejected a job because it is shutting down.
    PoolShutDown,
    /// `start()` on a server that is already running.
    AlreadyRunning,
    /// `stop()` on a server that is not running.
    NotRunning,
}

impl Error {
    /// True when the failure is one the connection handler answers with a
    /// status line (framing), false when the socket is closed silently.
    pub fn response_owed(&self) -> Option<u16> {
        match self {
            Error::Frame(e) => Some(e.status()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "socket I/O failed: {e}"),
            Error::Socket(e) => write!(f, "could not create socket: {e}"),
            Error::Bind(e) => write!(f, "could not bind port: {e}"),
            Error::Listen(e) => write!(f, "could not listen: {e}"),
            Error::Timeout => write!(f, "read deadline exceeded"),
            Error::ConnectionClosed => write!(f, "peer closed the connection"),
            Error::Frame(e) => write!(f, "framing error: {e}"),
            Error::PoolShutDown => write!(f, "thread pool is shut down"),
            Error::AlreadyRunning => write!(f, "server is already running"),
            Error::NotRunning => write!(f, "server is not running"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Socket(e) | Error::Bind(e) | Error::Listen(e) => Some(e),
            Error::Frame(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl From<io::Error> for Error {
    /// Read timeouts surface as [`Error::Timeout`], unexpected EOF as
    /// [`Error::ConnectionClosed`]; everything else stays transport-level.
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}
