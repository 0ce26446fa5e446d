//! # Message Parser Module
//!
//! Assembles tokens into structured HTTP-grammar messages: start line,
//! typed headers, and a framed entity.
//!
//! ## Overview
//!
//! The parser consumes a [`Tokenizer`](crate::tokenizer::Tokenizer) and
//! produces a [`Message`]:
//!
//! 1. **Start line**: method via a sorted lookup table (UPnP's extended
//!    verbs SUBSCRIBE/UNSUBSCRIBE/NOTIFY/M-POST/M-SEARCH included), or a
//!    response status line.
//! 2. **Headers**: each name is looked up in a sorted case-insensitive
//!    table selecting a typed value parser: comma lists, quality-valued
//!    media ranges, numbers, HTTP-dates, host:port pairs, URIs. Unknown
//!    names are kept verbatim; a value that fails its grammar drops only
//!    that header, never the message.
//! 3. **Entity**: framed by `Content-Length`, chunked transfer-encoding
//!    (trailers merged back into the header sequence), or connection close
//!    for responses. The framing decision follows a strict priority order;
//!    see [`body::request_body_kind`].
//!
//! ## Error posture
//!
//! Structural damage (broken start line, header line without a colon, bad
//! chunk framing) fails the message with a [`FrameError`](crate::error::FrameError)
//! carrying the status owed to the peer. Value-level damage is lossy, not
//! fatal.

pub mod body;
pub mod headers;
pub mod message;

mod core;

pub use self::core::{is_request, parse_request, parse_response};
pub use body::BodyKind;
pub use headers::{HeaderId, HeaderValue, HttpDate, HttpHeader, MediaRange, Quality};
pub use message::{Entity, HeaderSeq, Message, Method, RequestLine, ResponseLine, StartLine};
