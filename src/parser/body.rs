use crate::error::{Error, FrameError};
use crate::parser::headers::HeaderId;
use crate::parser::message::{Entity, Message, Method};
use crate::tokenizer::Tokenizer;
use std::io::Read;
use tracing::trace;

/// Upper bound on a chunk-size line; a peer exceeding it is framing garbage.
const MAX_CHUNK_LINE: usize = 4096;

/// Ceiling on an in-memory entity. Declared lengths and accumulated chunk
/// totals beyond this are rejected before any allocation happens, so a
/// wire-supplied size can never drive the allocator.
pub const MAX_ENTITY_BYTES: usize = 4 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Append up to `want` raw bytes onto `buf`, growing it only as bytes
/// actually arrive. Returns how many bytes were appended.
fn read_raw_into<R: Read>(
    tok: &mut Tokenizer<R>,
    buf: &mut Vec<u8>,
    want: usize,
) -> Result<usize, Error> {
    let mut filled = 0;
    let mut chunk = [0u8; READ_CHUNK];
    while filled < want {
        let step = (want - filled).min(READ_CHUNK);
        let n = tok.read_raw(&mut chunk[..step])?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        filled += n;
    }
    Ok(filled)
}

/// How the entity is delimited on the wire, decided once headers complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    None,
    ContentLength(usize),
    Chunked,
    /// Responses only: read until the peer closes.
    CloseDelimited,
}

/// Framing decision for a request, in priority order: bodiless methods,
/// `Transfer-Encoding`, `Content-Length`, else length-required.
pub fn request_body_kind(msg: &Message) -> Result<BodyKind, FrameError> {
    let method = match msg.request_line() {
        Some(line) => line.method,
        None => return Err(FrameError::BadStartLine),
    };
    if !method.carries_body() {
        return Ok(BodyKind::None);
    }
    if msg.header(HeaderId::TransferEncoding).is_some() {
        return Ok(BodyKind::Chunked);
    }
    if let Some(len) = msg.header_number(HeaderId::ContentLength) {
        // A length that does not even fit a usize is over any cap.
        let len = usize::try_from(len).map_err(|_| FrameError::EntityTooLarge)?;
        return Ok(BodyKind::ContentLength(len));
    }
    Err(FrameError::LengthRequired)
}

/// Framing decision for a response; `request_method` is the method of the
/// request this answers (HEAD responses never carry a body).
pub fn response_body_kind(msg: &Message, request_method: Option<Method>) -> BodyKind {
    let status = msg.response_line().map(|l| l.status).unwrap_or(0);
    if (100..200).contains(&status) || status == 204 || status == 304 {
        return BodyKind::None;
    }
    if request_method == Some(Method::Head) {
        return BodyKind::None;
    }
    if msg.header(HeaderId::TransferEncoding).is_some() {
        return BodyKind::Chunked;
    }
    if let Some(len) = msg.header_number(HeaderId::ContentLength) {
        // Saturate; read_body rejects anything over the cap anyway.
        return BodyKind::ContentLength(usize::try_from(len).unwrap_or(usize::MAX));
    }
    BodyKind::CloseDelimited
}

/// Read the entity into the message according to the framing decision.
pub fn read_body<R: Read>(
    tok: &mut Tokenizer<R>,
    kind: BodyKind,
    msg: &mut Message,
) -> Result<(), Error> {
    match kind {
        BodyKind::None => {
            msg.entity = Entity::Empty;
            Ok(())
        }
        BodyKind::ContentLength(len) => {
            if len > MAX_ENTITY_BYTES {
                trace!(declared = len, "declared entity over the in-memory cap");
                return Err(FrameError::EntityTooLarge.into());
            }
            let mut buf = Vec::new();
            let filled = read_raw_into(tok, &mut buf, len)?;
            if filled < len {
                trace!(expected = len, got = filled, "entity ended early");
                return Err(FrameError::IncompleteEntity.into());
            }
            msg.entity = Entity::InMemory(buf);
            Ok(())
        }
        BodyKind::Chunked => read_chunked(tok, msg),
        BodyKind::CloseDelimited => {
            let mut body = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = tok.read_raw(&mut chunk)?;
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
                if body.len() > MAX_ENTITY_BYTES {
                    return Err(FrameError::EntityTooLarge.into());
                }
            }
            msg.entity = if body.is_empty() {
                Entity::Empty
            } else {
                Entity::InMemory(body)
            };
            Ok(())
        }
    }
}

/// One raw line up to and excluding the terminator; lone LF accepted.
fn read_raw_line<R: Read>(tok: &mut Tokenizer<R>) -> Result<Vec<u8>, Error> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if tok.read_raw(&mut byte)? == 0 {
            return Err(Error::ConnectionClosed);
        }
        match byte[0] {
            b'\n' => {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(line);
            }
            b => line.push(b),
        }
        if line.len() > MAX_CHUNK_LINE {
            return Err(FrameError::BadChunk.into());
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, FrameError> {
    // Extensions (`;name=value`) are scanned and discarded; control bytes
    // anywhere in the line make the chunk malformed.
    if line.iter().any(|&b| b < 0x20 || b == 0x7f) {
        return Err(FrameError::BadChunk);
    }
    let text = std::str::from_utf8(line).map_err(|_| FrameError::BadChunk)?;
    let size_part = text.split(';').next().unwrap_or("").trim();
    if size_part.is_empty() {
        return Err(FrameError::BadChunk);
    }
    usize::from_str_radix(size_part, 16).map_err(|_| FrameError::BadChunk)
}

/// Chunked-transfer decoder: hex size line, data, CRLF, repeated until the
/// zero chunk; trailing headers are merged into the message.
fn read_chunked<R: Read>(tok: &mut Tokenizer<R>, msg: &mut Message) -> Result<(), Error> {
    let mut body = Vec::new();
    loop {
        let size_line = read_raw_line(tok)?;
        let size = parse_chunk_size(&size_line)?;
        if size == 0 {
            break;
        }
        if size > MAX_ENTITY_BYTES.saturating_sub(body.len()) {
            trace!(chunk = size, so_far = body.len(), "chunked entity over the cap");
            return Err(FrameError::EntityTooLarge.into());
        }
        let filled = read_raw_into(tok, &mut body, size)?;
        if filled < size {
            return Err(FrameError::IncompleteEntity.into());
        }
        // chunk data is followed by its own CRLF
        let terminator = read_raw_line(tok)?;
        if !terminator.is_empty() {
            return Err(FrameError::BadChunk.into());
        }
    }
    // optional trailers, terminated by a blank line
    super::core::parse_header_lines(tok, &mut msg.headers)?;
    msg.entity = if body.is_empty() {
        Entity::Empty
    } else {
        Entity::InMemory(body)
    };
    Ok(())
}
