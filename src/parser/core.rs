use crate::error::{Error, FrameError};
use crate::parser::body::{read_body, request_body_kind, response_body_kind};
use crate::parser::headers::build_header;
use crate::parser::message::{
    HeaderSeq, Message, Method, RequestLine, ResponseLine, StartLine,
};
use crate::tokenizer::{TokenKind, Tokenizer};
use std::io::Read;
use tracing::{debug, trace};

fn parse_version(text: &str) -> Result<(u8, u8), FrameError> {
    let rest = text.strip_prefix("HTTP/").ok_or(FrameError::BadStartLine)?;
    let (major, minor) = rest.split_once('.').ok_or(FrameError::BadStartLine)?;
    let major = major.parse().map_err(|_| FrameError::BadStartLine)?;
    let minor = minor.parse().map_err(|_| FrameError::BadStartLine)?;
    Ok((major, minor))
}

/// Accumulate raw token bytes up to (and consuming) the next whitespace run.
fn collect_until_ws<R: Read>(tok: &mut Tokenizer<R>) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    loop {
        let t = tok.next_token()?;
        match t.kind {
            TokenKind::Whitespace => {
                if out.is_empty() {
                    continue;
                }
                return Ok(out);
            }
            TokenKind::Crlf | TokenKind::Eof => return Err(FrameError::BadStartLine.into()),
            _ => out.extend_from_slice(&t.text),
        }
    }
}

/// Accumulate raw token bytes up to (and consuming) the line terminator.
fn collect_until_crlf<R: Read>(tok: &mut Tokenizer<R>) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    loop {
        let t = tok.next_token()?;
        match t.kind {
            TokenKind::Crlf => return Ok(out),
            TokenKind::Eof => return Err(Error::ConnectionClosed),
            _ => out.extend_from_slice(&t.text),
        }
    }
}

fn trim_bytes(b: &[u8]) -> &[u8] {
    let start = b
        .iter()
        .position(|&c| c != b' ' && c != b'\t')
        .unwrap_or(b.len());
    let end = b
        .iter()
        .rposition(|&c| c != b' ' && c != b'\t')
        .map_or(start, |i| i + 1);
    &b[start..end]
}

/// Bytes to text for display-bearing fields. Valid UTF-8 passes through
/// unchanged; anything else is replaced rather than rejected, since header
/// values in the field are not reliably any one encoding.
fn bytes_to_text(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}

/// Parse header lines until a blank line, appending to `headers`.
///
/// Folded continuation lines (leading LWS) extend the previous value. A value
/// that fails its typed grammar drops only that header; structural damage
/// (a line without a colon) fails the whole message.
pub(crate) fn parse_header_lines<R: Read>(
    tok: &mut Tokenizer<R>,
    headers: &mut HeaderSeq,
) -> Result<(), Error> {
    let mut pending: Option<(String, String)> = None;
    loop {
        let first = tok.next_token()?;
        match first.kind {
            TokenKind::Crlf => break,
            TokenKind::Eof => return Err(Error::ConnectionClosed),
            TokenKind::Whitespace => {
                // continuation of the previous header's value
                let (_, value) = pending.as_mut().ok_or(FrameError::BadHeader)?;
                let rest = collect_until_crlf(tok)?;
                value.push(' ');
                value.push_str(&bytes_to_text(trim_bytes(&rest)));
                continue;
            }
            TokenKind::Identifier => {}
            _ => return Err(FrameError::BadHeader.into()),
        }
        if let Some((name, value)) = pending.take() {
            if let Some(h) = build_header(&name, &value) {
                headers.push(h);
            }
        }
        // Identifier tokens are ASCII by construction.
        let name = bytes_to_text(&first.text);
        // name *LWS ":" *LWS value
        let mut sep = tok.next_token()?;
        if sep.kind == TokenKind::Whitespace {
            sep = tok.next_token()?;
        }
        if sep.literal() != Some(b':') {
            debug!(line = tok.line(), header = %name, "header line missing colon");
            return Err(FrameError::BadHeader.into());
        }
        let raw = collect_until_crlf(tok)?;
        let value = bytes_to_text(trim_bytes(&raw));
        pending = Some((name, value));
    }
    if let Some((name, value)) = pending.take() {
        if let Some(h) = build_header(&name, &value) {
            headers.push(h);
        }
    }
    Ok(())
}

/// Parse one request off the wire: start line, headers, framed entity.
pub fn parse_request<R: Read>(tok: &mut Tokenizer<R>) -> Result<Message, Error> {
    // tolerate blank lines before the request line
    let method_tok = loop {
        let t = tok.next_token()?;
        match t.kind {
            TokenKind::Crlf => continue,
            TokenKind::Eof => return Err(Error::ConnectionClosed),
            TokenKind::Identifier => break t,
            _ => return Err(FrameError::BadStartLine.into()),
        }
    };
    let method_text = bytes_to_text(&method_tok.text);
    let method = Method::parse(&method_text)
        .ok_or_else(|| FrameError::UnknownMethod(method_text.clone()))?;

    let ws = tok.next_token()?;
    if ws.kind != TokenKind::Whitespace {
        return Err(FrameError::BadStartLine.into());
    }
    let uri = bytes_to_text(&collect_until_ws(tok)?);
    let version = collect_until_crlf(tok)?;
    let (http_major, http_minor) = parse_version(bytes_to_text(trim_bytes(&version)).as_str())?;

    let mut msg = Message::request(RequestLine {
        method,
        uri,
        http_major,
        http_minor,
    });
    parse_header_lines(tok, &mut msg.headers)?;
    trace!(
        method = %method,
        headers = msg.headers.len(),
        line = tok.line(),
        "request head parsed"
    );

    let kind = request_body_kind(&msg)?;
    read_body(tok, kind, &mut msg)?;
    Ok(msg)
}

/// Parse one response off the wire; `request_method` is the method of the
/// request being answered and drives HEAD/no-body framing.
pub fn parse_response<R: Read>(
    tok: &mut Tokenizer<R>,
    request_method: Option<Method>,
) -> Result<Message, Error> {
    let version = collect_until_ws(tok)?;
    let (http_major, http_minor) = parse_version(bytes_to_text(trim_bytes(&version)).as_str())?;

    let status_tok = tok.next_token()?;
    if status_tok.kind != TokenKind::Identifier {
        return Err(FrameError::BadStartLine.into());
    }
    let status: u16 = std::str::from_utf8(&status_tok.text)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(FrameError::BadStartLine)?;
    if !(100..=999).contains(&status) {
        return Err(FrameError::BadStartLine.into());
    }
    let raw_reason = collect_until_crlf(tok)?;
    let reason = bytes_to_text(trim_bytes(&raw_reason));

    let mut msg = Message::response(ResponseLine {
        http_major,
        http_minor,
        status,
        reason,
    });
    parse_header_lines(tok, &mut msg.headers)?;
    trace!(status, headers = msg.headers.len(), "response head parsed");

    let kind = response_body_kind(&msg, request_method);
    read_body(tok, kind, &mut msg)?;
    Ok(msg)
}

/// Convenience check used by the dispatch layer.
pub fn is_request(msg: &Message) -> bool {
    matches!(msg.start_line, StartLine::Request(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::headers::{HeaderId, HeaderValue};
    use crate::parser::message::Entity;
    use std::io::Cursor;

    fn parse_req(wire: &[u8]) -> Result<Message, Error> {
        let mut tok = Tokenizer::new(Cursor::new(wire.to_vec()));
        parse_request(&mut tok)
    }

    #[test]
    fn test_simple_get() {
        let msg = parse_req(b"GET /desc.xml HTTP/1.1\r\nHost: 10.0.0.2:49152\r\n\r\n").unwrap();
        let line = msg.request_line().unwrap();
        assert_eq!(line.method, Method::Get);
        assert_eq!(line.uri, "/desc.xml");
        assert_eq!((line.http_major, line.http_minor), (1, 1));
        assert_eq!(msg.entity, Entity::Empty);
        assert_eq!(
            msg.header(HeaderId::Host).map(|h| &h.value),
            Some(&HeaderValue::HostPort {
                host: "10.0.0.2".into(),
                port: Some(49152)
            })
        );
    }

    #[test]
    fn test_subscribe_with_gena_headers() {
        let wire = b"SUBSCRIBE /event HTTP/1.1\r\n\
            Host: 10.0.0.2\r\n\
            Callback: <http://10.0.0.9:5000/notify>\r\n\
            NT: upnp:event\r\n\
            Timeout: Second-1800\r\n\r\n";
        let msg = parse_req(wire).unwrap();
        assert_eq!(msg.request_line().unwrap().method, Method::Subscribe);
        assert_eq!(
            msg.header(HeaderId::Callback).map(|h| &h.value),
            Some(&HeaderValue::Uri("http://10.0.0.9:5000/notify".into()))
        );
        assert_eq!(
            msg.header(HeaderId::Nt).map(|h| &h.value),
            Some(&HeaderValue::Raw("upnp:event".into()))
        );
    }

    #[test]
    fn test_post_with_content_length_body() {
        let wire = b"POST /ctl HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let msg = parse_req(wire).unwrap();
        assert_eq!(msg.entity.as_bytes(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_post_without_length_is_411() {
        let err = parse_req(b"POST /ctl HTTP/1.1\r\nHost: a\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::LengthRequired)));
        assert_eq!(err.response_owed(), Some(411));
    }

    #[test]
    fn test_unknown_method_classified() {
        let err = parse_req(b"FOOBAR / HTTP/1.1\r\n\r\n").unwrap_err();
        match err {
            Error::Frame(FrameError::UnknownMethod(m)) => assert_eq!(m, "FOOBAR"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_headers_kept_in_order() {
        let wire = b"NOTIFY /evt HTTP/1.1\r\n\
            Pragma: one\r\n\
            Pragma: two\r\n\
            Content-Length: 0\r\n\r\n";
        let msg = parse_req(wire).unwrap();
        let values: Vec<_> = msg.headers_named(HeaderId::Pragma).collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].value, HeaderValue::List(vec!["one".into()]));
        assert_eq!(values[1].value, HeaderValue::List(vec!["two".into()]));
    }

    #[test]
    fn test_folded_header_continuation() {
        let wire = b"GET / HTTP/1.1\r\nUser-Agent: first\r\n second part\r\n\r\n";
        let msg = parse_req(wire).unwrap();
        assert_eq!(
            msg.header(HeaderId::UserAgent).map(|h| &h.value),
            Some(&HeaderValue::Raw("first second part".into()))
        );
    }

    #[test]
    fn test_bad_value_skipped_not_fatal() {
        let wire = b"GET / HTTP/1.1\r\n\
            Date: not a date\r\n\
            Host: ok.example\r\n\r\n";
        let msg = parse_req(wire).unwrap();
        assert!(msg.header(HeaderId::Date).is_none());
        assert!(msg.header(HeaderId::Host).is_some());
    }

    #[test]
    fn test_non_ascii_header_value_preserved() {
        // UTF-8 bytes above 0x7f must arrive in the value exactly as sent.
        let wire = b"GET / HTTP/1.1\r\nServer: caf\xc3\xa9 device\r\n\r\n";
        let msg = parse_req(wire).unwrap();
        assert_eq!(
            msg.header(HeaderId::Server).map(|h| &h.value),
            Some(&HeaderValue::Raw("caf\u{e9} device".into()))
        );
    }

    #[test]
    fn test_chunked_request() {
        let wire = b"POST /ctl HTTP/1.1\r\n\
            Transfer-Encoding: chunked\r\n\r\n\
            4\r\nwiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let msg = parse_req(wire).unwrap();
        assert_eq!(msg.entity.as_bytes(), Some(&b"wikipedia"[..]));
    }

    #[test]
    fn test_response_close_delimited() {
        let wire = b"HTTP/1.1 200 OK\r\nServer: unit\r\n\r\nthe whole rest";
        let mut tok = Tokenizer::new(Cursor::new(wire.to_vec()));
        let msg = parse_response(&mut tok, Some(Method::Get)).unwrap();
        assert_eq!(msg.response_line().unwrap().status, 200);
        assert_eq!(msg.entity.as_bytes(), Some(&b"the whole rest"[..]));
    }

    #[test]
    fn test_head_response_has_no_body() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n";
        let mut tok = Tokenizer::new(Cursor::new(wire.to_vec()));
        let msg = parse_response(&mut tok, Some(Method::Head)).unwrap();
        assert_eq!(msg.entity, Entity::Empty);
    }

    #[test]
    fn test_response_reason_may_be_empty() {
        let wire = b"HTTP/1.1 204\r\n\r\n";
        let mut tok = Tokenizer::new(Cursor::new(wire.to_vec()));
        let msg = parse_response(&mut tok, None).unwrap();
        let line = msg.response_line().unwrap();
        assert_eq!(line.status, 204);
        assert_eq!(line.reason, "");
    }

    #[test]
    fn test_accept_quality_order_via_full_parse() {
        let wire = b"GET / HTTP/1.1\r\n\
            Accept: text/plain;q=0.5, text/html;q=0.9, */*;q=0.1\r\n\r\n";
        let msg = parse_req(wire).unwrap();
        match msg.header(HeaderId::Accept).map(|h| &h.value) {
            Some(HeaderValue::MediaRanges(ranges)) => {
                assert_eq!(ranges[0].subtype, "html");
                assert_eq!(ranges[1].subtype, "plain");
                assert_eq!(ranges[2].media_type, "*");
            }
            other => panic!("unexpected value {other:?}"),
        }
    }
}
