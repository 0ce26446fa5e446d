use crate::parser::headers::{HeaderId, HeaderValue, HttpHeader};
use smallvec::SmallVec;
use std::fmt;
use std::path::PathBuf;

/// Methods recognized on the wire, UPnP's extended verbs included.
///
/// Anything else is answered `501 Not Implemented` before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    MPost,
    MSearch,
    Notify,
    Post,
    Subscribe,
    Unsubscribe,
}

/// Sorted by wire name; `Method::parse` binary-searches this table.
const METHOD_TABLE: &[(&str, Method)] = &[
    ("GET", Method::Get),
    ("HEAD", Method::Head),
    ("M-POST", Method::MPost),
    ("M-SEARCH", Method::MSearch),
    ("NOTIFY", Method::Notify),
    ("POST", Method::Post),
    ("SUBSCRIBE", Method::Subscribe),
    ("UNSUBSCRIBE", Method::Unsubscribe),
];

impl Method {
    /// Look up a method token (case-sensitive, as on the wire).
    pub fn parse(s: &str) -> Option<Self> {
        METHOD_TABLE
            .binary_search_by(|(name, _)| (*name).cmp(s))
            .ok()
            .map(|i| METHOD_TABLE[i].1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::MPost => "M-POST",
            Method::MSearch => "M-SEARCH",
            Method::Notify => "NOTIFY",
            Method::Post => "POST",
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
        }
    }

    /// True for methods whose requests may carry an entity.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::MPost | Method::Notify)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First line of a request: `METHOD SP (uri|"*") SP HTTP/major.minor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    /// Request target, or `"*"` for server-wide options
    pub uri: String,
    pub http_major: u8,
    pub http_minor: u8,
}

/// First line of a response: `HTTP/major.minor SP status SP reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub http_major: u8,
    pub http_minor: u8,
    pub status: u16,
    pub reason: String,
}

/// Exactly one of request/response line is populated per [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request(RequestLine),
    Response(ResponseLine),
}

/// Message body, tagged by where the bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Empty,
    InMemory(Vec<u8>),
    /// Spooled to disk by a protocol layer (large SOAP responses, GET bodies)
    OnDisk(PathBuf),
}

impl Entity {
    pub fn len(&self) -> usize {
        match self {
            Entity::Empty => 0,
            Entity::InMemory(b) => b.len(),
            Entity::OnDisk(path) => std::fs::metadata(path).map(|m| m.len() as usize).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-memory bytes, when the body was buffered.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Entity::InMemory(b) => Some(b),
            _ => None,
        }
    }
}

/// Ordered header sequence; small messages stay off the heap.
pub type HeaderSeq = SmallVec<[HttpHeader; 16]>;

/// One parsed HTTP-grammar message, request or response.
///
/// Headers preserve insertion order and duplicates are kept, not merged;
/// protocol layers decide how to combine repeated fields.
#[derive(Debug, Clone)]
pub struct Message {
    pub start_line: StartLine,
    pub headers: HeaderSeq,
    pub entity: Entity,
}

impl Message {
    pub fn request(line: RequestLine) -> Self {
        Self {
            start_line: StartLine::Request(line),
            headers: SmallVec::new(),
            entity: Entity::Empty,
        }
    }

    pub fn response(line: ResponseLine) -> Self {
        Self {
            start_line: StartLine::Response(line),
            headers: SmallVec::new(),
            entity: Entity::Empty,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request(_))
    }

    pub fn request_line(&self) -> Option<&RequestLine> {
        match &self.start_line {
            StartLine::Request(l) => Some(l),
            StartLine::Response(_) => None,
        }
    }

    pub fn response_line(&self) -> Option<&ResponseLine> {
        match &self.start_line {
            StartLine::Request(_) => None,
            StartLine::Response(l) => Some(l),
        }
    }

    /// First header with the given id, in insertion order.
    pub fn header(&self, id: HeaderId) -> Option<&HttpHeader> {
        self.headers.iter().find(|h| h.id == id)
    }

    /// All headers with the given id, in insertion order.
    pub fn headers_named(&self, id: HeaderId) -> impl Iterator<Item = &HttpHeader> {
        self.headers.iter().filter(move |h| h.id == id)
    }

    /// Numeric value of the first matching header, when typed as a number.
    pub fn header_number(&self, id: HeaderId) -> Option<u64> {
        match self.header(id).map(|h| &h.value) {
            Some(HeaderValue::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_table_is_sorted() {
        let mut names: Vec<&str> = METHOD_TABLE.iter().map(|(n, _)| *n).collect();
        let sorted = {
            let mut s = names.clone();
            s.sort_unstable();
            s
        };
        names.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_method_parse_round_trip() {
        for (name, method) in METHOD_TABLE {
            assert_eq!(Method::parse(name), Some(*method));
            assert_eq!(method.as_str(), *name);
        }
        assert_eq!(Method::parse("FOOBAR"), None);
        // case-sensitive, as on the wire
        assert_eq!(Method::parse("get"), None);
    }

    #[test]
    fn test_body_bearing_methods() {
        assert!(Method::Post.carries_body());
        assert!(Method::MPost.carries_body());
        assert!(Method::Notify.carries_body());
        assert!(!Method::Get.carries_body());
        assert!(!Method::Subscribe.carries_body());
        assert!(!Method::MSearch.carries_body());
    }

    #[test]
    fn test_entity_len() {
        assert_eq!(Entity::Empty.len(), 0);
        assert!(Entity::Empty.is_empty());
        let e = Entity::InMemory(b"hello".to_vec());
        assert_eq!(e.len(), 5);
        assert_eq!(e.as_bytes(), Some(&b"hello"[..]));
    }
}
