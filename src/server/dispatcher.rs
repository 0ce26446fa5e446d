use crate::parser::{Message, Method};
use std::net::TcpStream;
use std::sync::Arc;

/// Protocol-layer callback invoked with one parsed message and the raw
/// connection.
///
/// The handler owns the response: it must write a complete reply (or close
/// without one, which the client observes as a reset) and the socket is
/// closed when it returns. The server never touches the socket after
/// dispatch.
pub trait Handler: Send + Sync {
    fn handle(&self, message: Message, socket: TcpStream);
}

impl<F> Handler for F
where
    F: Fn(Message, TcpStream) + Send + Sync,
{
    fn handle(&self, message: Message, socket: TcpStream) {
        self(message, socket)
    }
}

/// Verb category a parsed request dispatches under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Plain HTTP: GET, HEAD
    HttpGet,
    /// Action invocation: POST, M-POST
    Soap,
    /// Eventing: NOTIFY, SUBSCRIBE, UNSUBSCRIBE
    Gena,
}

impl HandlerKind {
    /// Category for a recognized method; `None` for methods the transport
    /// does not dispatch (M-SEARCH rides multicast discovery, not TCP).
    pub fn classify(method: Method) -> Option<Self> {
        match method {
            Method::Get | Method::Head => Some(HandlerKind::HttpGet),
            Method::Post | Method::MPost => Some(HandlerKind::Soap),
            Method::Notify | Method::Subscribe | Method::Unsubscribe => Some(HandlerKind::Gena),
            Method::MSearch => None,
        }
    }
}

/// Per-instance handler registration, one slot per verb category.
///
/// Passed to [`MiniServer::new`](crate::server::MiniServer::new) instead of
/// process-wide callback globals, so independent server instances can carry
/// independent protocol stacks (and tests can run servers side by side).
#[derive(Default, Clone)]
pub struct Dispatcher {
    get: Option<Arc<dyn Handler>>,
    soap: Option<Arc<dyn Handler>>,
    gena: Option<Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_get(&mut self, handler: Arc<dyn Handler>) {
        self.get = Some(handler);
    }

    pub fn register_soap(&mut self, handler: Arc<dyn Handler>) {
        self.soap = Some(handler);
    }

    pub fn register_gena(&mut self, handler: Arc<dyn Handler>) {
        self.gena = Some(handler);
    }

    /// Registered handler for a method's category, if any.
    pub fn handler_for(&self, method: Method) -> Option<Arc<dyn Handler>> {
        let slot = match HandlerKind::classify(method)? {
            HandlerKind::HttpGet => &self.get,
            HandlerKind::Soap => &self.soap,
            HandlerKind::Gena => &self.gena,
        };
        slot.as_ref().map(Arc::clone)
    }
}
