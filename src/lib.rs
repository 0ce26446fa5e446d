//! # upnpkit
//!
//! **upnpkit** is the transport and protocol-framing core of a UPnP
//! device/control-point stack: it accepts TCP connections, frames raw bytes
//! into HTTP-grammar messages (UPnP's extended verbs
//! SUBSCRIBE/UNSUBSCRIBE/NOTIFY/M-POST included), classifies each message,
//! and hands it to one of a small set of registered protocol handlers, all
//! while bounding concurrency through a reusable worker-thread pool and
//! scheduling deferred work through a sorted timer queue.
//!
//! ## Architecture
//!
//! The library is organized into several key modules, leaves first:
//!
//! - **[`thread_pool`]** - bounded OS-thread worker pool with idle-linger
//!   reaping; everything else schedules onto it
//! - **[`timer`]** - sorted deferred-event dispatch (advertisement renewal,
//!   subscription expiry) riding the pool
//! - **[`tokenizer`]** - byte-level HTTP lexer with one-token pushback and
//!   raw-read drainage for bodies
//! - **[`parser`]** - message assembly: start lines, typed headers
//!   (quality-sorted media ranges, HTTP-dates, host:port, GENA vocabulary),
//!   and body framing (content-length / chunked / close-delimited)
//! - **[`server`]** - the MiniServer accept-loop state machine and the
//!   per-instance verb-category [`Dispatcher`](server::Dispatcher)
//! - **[`config`]** - environment-driven runtime configuration
//! - **[`error`]** - the five-class error taxonomy and status mapping
//!
//! ## Request Flow
//!
//! 1. `MiniServer` accepts a connection and schedules a handler job
//! 2. The job's `Tokenizer`/parser frame exactly one message
//! 3. The method classifies into HTTP-GET, SOAP (POST/M-POST) or GENA
//!    (NOTIFY/SUBSCRIBE/UNSUBSCRIBE)
//! 4. The registered handler writes the response and the socket closes
//!
//! Independently, any subsystem schedules deferred callbacks through the
//! [`timer::TimerThread`]; fired callbacks execute on the same pool.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use upnpkit::config::ServerConfig;
//! use upnpkit::server::{Dispatcher, MiniServer};
//! use upnpkit::thread_pool::ThreadPool;
//!
//! let pool = Arc::new(ThreadPool::from_env());
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register_get(Arc::new(
//!     |_msg: upnpkit::parser::Message, _socket: std::net::TcpStream| {
//!         // serve the device description
//!     },
//! ));
//! let server = MiniServer::new(ServerConfig::from_env(), pool, dispatcher);
//! let port = server.start().unwrap();
//! println!("listening on {port}");
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod server;
pub mod thread_pool;
pub mod timer;
pub mod tokenizer;

pub use config::ServerConfig;
pub use error::{Error, FrameError};
pub use parser::{parse_request, parse_response, Entity, Message, Method};
pub use server::{Dispatcher, Handler, MiniServer};
pub use thread_pool::{ThreadPool, ThreadPoolConfig};
pub use timer::{EventId, TimerThread};
pub use tokenizer::{Token, TokenKind, Tokenizer};
