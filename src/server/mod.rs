//! # Server Module
//!
//! The MiniServer: accept loop, per-connection parse jobs, and verb-category
//! dispatch.
//!
//! ## Overview
//!
//! One [`MiniServer`] owns one listening socket. Its state machine is
//! `Idle -> Running -> Stopping -> Idle`:
//!
//! - `start()` binds with SO_REUSEADDR (port 0 lets the OS choose), schedules
//!   the accept loop onto the shared [`ThreadPool`](crate::thread_pool::ThreadPool),
//!   and blocks until the loop reports Running.
//! - Every accepted connection becomes its own pool job: parse exactly one
//!   message, classify the method into HTTP-GET / SOAP / GENA, and invoke
//!   the registered [`Dispatcher`] handler with the message and the raw
//!   socket. The handler owns writing the response.
//! - A parse failure that still owes the peer a response is answered with a
//!   bare status line (400/405/411/500/501); a timeout or disconnect closes
//!   silently.
//! - `stop()` sets the stop flag and interrupts the blocking `accept()` with
//!   a loopback wake connection until the loop reaches Idle. In-flight
//!   connection handlers keep running.
//!
//! ## Instances
//!
//! Handler registration lives on the per-server [`Dispatcher`] rather than
//! process-wide globals, so tests and multi-homed devices can run several
//! servers side by side.

mod core;
pub mod dispatcher;
pub mod response;

pub use self::core::MiniServer;
pub use dispatcher::{Dispatcher, Handler, HandlerKind};
pub use response::send_status_line;
