use crate::config::ServerConfig;
use crate::error::Error;
use crate::parser::parse_request;
use crate::server::dispatcher::Dispatcher;
use crate::server::response::send_status_line;
use crate::thread_pool::ThreadPool;
use crate::tokenizer::Tokenizer;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of one server instance: Idle, Running, Stopping, back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Idle,
    /// `start()` issued, accept loop not yet confirmed on a worker
    Starting,
    Running(u16),
    Stopping(u16),
}

struct ServerShared {
    state: Mutex<ServerState>,
    changed: Condvar,
    stop_requested: AtomicBool,
}

/// Accept-loop/dispatch engine for one listening socket.
///
/// `start()` binds and listens, schedules the accept loop as a pool job, and
/// blocks until the loop reports Running. Each accepted connection becomes
/// its own pool job that parses one message and hands it to the registered
/// [`Dispatcher`] slot for its verb category.
pub struct MiniServer {
    config: ServerConfig,
    pool: Arc<ThreadPool>,
    dispatcher: Arc<Dispatcher>,
    shared: Arc<ServerShared>,
}

impl MiniServer {
    pub fn new(config: ServerConfig, pool: Arc<ThreadPool>, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            pool,
            dispatcher: Arc::new(dispatcher),
            shared: Arc::new(ServerShared {
                state: Mutex::new(ServerState::Idle),
                changed: Condvar::new(),
                stop_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Bind, listen, and begin accepting; returns the bound port.
    ///
    /// With `listen_port == 0` the OS assigns one. Blocks until the accept
    /// loop is confirmed running on a pool worker.
    pub fn start(&self) -> Result<u16, Error> {
        {
            let mut st = self.shared.state.lock().unwrap();
            if *st != ServerState::Idle {
                return Err(Error::AlreadyRunning);
            }
            *st = ServerState::Starting;
        }
        match self.start_inner() {
            Ok(port) => Ok(port),
            Err(e) => {
                let mut st = self.shared.state.lock().unwrap();
                *st = ServerState::Idle;
                self.shared.changed.notify_all();
                Err(e)
            }
        }
    }

    fn start_inner(&self) -> Result<u16, Error> {
        let listener = build_listener(self.config.listen_port)?;
        let port = listener.local_addr().map_err(Error::Socket)?.port();
        self.shared.stop_requested.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let dispatcher = Arc::clone(&self.dispatcher);
        let pool = Arc::clone(&self.pool);
        let read_timeout = self.config.read_timeout;
        self.pool.schedule(move || {
            accept_loop(listener, port, shared, pool, dispatcher, read_timeout)
        })?;

        let mut st = self.shared.state.lock().unwrap();
        while *st == ServerState::Starting {
            st = self.shared.changed.wait(st).unwrap();
        }
        match *st {
            ServerState::Running(p) => Ok(p),
            _ => Err(Error::NotRunning),
        }
    }

    /// Bound port while running.
    pub fn port(&self) -> Option<u16> {
        match *self.shared.state.lock().unwrap() {
            ServerState::Running(p) | ServerState::Stopping(p) => Some(p),
            _ => None,
        }
    }

    /// Stop accepting and wait for the accept loop to reach Idle.
    ///
    /// The blocking `accept()` is interrupted by a loopback wake connection,
    /// retried until the loop observes the stop flag. In-flight connection
    /// handlers are not cancelled; callers needing a hard stop follow up
    /// with [`ThreadPool::wait_for_zero_jobs`].
    pub fn stop(&self) -> Result<(), Error> {
        let port;
        {
            let mut st = self.shared.state.lock().unwrap();
            loop {
                match *st {
                    ServerState::Idle => {
                        debug!("stop on a server that is not running");
                        return Err(Error::NotRunning);
                    }
                    ServerState::Starting => {
                        st = self.shared.changed.wait(st).unwrap();
                    }
                    ServerState::Running(p) => {
                        *st = ServerState::Stopping(p);
                        port = p;
                        break;
                    }
                    ServerState::Stopping(p) => {
                        port = p;
                        break;
                    }
                }
            }
        }
        self.shared.stop_requested.store(true, Ordering::SeqCst);

        let wake_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let mut st = self.shared.state.lock().unwrap();
        while *st != ServerState::Idle {
            drop(st);
            // poke the blocking accept so it re-checks the stop flag
            let _ = TcpStream::connect_timeout(&wake_addr, Duration::from_millis(100));
            st = self.shared.state.lock().unwrap();
            if *st == ServerState::Idle {
                break;
            }
            let (guard, _) = self
                .shared
                .changed
                .wait_timeout(st, Duration::from_millis(50))
                .unwrap();
            st = guard;
        }
        Ok(())
    }
}

/// SO_REUSEADDR listener on the wildcard v4 address.
fn build_listener(port: u16) -> Result<TcpListener, Error> {
    let socket =
        Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(Error::Socket)?;
    socket.set_reuse_address(true).map_err(Error::Socket)?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into()).map_err(Error::Bind)?;
    socket.listen(128).map_err(Error::Listen)?;
    Ok(socket.into())
}

fn accept_loop(
    listener: TcpListener,
    port: u16,
    shared: Arc<ServerShared>,
    pool: Arc<ThreadPool>,
    dispatcher: Arc<Dispatcher>,
    read_timeout: Duration,
) {
    {
        let mut st = shared.state.lock().unwrap();
        *st = ServerState::Running(port);
        shared.changed.notify_all();
    }
    info!(port, "accepting connections");

    loop {
        if shared.stop_requested.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                if shared.stop_requested.load(Ordering::SeqCst) {
                    // the wake connection from stop(), or a late arrival
                    break;
                }
                debug!(peer = %peer, "connection accepted");
                if let Err(e) = stream.set_read_timeout(Some(read_timeout)) {
                    warn!(peer = %peer, error = %e, "could not arm read timeout");
                }
                // a second handle so a pool refusal can still answer 500
                let reject_handle = stream.try_clone();
                let job_dispatcher = Arc::clone(&dispatcher);
                let scheduled =
                    pool.schedule(move || handle_connection(stream, job_dispatcher));
                if scheduled.is_err() {
                    warn!(peer = %peer, "pool refused connection job, answering 500");
                    if let Ok(mut s) = reject_handle {
                        send_status_line(&mut s, 500);
                    }
                }
            }
            Err(e) => {
                if shared.stop_requested.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "accept failed");
            }
        }
    }

    let mut st = shared.state.lock().unwrap();
    *st = ServerState::Idle;
    shared.changed.notify_all();
    drop(st);
    info!(port, "accept loop stopped");
}

/// One connection, one message, one dispatch.
///
/// The socket and the parsed message are owned by this job alone; framing
/// and timeout failures never escape it.
fn handle_connection(mut stream: TcpStream, dispatcher: Arc<Dispatcher>) {
    let reader = match stream.try_clone() {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "could not clone connection for reading");
            return;
        }
    };
    let mut tokenizer = Tokenizer::new(reader);
    match parse_request(&mut tokenizer) {
        Ok(msg) => {
            let method = match msg.request_line() {
                Some(line) => line.method,
                None => return,
            };
            match dispatcher.handler_for(method) {
                Some(handler) => {
                    debug!(method = %method, "dispatching request");
                    handler.handle(msg, stream);
                }
                None => {
                    debug!(method = %method, "no handler registered, answering 405");
                    send_status_line(&mut stream, 405);
                }
            }
        }
        Err(e) => match e.response_owed() {
            Some(status) => {
                debug!(error = %e, status, "framing error, answering status");
                send_status_line(&mut stream, status);
            }
            None => {
                // timeout or disconnect: close silently, nothing is owed
                debug!(error = %e, "closing connection without a response");
            }
        },
    }
}
