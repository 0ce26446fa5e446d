use clap::Parser as ClapParser;
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use upnpkit::config::ServerConfig;
use upnpkit::parser::{Entity, StartLine};
use upnpkit::server::{Dispatcher, MiniServer};
use upnpkit::thread_pool::ThreadPool;

/// Demo transport endpoint: echoes request lines back over the three
/// protocol slots so the pipeline can be poked with curl.
#[derive(ClapParser, Debug)]
#[command(name = "upnpkit", version, about)]
struct Cli {
    /// Port to listen on (0 = OS-assigned)
    #[arg(short, long, env = "UPNP_LISTEN_PORT", default_value_t = 0)]
    port: u16,
}

fn reply(mut socket: std::net::TcpStream, label: &str, detail: String) {
    let body = format!("{label}: {detail}\n");
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    let _ = socket.write_all(head.as_bytes());
    let _ = socket.write_all(body.as_bytes());
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env();
    config.listen_port = cli.port;

    let pool = Arc::new(ThreadPool::new(config.pool));
    let mut dispatcher = Dispatcher::new();
    dispatcher.register_get(Arc::new(|msg: upnpkit::Message, socket: std::net::TcpStream| {
        if let StartLine::Request(line) = &msg.start_line {
            reply(socket, "GET", line.uri.clone());
        }
    }));
    dispatcher.register_soap(Arc::new(|msg: upnpkit::Message, socket: std::net::TcpStream| {
        let body_len = match &msg.entity {
            Entity::InMemory(b) => b.len(),
            _ => 0,
        };
        reply(socket, "SOAP", format!("{body_len} body bytes"));
    }));
    dispatcher.register_gena(Arc::new(|msg: upnpkit::Message, socket: std::net::TcpStream| {
        if let StartLine::Request(line) = &msg.start_line {
            reply(socket, "GENA", line.method.to_string());
        }
    }));

    let server = MiniServer::new(config, Arc::clone(&pool), dispatcher);
    let port = server.start()?;
    info!(port, "upnpkit demo endpoint up");

    wait_for_shutdown();

    server.stop()?;
    pool.wait_for_zero_jobs();
    pool.shutdown();
    Ok(())
}

#[cfg(unix)]
fn wait_for_shutdown() {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "could not install signal handler");
            return;
        }
    };
    if let Some(signal) = signals.forever().next() {
        info!(signal, "shutdown signal received");
    }
}

#[cfg(not(unix))]
fn wait_for_shutdown() {
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
}
