use std::io::Write;
use std::net::TcpStream;
use tracing::debug;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Best-effort bare status reply: `HTTP/1.1 <code> <reason>\r\n\r\n`.
///
/// Used when a response is still owed after a framing failure or a pool
/// refusal; write errors are logged, never propagated. The socket is about
/// to close either way.
pub fn send_status_line(stream: &mut TcpStream, status: u16) {
    let wire = format!("HTTP/1.1 {} {}\r\n\r\n", status, status_reason(status));
    if let Err(e) = stream.write_all(wire.as_bytes()) {
        debug!(status, error = %e, "failed to write status reply");
    }
    let _ = stream.flush();
}
