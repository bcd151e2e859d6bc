// ────────────────────────────────
// src/server/listener.rs
// TCP bind for the health endpoint. Address reuse lets a restarted
// process take the port back while old connections sit in TIME_WAIT.
// ────────────────────────────────
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket};

const LISTEN_BACKLOG: u32 = 1024;

pub async fn bind_tcp(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}
