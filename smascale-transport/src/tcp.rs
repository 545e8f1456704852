//! TCP transport

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use smascale_core::{Command, DEFAULT_PORT};

use crate::connection::{Connection, ConnectionState};
use crate::line::{drain_lines, read_line};
use crate::{Link, Transport, error::*};

/// Split `host:port`, accepting bracketed IPv6 hosts
pub fn parse_address(address: &str) -> Result<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidAddress(format!("{}: expected host:port", address)))?;

    if host.is_empty() {
        return Err(Error::InvalidAddress(format!("{}: missing host", address)));
    }

    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(Error::InvalidAddress(format!(
            "{}: IPv6 hosts must be bracketed",
            address
        )));
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| Error::InvalidAddress(format!("{}: invalid port {:?}", address, port)))?;

    Ok((host.to_string(), port))
}

/// Append the SMA default port unless `address` names one
///
/// A bare IPv6 host is bracketed first, so `::1` becomes `[::1]:49155`.
pub fn with_default_port(address: &str) -> String {
    if address.starts_with('[') {
        if address.ends_with(']') {
            format!("{}:{}", address, DEFAULT_PORT)
        } else {
            address.to_string()
        }
    } else {
        match address.matches(':').count() {
            0 => format!("{}:{}", address, DEFAULT_PORT),
            1 => address.to_string(),
            _ => format!("[{}]:{}", address, DEFAULT_PORT),
        }
    }
}

/// Socket link to an SMA ethernet scale
pub struct TcpLink {
    host: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    read_buf: BytesMut,
}

impl TcpLink {
    /// Create new TCP link
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket_addr: None,
            stream: None,
            read_buf: BytesMut::with_capacity(64),
        }
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.host, self.port);

        let addr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.socket_addr = Some(addr);
        Ok(addr)
    }
}

#[async_trait]
impl Link for TcpLink {
    async fn connect(&mut self) -> Result<()> {
        // Never reuse a half-open socket
        self.disconnect().await?;

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = TcpStream::connect(addr).await?;

        // Disable Nagle's algorithm, commands are tiny
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.remote_addr());

            // Release the write side; the read side goes with the drop
            let _ = stream.shutdown().await;
        }

        self.socket_addr = None;
        self.read_buf.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {}", data.len(), hex::encode(data));

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive_line(&mut self) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let line = read_line(stream, &mut self.read_buf).await?;

        trace!("Received {} bytes: {}", line.len(), hex::encode(&line));

        Ok(line)
    }

    async fn drain(&mut self, grace: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let discarded = drain_lines(stream, &mut self.read_buf, grace).await?;

        if discarded > 0 {
            debug!("Discarded {} late line(s) from {}", discarded, self.remote_addr());
        }

        Ok(discarded)
    }

    fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        if self.is_connected() {
            debug!("TCP link to {} dropped while connected", self.remote_addr());
        }
    }
}

/// Reconnecting TCP transport for SMA ethernet scales
///
/// # Examples
///
/// ```no_run
/// use smascale_core::Command;
/// use smascale_transport::{TcpTransport, Transport};
///
/// # async fn run() -> smascale_transport::Result<()> {
/// let transport = TcpTransport::new("192.168.1.50:49155")?;
/// let line = transport.exchange(Command::ReadWeight).await;
/// transport.close().await;
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    connection: Connection<TcpLink>,
}

impl TcpTransport {
    /// Create a transport for `host:port`; nothing is connected yet
    pub fn new(address: &str) -> Result<Self> {
        let (host, port) = parse_address(address)?;
        Ok(Self {
            connection: Connection::new(TcpLink::new(host, port)),
        })
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connection = self.connection.with_connect_timeout(timeout);
        self
    }

    /// Set write/read timeout
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.connection = self.connection.with_io_timeout(timeout);
        self
    }

    /// Set how many consecutive failures close the socket
    pub fn with_max_timeouts(mut self, max_timeouts: u32) -> Self {
        self.connection = self.connection.with_max_timeouts(max_timeouts);
        self
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self) -> Result<()> {
        self.connection.open().await
    }

    async fn exchange(&self, command: Command) -> Option<String> {
        self.connection.exchange(command).await
    }

    async fn close(&self) {
        self.connection.close().await
    }

    fn remote_addr(&self) -> String {
        self.connection.remote_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    const FRAME: &str = "N     +   0.1234 g  \r\n";

    /// Serve `FRAME` for every line; drop each connection after `per_conn` replies
    async fn spawn_scale(per_conn: usize) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let mut socket = BufReader::new(socket);
                let mut line = String::new();
                for _ in 0..per_conn {
                    line.clear();
                    match socket.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    if socket.get_mut().write_all(FRAME.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
        });

        addr
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("192.168.1.50:49155").unwrap(),
            ("192.168.1.50".to_string(), 49155)
        );
        assert_eq!(
            parse_address("scale.local:1").unwrap(),
            ("scale.local".to_string(), 1)
        );
        assert_eq!(
            parse_address("[::1]:49155").unwrap(),
            ("[::1]".to_string(), 49155)
        );
    }

    #[test]
    fn test_parse_address_invalid() {
        for address in ["192.168.1.50", ":49155", "scale:", "scale:http", "scale:70000", "::1:49155"] {
            assert!(
                matches!(parse_address(address), Err(Error::InvalidAddress(_))),
                "{address} should be rejected"
            );
        }
    }

    #[test]
    fn test_with_default_port() {
        assert_eq!(with_default_port("192.168.1.50"), "192.168.1.50:49155");
        assert_eq!(with_default_port("192.168.1.50:4001"), "192.168.1.50:4001");
        assert_eq!(with_default_port("::1"), "[::1]:49155");
        assert_eq!(with_default_port("[::1]"), "[::1]:49155");
        assert_eq!(with_default_port("[::1]:4001"), "[::1]:4001");

        for address in ["scale.local", "fe80::2", "[fe80::2]"] {
            assert!(parse_address(&with_default_port(address)).is_ok(), "{address}");
        }
    }

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.50:49155").unwrap();
        assert!(!transport.state().await.open);
        assert_eq!(transport.remote_addr(), "192.168.1.50:49155");

        assert!(TcpTransport::new("192.168.1.50").is_err());
    }

    #[tokio::test]
    async fn test_tcp_transport_exchange() {
        let addr = spawn_scale(usize::MAX).await;
        let transport = TcpTransport::new(&addr.to_string()).unwrap();

        for _ in 0..3 {
            let line = transport.exchange(Command::ReadWeight).await;
            assert_eq!(line.as_deref(), Some(FRAME));
        }

        transport.close().await;
        transport.close().await;
        assert!(!transport.state().await.open);
    }

    #[tokio::test]
    async fn test_tcp_transport_replaces_closed_socket() {
        let addr = spawn_scale(1).await;
        let transport = TcpTransport::new(&addr.to_string()).unwrap();

        assert_eq!(
            transport.exchange(Command::ReadWeight).await.as_deref(),
            Some(FRAME)
        );

        // Server hung up after one reply
        assert_eq!(transport.exchange(Command::ReadWeight).await, None);
        assert!(!transport.state().await.open);

        assert_eq!(
            transport.exchange(Command::ReadWeight).await.as_deref(),
            Some(FRAME)
        );
    }

    #[tokio::test]
    async fn test_tcp_transport_drops_late_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Answers every line with REPLY-n, the first one 300 ms late
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let mut line = String::new();
            for n in 1.. {
                line.clear();
                match socket.read_line(&mut line).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                if n == 1 {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
                let reply = format!("REPLY-{}\r\n", n);
                if socket.get_mut().write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
            }
        });

        let transport = TcpTransport::new(&addr.to_string())
            .unwrap()
            .with_io_timeout(Duration::from_millis(200));

        assert_eq!(transport.exchange(Command::ReadWeight).await, None);
        assert_eq!(
            transport.exchange(Command::ReadWeight).await.as_deref(),
            Some("REPLY-2\r\n")
        );
        assert_eq!(
            transport.exchange(Command::ReadWeight).await.as_deref(),
            Some("REPLY-3\r\n")
        );

        let state = transport.state().await;
        assert!(state.open);
        assert_eq!(state.consecutive_timeouts, 0);
    }

    #[tokio::test]
    async fn test_tcp_transport_refused() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let transport = TcpTransport::new(&addr.to_string())
            .unwrap()
            .with_connect_timeout(Duration::from_millis(200));

        assert_eq!(transport.exchange(Command::ReadWeight).await, None);
        assert!(transport.open().await.is_err());

        let state = transport.state().await;
        assert!(!state.open);
        assert!(state.reconnecting);
    }
}
