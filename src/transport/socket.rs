//! Async UDP socket wrapper.
//!
//! Provides a high-level interface for moving convoy datagrams over UDP,
//! plus [`UdpLink`], a cloneable transmit handle that lets a
//! [`PacketEndpoint`](crate::transport::PacketEndpoint) share a socket with
//! the receive loop that feeds it.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::warn;
use tokio::net::UdpSocket;

use crate::transport::header::sizes;
use crate::transport::link::Link;

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// Async UDP socket wrapper.
///
/// Owns the receive buffer and hands out [`UdpLink`] transmit handles.
#[derive(Debug)]
pub struct ConvoySocket {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,
    /// Receive buffer.
    recv_buffer: Vec<u8>,
    /// Maximum payload size (for MTU considerations).
    max_payload_size: usize,
}

impl ConvoySocket {
    /// Create a new socket bound to the given address.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket))
    }

    /// Create a convoy socket from an existing UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; DEFAULT_RECV_BUFFER_SIZE],
            max_payload_size: sizes::MAX_PAYLOAD,
        }
    }

    /// Set the maximum payload size (for MTU considerations).
    pub fn set_max_payload_size(&mut self, size: usize) {
        self.max_payload_size = size;
    }

    /// Get the maximum payload size.
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Connect to a remote address.
    ///
    /// After connecting, `send`, `recv`, and [`UdpLink`] transmission can be
    /// used instead of `send_to` and `recv_from`.
    pub async fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        self.socket.connect(addr).await
    }

    /// Send a datagram to a specific address.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, addr).await
    }

    /// Send a datagram to the connected address.
    pub async fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send(data).await
    }

    /// Receive a datagram and return the sender's address.
    pub async fn recv_from(&mut self) -> io::Result<(&[u8], SocketAddr)> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
        Ok((&self.recv_buffer[..len], addr))
    }

    /// Receive a datagram from the connected address.
    pub async fn recv(&mut self) -> io::Result<&[u8]> {
        let len = self.socket.recv(&mut self.recv_buffer).await?;
        Ok(&self.recv_buffer[..len])
    }

    /// Try to receive a datagram from the connected address without blocking.
    ///
    /// Returns `Ok(None)` if no data is available.
    pub fn try_recv(&mut self) -> io::Result<Option<usize>> {
        match self.socket.try_recv(&mut self.recv_buffer) {
            Ok(len) => Ok(Some(len)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the received data after a successful `try_recv`.
    pub fn recv_data(&self, len: usize) -> &[u8] {
        &self.recv_buffer[..len]
    }

    /// Get a reference to the underlying socket.
    pub fn inner(&self) -> &UdpSocket {
        &self.socket
    }

    /// Create a transmit handle sharing this socket.
    ///
    /// The socket must be connected before the handle is used.
    pub fn link(&self) -> UdpLink {
        UdpLink {
            socket: Arc::clone(&self.socket),
        }
    }

    /// Calculate the maximum datagram size considering the packet header.
    pub fn max_datagram_size(&self) -> usize {
        self.max_payload_size + sizes::HEADER_SIZE
    }
}

/// Cloneable transmit handle over a connected [`ConvoySocket`].
///
/// Transmission is best effort: an OS error drops the datagram and
/// recovery is left to retransmission. A send the socket cannot complete
/// immediately is finished on a background task, so the handle must be
/// used from inside the tokio runtime that owns the socket.
#[derive(Debug, Clone)]
pub struct UdpLink {
    socket: Arc<UdpSocket>,
}

impl Link for UdpLink {
    fn transmit(&mut self, datagram: &[u8]) {
        match self.socket.try_send(datagram) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                // A fresh socket has not reported writability to the
                // reactor yet, so the first try_send returns WouldBlock.
                // Finish the send on the runtime rather than dropping the
                // datagram.
                let socket = Arc::clone(&self.socket);
                let datagram = datagram.to_vec();
                tokio::spawn(async move {
                    if let Err(error) = socket.send(&datagram).await {
                        warn!("datagram dropped at the socket: {error}");
                    }
                });
            }
            Err(error) => {
                warn!("datagram dropped at the socket: {error}");
            }
        }
    }
}

/// Builder for creating convoy sockets with custom options.
#[derive(Debug, Clone)]
pub struct ConvoySocketBuilder {
    recv_buffer_size: usize,
    max_payload_size: usize,
}

impl Default for ConvoySocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvoySocketBuilder {
    /// Create a new socket builder with default options.
    pub fn new() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            max_payload_size: sizes::MAX_PAYLOAD,
        }
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set the maximum payload size.
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Bind to the given address and create a socket.
    pub async fn bind(self, addr: SocketAddr) -> io::Result<ConvoySocket> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(self.from_socket(socket))
    }

    /// Create a socket from an existing UDP socket.
    pub fn from_socket(self, socket: UdpSocket) -> ConvoySocket {
        ConvoySocket {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; self.recv_buffer_size],
            max_payload_size: self.max_payload_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_socket_bind() {
        let socket = ConvoySocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = socket.local_addr().unwrap();
        assert!(addr.port() != 0);
    }

    #[tokio::test]
    async fn test_socket_send_recv() {
        let mut server = ConvoySocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = ConvoySocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        // Send from client
        let data = b"hello convoy";
        client.send_to(data, server_addr).await.unwrap();

        // Receive on server
        let (received, from) = server.recv_from().await.unwrap();
        assert_eq!(received, data);
        assert_eq!(from, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_link_transmits_over_socket() {
        let mut server = ConvoySocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = ConvoySocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        client.connect(server_addr).await.unwrap();

        // The very first transmit happens before the reactor has seen the
        // socket writable; it must still arrive.
        let mut link = client.link();
        link.transmit(b"via link");

        let (received, _) = timeout(Duration::from_secs(5), server.recv_from())
            .await
            .expect("datagram within the timeout")
            .unwrap();
        assert_eq!(received, b"via link");
    }

    #[test]
    fn test_socket_builder() {
        let builder = ConvoySocketBuilder::new()
            .recv_buffer_size(4096)
            .max_payload_size(1100);

        assert_eq!(builder.recv_buffer_size, 4096);
        assert_eq!(builder.max_payload_size, 1100);
    }

    #[tokio::test]
    async fn test_max_datagram_size() {
        let socket = ConvoySocketBuilder::new()
            .max_payload_size(1100)
            .bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(socket.max_datagram_size(), 1100 + sizes::HEADER_SIZE);
    }
}
