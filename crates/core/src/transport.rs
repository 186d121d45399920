//! Boundary to the unreliable datagram channel.
//!
//! The session only needs two things from the network: push one datagram
//! out, and wait (bounded by the receive timeout) for one datagram back.
//! A timeout is not an error; it surfaces as `Ok(None)` and the session's
//! own retry loops decide what to do next.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Largest response datagram the receiver sends.
pub const MAX_RESPONSE_SIZE: usize = 1024;

/// Send one frame, receive one response.
pub trait Transport {
    /// Transmit one datagram.
    fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Wait for one datagram; `Ok(None)` when the receive timeout elapsed.
    fn recv(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// UDP transport talking to a single receiver.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `receiver`.
    ///
    /// # Arguments
    /// - `receiver`: address of the upload receiver
    /// - `timeout`: how long `recv` blocks before reporting a timeout
    pub fn connect<A: ToSocketAddrs>(receiver: A, timeout: Duration) -> io::Result<Self> {
        let remote = receiver
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no receiver address"))?;

        let local: SocketAddr = if remote.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;
        // a zero duration would mean "block forever" to the OS
        socket.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;

        Ok(Self {
            socket,
            recv_buf: vec![0u8; MAX_RESPONSE_SIZE],
        })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send(datagram).map(|_| ())
    }

    fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.socket.recv(&mut self.recv_buf) {
            Ok(size) => Ok(Some(self.recv_buf[..size].to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = receiver.local_addr().unwrap();

        let mut transport = UdpTransport::connect(addr, Duration::from_secs(2)).unwrap();
        transport.send(b"frame").unwrap();

        let mut buf = [0u8; 64];
        let (size, from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..size], b"frame");
        assert_eq!(from, transport.local_addr().unwrap());

        receiver.send_to(b"METADATAMODE", from).unwrap();
        assert_eq!(transport.recv().unwrap(), Some(b"METADATAMODE".to_vec()));
    }

    #[test]
    fn test_timeout_is_none() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = receiver.local_addr().unwrap();

        let mut transport = UdpTransport::connect(addr, Duration::from_millis(50)).unwrap();
        assert_eq!(transport.recv().unwrap(), None);
    }
}
