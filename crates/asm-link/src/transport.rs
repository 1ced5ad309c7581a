//! Stream-socket seam between the link and the operating system.
//!
//! The session only needs three blocking operations on an open connection, so
//! they are expressed as a trait taking `&self`. One handle can then be shared
//! between the read loop (reads) and the command path (writes, shutdown).

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// An open, bidirectional byte stream to the sensor module.
pub trait LinkStream: Send + Sync {
    /// Block until some bytes arrive. `Ok(0)` means the peer closed the stream.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer.
    fn write_all(&self, data: &[u8]) -> io::Result<()>;

    /// Shut down both directions, unblocking a pending `read`.
    fn shutdown(&self) -> io::Result<()>;
}

/// Opens streams to the sensor module.
pub trait Connector: Send + Sync {
    /// Open a new stream to `host:port`.
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Box<dyn LinkStream>>;
}

/// [`Connector`] backed by `std::net::TcpStream`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Box<dyn LinkStream>> {
        let mut last_error = None;

        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(Box::new(TcpLink { stream }));
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{}:{} did not resolve to any address", host, port),
            )
        }))
    }
}

struct TcpLink {
    stream: TcpStream,
}

impl LinkStream for TcpLink {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut stream = &self.stream;
        stream.write_all(data)?;
        stream.flush()
    }

    fn shutdown(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            // Already torn down by the peer.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
