use super::reader::AmsReader;
use super::writer::AmsWriter;
use crate::ams::port;
use std::net::SocketAddr;
use tokio::io::{self, AsyncRead, AsyncWrite};
use tokio::net::{self, TcpStream};

/// A stream wrapper for a live ADS connection.
///
/// Wraps a raw byte stream (typically a [`TcpStream`]) and splits it into a
/// buffered [`AmsReader`] / [`AmsWriter`] pair for a receive loop and
/// interleaved senders.
pub struct AmsStream<S: AsyncRead + AsyncWrite + Unpin = TcpStream> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> AmsStream<S> {
    /// Wraps an existing stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Consumes the wrapper and returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Splits the stream into a buffered reader and writer.
    ///
    /// Uses [`tokio::io::split`], which costs an `Arc` + mutex pair. For
    /// `TcpStream`, prefer [`into_split`](AmsStream::into_split).
    pub fn split(self) -> (AmsReader<io::ReadHalf<S>>, AmsWriter<io::WriteHalf<S>>) {
        let (reader, writer) = io::split(self.stream);
        (AmsReader::new(reader), AmsWriter::new(writer))
    }
}

impl AmsStream<TcpStream> {
    /// Connects to an ADS peer at the given socket address.
    ///
    /// Disables Nagle's algorithm; small read/write requests dominate ADS
    /// traffic and must not wait for coalescing.
    pub async fn connect<A: net::ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Connects to a peer's ADS TCP port (48898) by IP address.
    pub async fn connect_ads(ip: std::net::IpAddr) -> io::Result<Self> {
        Self::connect((ip, port::ADS_TCP)).await
    }

    /// Splits the `TcpStream` into owned halves with no locking overhead.
    pub fn into_split(
        self,
    ) -> (
        AmsReader<net::tcp::OwnedReadHalf>,
        AmsWriter<net::tcp::OwnedWriteHalf>,
    ) {
        let (reader, writer) = self.stream.into_split();
        (AmsReader::new(reader), AmsWriter::new(writer))
    }

    /// Returns the remote peer's socket address.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Returns the local socket address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }
}
