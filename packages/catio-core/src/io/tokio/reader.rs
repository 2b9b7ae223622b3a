use crate::ams::AmsTcpHeader;
use crate::io::frame::{AMS_FRAME_MAX_LEN, AmsFrame};
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// A buffered reader that parses AMS frames from an asynchronous byte stream.
///
/// Wraps the underlying reader in a [`BufReader`] so the 6-byte prefix and
/// the payload do not each cost a system call.
pub struct AmsReader<R: AsyncRead> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> AmsReader<R> {
    /// Creates a reader with default buffering.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Creates a reader with a specific buffer capacity.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
        }
    }

    /// Reads a single frame from the stream.
    ///
    /// Returns `UnexpectedEof` if the stream closes cleanly between frames,
    /// and `InvalidData` for a non-zero reserved prefix or an over-long
    /// declared payload.
    pub async fn read_frame(&mut self) -> io::Result<AmsFrame> {
        if self.reader.fill_buf().await?.is_empty() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }

        let mut header_buf = [0u8; AmsTcpHeader::LENGTH];
        self.reader.read_exact(&mut header_buf).await?;
        let header = AmsTcpHeader::from_bytes(header_buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let payload_len = header.length() as usize;
        if payload_len > AMS_FRAME_MAX_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Payload too large: {} bytes (max {})",
                    payload_len, AMS_FRAME_MAX_LEN
                ),
            ));
        }

        let mut payload = vec![0u8; payload_len];
        self.reader.read_exact(&mut payload).await?;

        Ok(AmsFrame::from_parts(header, payload))
    }

    /// Consumes this reader, returning the underlying stream.
    ///
    /// Any buffered but unparsed bytes are lost.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}
