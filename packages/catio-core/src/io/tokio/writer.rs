use super::traits::WriteAllVectored;
use crate::io::frame::AmsFrame;
use std::io::IoSlice;
use tokio::io::{self, AsyncWrite, AsyncWriteExt, BufWriter};

/// A buffered writer that serializes AMS frames onto an asynchronous stream.
pub struct AmsWriter<W: AsyncWrite + Unpin> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> AmsWriter<W> {
    /// Creates a writer with default buffering.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Creates a writer with a specific buffer capacity.
    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, writer),
        }
    }

    /// Writes a frame and flushes immediately.
    ///
    /// Prefix and payload go out in one vectored write; the flush keeps a
    /// small request from sitting in the buffer behind Nagle-style delays.
    pub async fn write_frame(&mut self, frame: &AmsFrame) -> io::Result<()> {
        let header_bytes = frame.header().to_bytes();
        let mut bufs = [IoSlice::new(&header_bytes), IoSlice::new(frame.payload())];

        WriteAllVectored::write_all_vectored(&mut self.writer, &mut bufs).await?;
        self.writer.flush().await
    }

    /// Consumes this writer, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn write_frame_emits_prefix_and_payload() {
        let expected = [0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC];
        let mut mock = Builder::new().write(&expected).build();

        let mut writer = AmsWriter::new(&mut mock);
        writer
            .write_frame(&AmsFrame::new([0xAA, 0xBB, 0xCC]))
            .await
            .expect("Write should succeed");
    }
}
