//! Framed I/O for the IMAP conversation.
//!
//! Responses are CRLF-terminated lines; a FETCH response is followed by a
//! raw literal of announced size. The reader keeps bytes received past a
//! consumed line buffered, so the body handoff can drain prefetched body
//! bytes before touching the transport again.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum response line length; anything longer is not an IMAP response.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Framed connection for the IMAP conversation.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one response line, with CR and LF stripped.
    ///
    /// Bytes received after the line terminator stay buffered and are
    /// visible through [`buffered`](Self::buffered) until consumed.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(line);
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::WeirdServerReply("response line too long".to_string()));
            }
        }
    }

    /// The bytes already received past the last consumed line.
    ///
    /// During the FETCH body handoff these are the first body bytes; a
    /// correct caller drains them before reading from the transport, or it
    /// would stall waiting for bytes that already arrived.
    pub fn buffered(&self) -> &[u8] {
        self.reader.buffer()
    }

    /// Streams exactly `size` literal bytes into `sink`.
    ///
    /// Buffered bytes are taken first, then the transport is read; no byte
    /// past the literal is consumed. Returns the byte count delivered.
    pub async fn read_body<W>(&mut self, sink: &mut W, size: u64) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut left = size;
        while left > 0 {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside the message literal",
                )));
            }

            let chunk = usize::try_from(left).map_or(buf.len(), |l| buf.len().min(l));
            sink.write_all(&buf[..chunk]).await?;
            self.reader.consume(chunk);
            left -= chunk as u64;
            tracing::trace!(chunk, left, "body bytes delivered");
        }
        sink.flush().await?;

        Ok(size)
    }

    /// Writes a command (or continuation data) to the stream and flushes.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Buffered read data is dropped, so this is only safe at a point
    /// where the server cannot have sent anything: right after a STARTTLS
    /// go-ahead, before the handshake.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_line_strips_crlf() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap(), b"* OK ready");
    }

    #[tokio::test]
    async fn read_line_handles_split_chunks() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"A001 OK long resp")
            .read(b"onse\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_line().await.unwrap(), b"A001 OK long response");
    }

    #[tokio::test]
    async fn bytes_after_the_line_stay_buffered() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[TEXT] {3}\r\nABC)\r\nA004 OK\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let line = framed.read_line().await.unwrap();
        assert_eq!(line, b"* 1 FETCH (BODY[TEXT] {3}");
        assert_eq!(framed.buffered(), b"ABC)\r\nA004 OK\r\n");
    }

    #[tokio::test]
    async fn read_body_drains_the_buffer_without_new_reads() {
        use tokio_test::io::Builder;

        // The whole response arrives in one buffer. The body copy has to
        // come out of the cache: the transport has nothing more to offer,
        // so any extra read would hit EOF and fail.
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[TEXT] {3}\r\nABC)\r\nA004 OK\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let _ = framed.read_line().await.unwrap();
        let mut sink = Vec::new();
        let written = framed.read_body(&mut sink, 3).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(sink, b"ABC");
        // The tagged completion is still there for whoever wants it.
        assert_eq!(framed.read_line().await.unwrap(), b")");
        assert_eq!(framed.read_line().await.unwrap(), b"A004 OK");
    }

    #[tokio::test]
    async fn read_body_continues_on_the_transport() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {10}\r\nHELLO")
            .read(b" MAIL")
            .build();
        let mut framed = FramedStream::new(mock);

        let _ = framed.read_line().await.unwrap();
        let mut sink = Vec::new();
        let written = framed.read_body(&mut sink, 10).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(sink, b"HELLO MAIL");
    }

    #[tokio::test]
    async fn read_body_eof_mid_literal_is_an_error() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"{5}\r\nAB").build();
        let mut framed = FramedStream::new(mock);

        let _ = framed.read_line().await.unwrap();
        let mut sink = Vec::new();
        assert!(framed.read_body(&mut sink, 5).await.is_err());
    }

    #[tokio::test]
    async fn eof_before_a_line_is_an_error() {
        use tokio_test::io::Builder;

        let mock = Builder::new().build();
        let mut framed = FramedStream::new(mock);
        assert!(framed.read_line().await.is_err());
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        use tokio_test::io::Builder;

        // Nine full reader buffers with no terminator in sight; the limit
        // trips after the ninth.
        let long = vec![b'x'; DEFAULT_BUFFER_SIZE * 9];
        let mock = Builder::new().read(&long).build();
        let mut framed = FramedStream::new(mock);

        assert!(matches!(
            framed.read_line().await,
            Err(Error::WeirdServerReply(_))
        ));
    }

    #[tokio::test]
    async fn write_command_flushes() {
        use tokio_test::io::Builder;

        let mock = Builder::new().write(b"A001 CAPABILITY\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A001 CAPABILITY\r\n").await.unwrap();
    }
}
