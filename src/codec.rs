// https://redis.io/docs/reference/protocol-spec

use std::io;

use bytes::{Bytes, BytesMut};
use thiserror::Error as ThisError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CRLF: &[u8; 2] = b"\r\n";

// Header values come from the peer; cap them before allocating. Same limits
// Redis enforces: 1M elements per command array, 512MB per bulk string.
const MAX_ARRAY_LEN: i64 = 1024 * 1024;
const MAX_BULK_SIZE: i64 = 512 * 1024 * 1024;

/// Codec failures come in two kinds that callers must treat differently:
/// an I/O error (including EOF mid-frame) means the connection is gone and
/// no reply should be attempted; a protocol error means the peer sent a
/// malformed frame and is still there to receive an error reply.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("ERR protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    fn protocol(msg: impl Into<String>) -> Error {
        Error::Protocol(msg.into())
    }
}

/// Reads RESP2 command frames: top-level arrays of bulk strings, the only
/// shape clients send for commands.
pub struct Reader<R> {
    src: R,
}

impl<R: AsyncBufRead + Unpin> Reader<R> {
    pub fn new(src: R) -> Reader<R> {
        Reader { src }
    }

    /// Reads one command array, e.g. `*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\nb\r\n`.
    ///
    /// A `$-1` element is returned as `None`: present but null, distinct
    /// from an empty string.
    pub async fn read_array_bulk(&mut self) -> Result<Vec<Option<Bytes>>, Error> {
        let prefix = self.read_byte().await?;
        if prefix != b'*' {
            return Err(Error::protocol(format!(
                "expected array '*', got '{}'",
                prefix.escape_ascii()
            )));
        }
        let n = self.read_integer_line().await?;
        if !(0..=MAX_ARRAY_LEN).contains(&n) {
            return Err(Error::protocol("invalid multibulk length"));
        }

        let mut out = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let prefix = self.read_byte().await?;
            if prefix != b'$' {
                return Err(Error::protocol(format!(
                    "expected bulk '$', got '{}'",
                    prefix.escape_ascii()
                )));
            }
            let size = self.read_integer_line().await?;
            if size == -1 {
                // Null bulk string.
                out.push(None);
                continue;
            }
            if !(0..=MAX_BULK_SIZE).contains(&size) {
                return Err(Error::protocol("invalid bulk length"));
            }
            let mut buf = vec![0u8; size as usize];
            self.src.read_exact(&mut buf).await?;
            self.expect_crlf().await?;
            out.push(Some(Bytes::from(buf)));
        }
        Ok(out)
    }

    async fn read_byte(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.src.read_exact(&mut buf).await?;
        Ok(buf[0])
    }

    async fn read_integer_line(&mut self) -> Result<i64, Error> {
        let mut line = Vec::new();
        self.src.read_until(b'\n', &mut line).await?;
        if !line.ends_with(b"\n") {
            // Stream ended before the line did.
            return Err(Error::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        if line.len() < 2 || line[line.len() - 2] != b'\r' {
            return Err(Error::protocol("length line not terminated by CRLF"));
        }
        let digits = &line[..line.len() - 2];
        parse_int(digits).ok_or_else(|| {
            Error::protocol(format!(
                "expected integer, got {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
    }

    async fn expect_crlf(&mut self) -> Result<(), Error> {
        let b1 = self.read_byte().await?;
        let b2 = self.read_byte().await?;
        if b1 != b'\r' || b2 != b'\n' {
            return Err(Error::protocol("bulk string not terminated by CRLF"));
        }
        Ok(())
    }
}

/// Encodes RESP2 replies into an internal buffer. Nothing is written to the
/// socket until `flush` is called, so multi-part array replies can be
/// assembled from an `write_array_header` followed by element writes.
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    pub fn new() -> Writer {
        Writer {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Simple string: `+<s>\r\n`.
    pub fn write_simple(&mut self, s: &str) {
        self.buf.extend_from_slice(b"+");
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.extend_from_slice(CRLF);
    }

    /// Error: `-<msg>\r\n`.
    pub fn write_error(&mut self, msg: &str) {
        self.buf.extend_from_slice(b"-");
        self.buf.extend_from_slice(msg.as_bytes());
        self.buf.extend_from_slice(CRLF);
    }

    /// Integer: `:<n>\r\n`.
    pub fn write_int(&mut self, n: i64) {
        self.buf.extend_from_slice(b":");
        self.buf.extend_from_slice(n.to_string().as_bytes());
        self.buf.extend_from_slice(CRLF);
    }

    /// Bulk string: `$<len>\r\n<bytes>\r\n`.
    pub fn write_bulk(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b"$");
        self.buf.extend_from_slice(b.len().to_string().as_bytes());
        self.buf.extend_from_slice(CRLF);
        self.buf.extend_from_slice(b);
        self.buf.extend_from_slice(CRLF);
    }

    /// Null bulk string: `$-1\r\n`.
    pub fn write_null(&mut self) {
        self.buf.extend_from_slice(b"$-1\r\n");
    }

    /// Bulk string or null when absent.
    pub fn write_opt_bulk(&mut self, b: Option<&[u8]>) {
        match b {
            Some(b) => self.write_bulk(b),
            None => self.write_null(),
        }
    }

    /// Array header: `*<n>\r\n`, followed by `n` independently written
    /// elements.
    pub fn write_array_header(&mut self, n: usize) {
        self.buf.extend_from_slice(b"*");
        self.buf.extend_from_slice(n.to_string().as_bytes());
        self.buf.extend_from_slice(CRLF);
    }

    /// Empty array: `*0\r\n`.
    pub fn write_empty_array(&mut self) {
        self.buf.extend_from_slice(b"*0\r\n");
    }

    /// Commits everything buffered so far to `dst` and clears the buffer.
    pub async fn flush<W: AsyncWrite + Unpin>(&mut self, dst: &mut W) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        dst.write_all(&self.buf).await?;
        dst.flush().await?;
        self.buf.clear();
        Ok(())
    }

    /// The encoded bytes not yet flushed.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strict ASCII integer parsing for wire payloads: an optional leading '-',
/// then one or more digits. No '+', no whitespace, no overflow wrapping.
pub fn parse_int(b: &[u8]) -> Option<i64> {
    let (neg, digits) = match b.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, b),
    };
    if digits.is_empty() {
        return None;
    }
    let mut n: i64 = 0;
    for &c in digits {
        if !c.is_ascii_digit() {
            return None;
        }
        n = n.checked_mul(10)?.checked_add((c - b'0') as i64)?;
    }
    Some(if neg { -n } else { n })
}
