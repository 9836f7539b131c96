//! Control-channel wire protocol.
//!
//! Every control message is a single line of text. The announcement goes
//! client -> server, the response goes server -> client, and the
//! connect-back carries only a raw token.
//!
//! | Step     | Sender          | Payload                                   |
//! |----------|-----------------|-------------------------------------------|
//! | Announce | client -> server | `ip:port` or `[ip]:port`                 |
//! | Response | server -> client | `SUCCESS: ...` or `ERROR: ...`           |
//! | Callback | server -> target | random alphanumeric token                |

use std::fmt;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum size of one control message, terminator included.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Substring that marks a positive server response.
pub const SUCCESS_MARKER: &str = "SUCCESS";

const SUCCESS_TEXT: &str = "SUCCESS: Random value sent";
const INVALID_ADDRESS_TEXT: &str = "ERROR: Invalid address format";
const CANNOT_CONNECT_TEXT: &str = "ERROR: Cannot connect to specified address";
const SEND_FAILED_TEXT: &str = "ERROR: Failed to send random value";

/// Response sent by the rendezvous server on the control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The token was written to the announced address.
    Success,
    /// The announcement could not be read or decoded.
    InvalidAddress,
    /// The connect-back to the announced address failed.
    CannotConnect,
    /// The connect-back succeeded but the token write failed.
    SendFailed,
    /// Anything the client does not recognise.
    Other(String),
}

impl Response {
    /// Wire text of this response, without terminator.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => SUCCESS_TEXT,
            Self::InvalidAddress => INVALID_ADDRESS_TEXT,
            Self::CannotConnect => CANNOT_CONNECT_TEXT,
            Self::SendFailed => SEND_FAILED_TEXT,
            Self::Other(text) => text,
        }
    }

    /// Interpret response text received by the client.
    ///
    /// Any text containing [`SUCCESS_MARKER`] counts as success.
    pub fn parse(text: &str) -> Self {
        match text {
            INVALID_ADDRESS_TEXT => Self::InvalidAddress,
            CANNOT_CONNECT_TEXT => Self::CannotConnect,
            SEND_FAILED_TEXT => Self::SendFailed,
            _ if text.contains(SUCCESS_MARKER) => Self::Success,
            _ => Self::Other(text.to_string()),
        }
    }

    /// Whether the server acknowledged the connect-back.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read one control message.
///
/// The message ends at `\n` (an optional `\r` before it is dropped) or at
/// end of stream. Returns an empty string if the peer closed without
/// sending anything. Messages longer than [`MAX_MESSAGE_SIZE`] and
/// non-UTF-8 payloads are rejected as `InvalidData`.
pub async fn read_message<R>(reader: R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut limited = BufReader::new(reader.take(MAX_MESSAGE_SIZE as u64 + 1));
    let mut buf = Vec::with_capacity(64);
    limited.read_until(b'\n', &mut buf).await?;

    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message exceeds {} bytes", MAX_MESSAGE_SIZE),
        ));
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write one control message followed by `\n` and flush it.
pub async fn write_message<W>(writer: &mut W, message: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = Vec::with_capacity(message.len() + 1);
    frame.extend_from_slice(message.as_bytes());
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await
}
