//! Line framing shared by the byte-stream links

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use smascale_core::constants::MAX_LINE_LEN;

use crate::error::{Error, Result};

/// Read one line, terminator included
///
/// Bytes following the terminator stay in `buf` for the next call.
pub async fn read_line<R>(reader: &mut R, buf: &mut BytesMut) -> Result<BytesMut>
where
    R: AsyncRead + Unpin + ?Sized,
{
    loop {
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            return Ok(buf.split_to(pos + 1));
        }

        if buf.len() >= MAX_LINE_LEN {
            let len = buf.len();
            buf.clear();
            return Err(Error::LineTooLong(len));
        }

        buf.reserve(64);
        let n = reader.read_buf(buf).await?;

        if n == 0 {
            return Err(if buf.is_empty() {
                Error::ConnectionClosed
            } else {
                let partial = buf.len();
                buf.clear();
                Error::IncompleteLine(partial)
            });
        }
    }
}

/// Discard lines that arrive within `grace` of each other
///
/// Returns the number of complete lines thrown away. A fragment still pending
/// when the reader goes quiet is dropped too.
pub async fn drain_lines<R>(reader: &mut R, buf: &mut BytesMut, grace: Duration) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut discarded = 0;
    loop {
        match timeout(grace, read_line(reader, buf)).await {
            Ok(Ok(_)) => discarded += 1,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                buf.clear();
                return Ok(discarded);
            }
        }
    }
}
