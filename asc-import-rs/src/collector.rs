//! Byte stream collection.
//!
//! The compiler reports diagnostics (and, for some entry points, the binary
//! itself) through byte streams. These helpers drain such a stream into a
//! single contiguous buffer.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, DuplexStream};
use tokio::task::JoinHandle;

const SINK_CAPACITY: usize = 64 * 1024;

/// Reads `reader` to EOF and returns everything it produced.
pub async fn collect<R>(mut reader: R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Creates a writable sink together with a handle to everything written into it.
///
/// Bytes are drained on a spawned task, so writers never stall on a full pipe
/// while nobody awaits the result. The result resolves once the sink is shut
/// down or dropped. Must be called from within a tokio runtime.
pub fn stream_collector() -> (DuplexStream, Collected) {
    let (sink, source) = tokio::io::duplex(SINK_CAPACITY);
    let task = tokio::spawn(collect(source));
    (sink, Collected { task })
}

/// Pending result of a [`stream_collector`].
#[derive(Debug)]
pub struct Collected {
    task: JoinHandle<io::Result<Vec<u8>>>,
}

impl Collected {
    /// Waits for the sink to close and returns the collected bytes.
    pub async fn result(self) -> io::Result<Vec<u8>> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(io::Error::other(err)),
        }
    }

    /// Like [`Collected::result`], decoded lossily as UTF-8 text.
    pub async fn text(self) -> io::Result<String> {
        let bytes = self.result().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
