//! Bounded stream capture for synchronous commands.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::ExecError;

/// Which standard stream a capture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read `reader` to EOF, failing as soon as more than `limit` bytes arrive.
///
/// Reads at most `limit + 1` bytes, so a runaway producer is never buffered
/// past the ceiling.
pub async fn read_bounded<R>(reader: R, limit: usize, stream: Stream) -> Result<Vec<u8>, ExecError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take((limit as u64).saturating_add(1));
    limited
        .read_to_end(&mut buf)
        .await
        .map_err(ExecError::Capture)?;

    if buf.len() > limit {
        return Err(ExecError::OutputLimitExceeded { stream, limit });
    }
    Ok(buf)
}

/// Join captured streams into the text returned to the caller.
///
/// Stderr, when present, follows stdout after a single newline. Nothing is
/// appended when stderr is empty.
pub fn combine(stdout: &[u8], stderr: &[u8]) -> String {
    let out = String::from_utf8_lossy(stdout);
    if stderr.is_empty() {
        return out.into_owned();
    }
    format!("{out}\n{}", String::from_utf8_lossy(stderr))
}
