/// Bounded output collection for sandboxed children.
///
/// Each stream is drained on its own thread for the whole lifetime of the
/// child. Bytes past the limit are discarded but the pipe keeps draining, so a
/// chatty child never blocks on a full pipe and never hides its exit status.
use crate::config::types::OutputIntegrity;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

/// Output limits configuration
#[derive(Debug, Clone)]
pub struct OutputLimits {
    /// Per-stream stdout limit (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr limit (bytes)
    pub stderr_limit: usize,
    /// How long to wait for the streams to close once the child is gone
    pub collection_timeout: Duration,
}

impl OutputLimits {
    pub fn per_stream(limit: usize) -> Self {
        Self {
            stdout_limit: limit,
            stderr_limit: limit,
            ..Self::default()
        }
    }
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            stdout_limit: 64 * 1024,
            stderr_limit: 64 * 1024,
            collection_timeout: Duration::from_secs(2),
        }
    }
}

/// Output collection result
#[derive(Debug, Clone, Default)]
pub struct OutputResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
}

impl OutputResult {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

type StreamMessage = (Vec<u8>, OutputIntegrity);

/// Collectors that are draining a running child's pipes.
pub struct PendingOutput {
    stdout_rx: Option<Receiver<StreamMessage>>,
    stderr_rx: Option<Receiver<StreamMessage>>,
    collection_timeout: Duration,
}

/// Output collector with bounded collection
pub struct OutputCollector {
    limits: OutputLimits,
}

impl OutputCollector {
    pub fn new(limits: OutputLimits) -> Self {
        OutputCollector { limits }
    }

    /// Start draining both streams. Call before waiting on the child.
    pub fn start<O, E>(&self, stdout: Option<O>, stderr: Option<E>) -> PendingOutput
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let stdout_rx = stdout.map(|s| spawn_collector(s, self.limits.stdout_limit));
        let stderr_rx = stderr.map(|s| spawn_collector(s, self.limits.stderr_limit));

        PendingOutput {
            stdout_rx,
            stderr_rx,
            collection_timeout: self.limits.collection_timeout,
        }
    }
}

impl PendingOutput {
    /// Wait for both collectors. A stream still open after the collection
    /// timeout (an escaped descendant holding the pipe) is reported as
    /// `CollectorTimeout` with whatever the thread had not yet handed over.
    pub fn finish(self) -> OutputResult {
        let deadline = Instant::now() + self.collection_timeout;
        let (stdout, stdout_integrity) = receive(self.stdout_rx, deadline);
        let (stderr, stderr_integrity) = receive(self.stderr_rx, deadline);

        OutputResult {
            stdout,
            stderr,
            stdout_integrity,
            stderr_integrity,
        }
    }
}

fn receive(rx: Option<Receiver<StreamMessage>>, deadline: Instant) -> StreamMessage {
    let Some(rx) = rx else {
        return (Vec::new(), OutputIntegrity::Complete);
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(message) => message,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Output stream still open after child exit; abandoning collector");
            (Vec::new(), OutputIntegrity::CollectorTimeout)
        }
        Err(RecvTimeoutError::Disconnected) => (Vec::new(), OutputIntegrity::ReadError),
    }
}

fn spawn_collector<R: Read + Send + 'static>(stream: R, limit: usize) -> Receiver<StreamMessage> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(collect_stream(stream, limit));
    });
    rx
}

/// Read a stream to EOF, keeping at most `limit` bytes.
fn collect_stream<R: Read>(mut stream: R, limit: usize) -> StreamMessage {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(buffer.len());
                if n > room {
                    buffer.extend_from_slice(&chunk[..room]);
                    integrity = OutputIntegrity::TruncatedByJudgeLimit;
                } else {
                    buffer.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Output stream read failed: {}", e);
                if integrity == OutputIntegrity::Complete {
                    integrity = OutputIntegrity::ReadError;
                }
                break;
            }
        }
    }

    (buffer, integrity)
}

/// Truncate text to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_collect_stream_within_limit() {
        let (data, integrity) = collect_stream(Cursor::new(b"hello".to_vec()), 16);
        assert_eq!(data, b"hello");
        assert_eq!(integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_collect_stream_drains_past_limit() {
        let input = vec![b'x'; 10_000];
        let (data, integrity) = collect_stream(Cursor::new(input), 100);
        assert_eq!(data.len(), 100);
        assert_eq!(integrity, OutputIntegrity::TruncatedByJudgeLimit);
    }

    #[test]
    fn test_collector_with_no_streams() {
        let collector = OutputCollector::new(OutputLimits::default());
        let pending = collector.start::<Cursor<Vec<u8>>, Cursor<Vec<u8>>>(None, None);
        let result = pending.finish();
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr_integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_collector_threads() {
        let collector = OutputCollector::new(OutputLimits::per_stream(4));
        let pending = collector.start(
            Some(Cursor::new(b"abcdefgh".to_vec())),
            Some(Cursor::new(b"err".to_vec())),
        );
        let result = pending.finish();
        assert_eq!(result.stdout_lossy(), "abcd");
        assert_eq!(result.stdout_integrity, OutputIntegrity::TruncatedByJudgeLimit);
        assert_eq!(result.stderr_lossy(), "err");
        assert_eq!(result.stderr_integrity, OutputIntegrity::Complete);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ééé", 2), "éé...");
    }
}
