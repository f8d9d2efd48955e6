// ─── Console Bridge ───
// Moves server output from the child's stdout pipe into a drainable
// line buffer. The reader runs on its own OS thread and blocks on the
// pipe until the server closes it.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader as StdBufReader, Read};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::debug;

/// How many lines a single console drain hands out by default.
/// Keeps one UI tick bounded even when the server floods stdout.
pub const DEFAULT_DRAIN_LINES: usize = 25;

/// Shared FIFO of console lines. Clones refer to the same queue.
#[derive(Clone, Default)]
pub struct ConsoleBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl ConsoleBuffer {
    pub fn push(&self, line: String) {
        self.queue().push_back(line);
    }

    /// Remove and return up to `max_lines` of the oldest buffered
    /// lines. Each line is handed out by exactly one drain call.
    pub fn drain(&self, max_lines: usize) -> Vec<String> {
        let mut queue = self.queue();
        let take = max_lines.min(queue.len());
        queue.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        // A poisoned queue still holds valid lines; keep serving them.
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reader thread pumping one output stream into a [`ConsoleBuffer`].
///
/// Dropping the bridge detaches the thread; it keeps pumping until the
/// stream reaches end-of-file and then exits on its own.
pub struct ConsoleBridge {
    buffer: ConsoleBuffer,
    reader: JoinHandle<()>,
}

impl ConsoleBridge {
    /// Pump `stream` into a fresh buffer.
    pub fn spawn<R>(stream: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::attach(ConsoleBuffer::default(), stream)
    }

    /// Pump `stream` into an existing buffer.
    pub fn attach<R>(buffer: ConsoleBuffer, stream: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let sink = buffer.clone();
        let reader = std::thread::spawn(move || {
            for line in StdBufReader::new(stream).lines().map_while(Result::ok) {
                sink.push(line);
            }
            debug!("Console stream closed");
        });

        Self { buffer, reader }
    }

    pub fn buffer(&self) -> &ConsoleBuffer {
        &self.buffer
    }

    pub fn drain(&self, max_lines: usize) -> Vec<String> {
        self.buffer.drain(max_lines)
    }

    /// Whether the reader thread has seen end-of-stream and exited.
    pub fn finished(&self) -> bool {
        self.reader.is_finished()
    }
}
