//! Line-flushed output sinks for the JSON layer.

use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared writer that flushes after every write.
///
/// The JSON layer issues one write per line, so with the mutex held across
/// write and flush, lines from concurrent tasks never interleave.
#[derive(Clone)]
pub struct LineSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LineSink {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    /// Append to `path`, creating it and its parent directories if needed.
    pub fn file(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(BufWriter::with_capacity(8192, file)))
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }
}

impl Write for LineSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut guard = self.inner.lock();
        guard.write_all(buf)?;
        guard.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// MakeWriter implementation for tracing-subscriber.
#[derive(Clone)]
pub struct SinkFactory {
    sink: LineSink,
}

impl SinkFactory {
    pub fn new(sink: LineSink) -> Self {
        Self { sink }
    }
}

impl<'a> MakeWriter<'a> for SinkFactory {
    type Writer = LineSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.sink.clone()
    }
}
