//! Bounded-memory index building.
//!
//! [`MultiIndexBuilder`] keeps two [`InMemoryIndexBuilder`]s. New documents
//! always go to the back one; once it grows past the size threshold the two
//! are flipped and the full one is handed to a writer thread, which appends
//! it to the output as one more segment and clears it for reuse.

use crate::error::{IndexError, Result};
use crate::index::builder::InMemoryIndexBuilder;
use crate::index::flipping::FlippingBuffer;
use crate::index::multi::MultiIndex;
use crate::index::reader::IndexReader;
use crate::index::types::Trigram;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Default flush threshold, in `InMemoryIndexBuilder::estimated_size` units
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 128 * 1024 * 1024;

struct Slot {
    builder: InMemoryIndexBuilder,
    /// Set while the writer thread still owns this builder
    flushing: AtomicBool,
}

impl Slot {
    fn new(builder: InMemoryIndexBuilder) -> Arc<Self> {
        Arc::new(Self {
            builder,
            flushing: AtomicBool::new(false),
        })
    }
}

/// Segmented index builder writing to `W`
pub struct MultiIndexBuilder<W> {
    buffers: FlippingBuffer<Arc<Slot>>,
    max_segment_bytes: u64,
    sender: Option<Sender<Arc<Slot>>>,
    writer: Option<JoinHandle<Result<W>>>,
    failure: Arc<Mutex<Option<String>>>,
    segments_sent: AtomicUsize,
}

impl<W: Write + Seek + Send + 'static> MultiIndexBuilder<W> {
    pub fn new(out: W, max_segment_bytes: u64) -> Result<Self> {
        Self::with_initial(out, max_segment_bytes, InMemoryIndexBuilder::new())
    }

    /// Start with `initial` as the back buffer. Segments are appended at the
    /// stream's current position.
    pub fn with_initial(
        out: W,
        max_segment_bytes: u64,
        initial: InMemoryIndexBuilder,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let failure = Arc::new(Mutex::new(None));
        let writer = {
            let failure = Arc::clone(&failure);
            thread::Builder::new()
                .name("trigrep-flush".into())
                .spawn(move || run_writer(out, receiver, failure))?
        };

        Ok(Self {
            buffers: FlippingBuffer::new(Slot::new(InMemoryIndexBuilder::new()), Slot::new(initial)),
            max_segment_bytes,
            sender: Some(sender),
            writer: Some(writer),
            failure,
            segments_sent: AtomicUsize::new(0),
        })
    }

    /// Add one document. Thread-safe; never waits for a flush to finish.
    ///
    /// Fails once any earlier background flush has failed.
    pub fn add_document(&self, path: impl Into<String>, mod_time: i64, trigrams: &[Trigram]) -> Result<()> {
        self.check_failure()?;
        let size = self.buffers.with_back(|slot| {
            slot.builder.add_document(path, mod_time, trigrams);
            slot.builder.estimated_size()
        });
        if size > self.max_segment_bytes {
            self.try_flush()?;
        }
        Ok(())
    }

    fn try_flush(&self) -> Result<()> {
        let flipped = self.buffers.flip(|front, back| {
            // the previous segment must be written and cleared first
            let ready = !front.flushing.load(Ordering::Acquire)
                && back.builder.estimated_size() > self.max_segment_bytes;
            if ready {
                back.flushing.store(true, Ordering::Release);
            }
            ready
        });
        if flipped {
            let full = self.buffers.with_front(Arc::clone);
            tracing::debug!(
                documents = full.builder.document_count(),
                estimated = full.builder.estimated_size(),
                "flipping segment buffers"
            );
            self.send(full)?;
        }
        Ok(())
    }

    fn send(&self, slot: Arc<Slot>) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| IndexError::FlushFailed {
                reason: "builder already completed".into(),
            })?;
        sender.send(slot).map_err(|_| IndexError::FlushFailed {
            reason: "writer thread exited".into(),
        })?;
        self.segments_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.lock().as_ref() {
            Some(reason) => Err(IndexError::FlushFailed {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Segments handed to the writer so far
    pub fn segments_flushed(&self) -> usize {
        self.segments_sent.load(Ordering::Relaxed)
    }

    /// Flush whatever is buffered, wait for the writer and return the output.
    ///
    /// The trailing buffer is skipped when it is empty and earlier segments
    /// were written; an index with no documents at all still gets one empty
    /// segment.
    pub fn complete(mut self) -> Result<W> {
        self.buffers.flip(|_, _| true);
        let last = self.buffers.with_front(Arc::clone);
        if !last.builder.is_empty() || self.segments_flushed() == 0 {
            last.flushing.store(true, Ordering::Release);
            self.send(last)?;
        }

        drop(self.sender.take());
        let writer = self.writer.take().ok_or_else(|| IndexError::FlushFailed {
            reason: "writer thread missing".into(),
        })?;
        let out = writer.join().map_err(|_| IndexError::FlushFailed {
            reason: "writer thread panicked".into(),
        })??;
        tracing::debug!(segments = self.segments_flushed(), "index complete");
        Ok(out)
    }
}

impl MultiIndexBuilder<File> {
    /// Reopen an index file for appending.
    ///
    /// The last segment is loaded back into memory and cut off the file, so
    /// it is rewritten, together with anything added now, on completion.
    /// Completing without adding anything reproduces the file byte for byte.
    pub fn open_append_only(path: &Path, max_segment_bytes: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let ranges = MultiIndex::read_structure(&mut file)?;
        let initial = match ranges.last() {
            Some(last) => {
                file.seek(SeekFrom::Start(last.start))?;
                let reader = IndexReader::from_stream(&mut BufReader::new(&mut file))?;
                let builder = reader.to_writable()?;
                file.set_len(last.start)?;
                file.seek(SeekFrom::Start(last.start))?;
                tracing::info!(
                    segments = ranges.len(),
                    documents = builder.document_count(),
                    "resuming index"
                );
                builder
            }
            None => {
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                InMemoryIndexBuilder::new()
            }
        };
        Self::with_initial(file, max_segment_bytes, initial)
    }
}

fn run_writer<W: Write + Seek>(
    mut out: W,
    receiver: Receiver<Arc<Slot>>,
    failure: Arc<Mutex<Option<String>>>,
) -> Result<W> {
    let mut first_error = None;
    for slot in receiver {
        if first_error.is_none() {
            match slot.builder.save_to(&mut out) {
                Ok(preamble) => tracing::debug!(bytes = preamble.length, "segment flushed"),
                Err(e) => {
                    tracing::warn!(error = %e, "segment flush failed");
                    *failure.lock() = Some(e.to_string());
                    first_error = Some(e);
                }
            }
        }
        slot.builder.clear();
        slot.flushing.store(false, Ordering::Release);
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            out.flush()?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn t(v: u32) -> Trigram {
        Trigram::new(v)
    }

    #[test]
    fn test_single_segment_when_small() {
        let builder = MultiIndexBuilder::new(Cursor::new(Vec::new()), u64::MAX).unwrap();
        builder.add_document("a", 1, &[t(1), t(2)]).unwrap();
        builder.add_document("b", 2, &[t(2)]).unwrap();
        let bytes = builder.complete().unwrap().into_inner();

        let index = MultiIndex::from_bytes(bytes).unwrap();
        assert_eq!(index.segment_count(), 1);
        assert_eq!(index.read_all_doc_nodes().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_index_has_one_segment() {
        let builder = MultiIndexBuilder::new(Cursor::new(Vec::new()), 10).unwrap();
        let bytes = builder.complete().unwrap().into_inner();
        let index = MultiIndex::from_bytes(bytes).unwrap();
        assert_eq!(index.segment_count(), 1);
        assert!(index.read_all_doc_nodes().unwrap().is_empty());
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingWriter {
        fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_flush_failure_surfaces_on_complete() {
        let builder = MultiIndexBuilder::new(FailingWriter, u64::MAX).unwrap();
        builder.add_document("a", 1, &[t(1)]).unwrap();
        assert!(builder.complete().is_err());
    }

    #[test]
    fn test_intermediate_flush_failure_surfaces_eagerly() {
        let builder = MultiIndexBuilder::new(FailingWriter, 0).unwrap();
        // first add flips and fails in the background
        builder.add_document("a", 1, &[t(1)]).unwrap();
        let mut saw_failure = false;
        for i in 0..5_000 {
            if builder.add_document(format!("f{}", i), 1, &[t(1)]).is_err() {
                saw_failure = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(saw_failure);
        assert!(builder.complete().is_err());
    }
}
