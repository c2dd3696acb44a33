//! In-memory index builder and segment serializer.
//!
//! Segment layout (all offsets relative to the segment's first byte):
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Preamble (44 bytes)                          │
//! │  magic "IDX_ULEX", version: i32              │
//! │  strings, documents table, trigram index     │
//! │  offsets and total length: i64              │
//! ├──────────────────────────────────────────────┤
//! │ Posting lists                                │
//! │  per trigram, ascending: delta varints       │
//! ├──────────────────────────────────────────────┤
//! │ Strings blob: UTF-8 paths, no separators     │
//! ├──────────────────────────────────────────────┤
//! │ Documents table: N+1 rows                    │
//! │  path_offset: u32, mod_stamp: i64            │
//! │  last row is the sentinel                    │
//! ├──────────────────────────────────────────────┤
//! │ Trigram directory                            │
//! │  varint count                                │
//! │  count * (varint Δtrigram, varint length)    │
//! │  terminator 0x00 0x00                        │
//! └──────────────────────────────────────────────┘
//! ```

use crate::error::{IndexError, Result};
use crate::index::types::*;
use crate::utils::{encode_varint, write_varint};
use parking_lot::{Mutex, MutexGuard};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Postings are sharded by the top bits of the trigram. Shards are visited in
/// index order, so sorting each shard yields ascending trigram order overall.
const SHARD_BITS: u32 = 12;
const SHARD_COUNT: usize = 1 << SHARD_BITS;
const SHARD_SHIFT: u32 = 24 - SHARD_BITS;

#[inline]
fn shard_of(trigram: Trigram) -> usize {
    (trigram.value() >> SHARD_SHIFT) as usize
}

#[inline]
fn pack(trigram: Trigram, doc_id: DocId) -> u64 {
    ((trigram.value() as u64) << 32) | (doc_id as u32 as u64)
}

/// Accumulates documents and trigram postings from many threads, then
/// serializes them as one segment.
pub struct InMemoryIndexBuilder {
    documents: Mutex<Vec<DocNode>>,
    document_count: AtomicU64,
    shards: Box<[Mutex<Vec<u64>>]>,
    total_trigrams: AtomicU64,
}

impl Default for InMemoryIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIndexBuilder {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
            document_count: AtomicU64::new(0),
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(Vec::new())).collect(),
            total_trigrams: AtomicU64::new(0),
        }
    }

    /// Start from an existing, already numbered document list
    pub fn from_documents(documents: Vec<DocNode>) -> Result<Self> {
        ensure_documents_sorted(&documents)?;
        let builder = Self::new();
        builder
            .document_count
            .store(documents.len() as u64, Ordering::Relaxed);
        *builder.documents.lock() = documents;
        Ok(builder)
    }

    /// Register a document and its trigram set. Thread-safe.
    pub fn add_document(&self, path: impl Into<String>, mod_time: i64, trigrams: &[Trigram]) -> DocId {
        let doc_id = {
            let mut documents = self.documents.lock();
            let doc_id = documents.len() as DocId;
            documents.push(DocNode::new(doc_id, path, mod_time));
            doc_id
        };
        self.document_count.fetch_add(1, Ordering::Relaxed);

        // Input is usually sorted, so consecutive trigrams share a shard lock
        let mut current = usize::MAX;
        let mut guard: Option<MutexGuard<'_, Vec<u64>>> = None;
        for &trigram in trigrams {
            let shard = shard_of(trigram);
            if shard != current {
                drop(guard.take());
                guard = Some(self.shards[shard].lock());
                current = shard;
            }
            if let Some(postings) = guard.as_mut() {
                postings.push(pack(trigram, doc_id));
            }
        }
        drop(guard);

        self.total_trigrams
            .fetch_add(trigrams.len() as u64, Ordering::Relaxed);
        doc_id
    }

    /// Bulk-append postings of one trigram. Thread-safe.
    pub fn add_trigrams(&self, trigram: Trigram, doc_ids: &[DocId]) {
        if doc_ids.is_empty() {
            return;
        }
        let mut postings = self.shards[shard_of(trigram)].lock();
        postings.extend(doc_ids.iter().map(|&id| pack(trigram, id)));
        self.total_trigrams
            .fetch_add(doc_ids.len() as u64, Ordering::Relaxed);
    }

    /// Tombstone a document; its postings are dropped at serialization
    pub fn mark_as_removed(&self, doc_id: DocId) -> Result<()> {
        let mut documents = self.documents.lock();
        match usize::try_from(doc_id).ok().and_then(|i| documents.get_mut(i)) {
            Some(doc) => {
                doc.doc_id = TOMBSTONE;
                Ok(())
            }
            None => Err(IndexError::invariant(format!(
                "cannot remove unknown document {}",
                doc_id
            ))),
        }
    }

    /// Rough memory footprint, used only as a flush trigger
    pub fn estimated_size(&self) -> u64 {
        self.total_trigrams.load(Ordering::Relaxed) * 2
            + self.document_count.load(Ordering::Relaxed) * 64
    }

    /// Documents added so far, tombstones included
    pub fn document_count(&self) -> usize {
        self.document_count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.document_count() == 0
    }

    /// Snapshot of the document list
    pub fn documents(&self) -> Vec<DocNode> {
        self.documents.lock().clone()
    }

    /// Serialize as one segment starting at the stream's current position.
    ///
    /// Holds the document lock for the whole write; callers must not add to
    /// this builder while it is being saved.
    pub fn save_to<W: Write + Seek>(&self, stream: &mut W) -> Result<Preamble> {
        let documents = self.documents.lock();
        ensure_documents_sorted(&documents)?;

        // old id -> new id with tombstone holes squeezed out
        let mut holes = 0;
        let lookup: Vec<DocId> = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                if doc.is_removed() {
                    holes += 1;
                    TOMBSTONE
                } else {
                    i as DocId - holes
                }
            })
            .collect();

        let mut out = RelativeWriter::new(stream)?;
        // placeholder, rewritten once the offsets are known
        Preamble::default().write_to(&mut out)?;

        let mut writer = BufWriter::with_capacity(1 << 16, &mut out);
        let mut pos = Preamble::SIZE as u64;

        let mut directory: Vec<(Trigram, u32)> = Vec::with_capacity(0xFF00);
        let mut encoded = Vec::new();
        for shard in self.shards.iter() {
            let mut postings = shard.lock();
            if postings.is_empty() {
                continue;
            }
            postings.sort_unstable();
            postings.dedup();

            for run in postings.chunk_by(|a, b| a >> 32 == b >> 32) {
                let trigram = Trigram::new((run[0] >> 32) as u32);
                encoded.clear();
                let mut prev = 0u32;
                for &posting in run {
                    let old = posting as u32 as usize;
                    let new = *lookup.get(old).ok_or_else(|| {
                        IndexError::invariant(format!(
                            "posting of {:?} references unknown document {}",
                            trigram, old
                        ))
                    })?;
                    if new == TOMBSTONE {
                        continue;
                    }
                    let new = new as u32;
                    encode_varint(new - prev, &mut encoded);
                    prev = new;
                }
                // every document of this trigram was removed
                if encoded.is_empty() {
                    continue;
                }
                writer.write_all(&encoded)?;
                pos += encoded.len() as u64;
                directory.push((trigram, encoded.len() as u32));
            }
        }

        let strings_offset = pos;
        let mut rows = Vec::with_capacity(documents.len() + 1);
        let mut path_offset = 0u64;
        for doc in documents.iter().filter(|d| !d.is_removed()) {
            rows.push(DocRow {
                path_offset: path_offset as u32,
                mod_stamp: doc.last_write_time,
            });
            writer.write_all(doc.path.as_bytes())?;
            path_offset += doc.path.len() as u64;
        }
        if path_offset > u32::MAX as u64 {
            return Err(IndexError::invariant(format!(
                "{} bytes of paths do not fit one segment",
                path_offset
            )));
        }
        rows.push(DocRow {
            path_offset: path_offset as u32,
            mod_stamp: SENTINEL_STAMP,
        });
        pos += path_offset;

        let documents_table_offset = pos;
        for row in &rows {
            row.write_to(&mut writer)?;
        }
        pos += (rows.len() * DocRow::SIZE) as u64;

        let trigram_index_offset = pos;
        pos += write_varint(&mut writer, directory.len() as u32)? as u64;
        let mut prev = 0u32;
        for &(trigram, length) in &directory {
            pos += write_varint(&mut writer, trigram.value() - prev)? as u64;
            pos += write_varint(&mut writer, length)? as u64;
            prev = trigram.value();
        }
        writer.write_all(&[0, 0])?;
        pos += 2;

        writer.flush()?;
        drop(writer);

        let preamble = Preamble::new(
            strings_offset as i64,
            documents_table_offset as i64,
            trigram_index_offset as i64,
            pos as i64,
        );
        out.seek(SeekFrom::Start(0))?;
        preamble.write_to(&mut out)?;
        out.seek(SeekFrom::Start(pos))?;
        out.flush()?;

        tracing::debug!(
            documents = rows.len() - 1,
            removed = holes,
            trigrams = directory.len(),
            bytes = pos,
            "segment written"
        );
        Ok(preamble)
    }

    /// Reset for reuse; the shard array itself is kept
    pub fn clear(&self) {
        let mut documents = self.documents.lock();
        documents.clear();
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
        self.document_count.store(0, Ordering::Relaxed);
        self.total_trigrams.store(0, Ordering::Relaxed);
    }
}

/// Every live document must sit at the index equal to its id
fn ensure_documents_sorted(documents: &[DocNode]) -> Result<()> {
    for (i, doc) in documents.iter().enumerate() {
        if doc.doc_id != i as DocId && !doc.is_removed() {
            return Err(IndexError::invariant(format!(
                "document {:?} has id {} at position {}",
                doc.path, doc.doc_id, i
            )));
        }
    }
    Ok(())
}

/// Write + Seek view whose position 0 is wherever the inner stream stood
/// when the view was created.
pub struct RelativeWriter<W> {
    inner: W,
    origin: u64,
}

impl<W: Seek> RelativeWriter<W> {
    pub fn new(mut inner: W) -> io::Result<Self> {
        let origin = inner.stream_position()?;
        Ok(Self { inner, origin })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RelativeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Seek> Seek for RelativeWriter<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let absolute = match pos {
            SeekFrom::Start(offset) => self.inner.seek(SeekFrom::Start(self.origin + offset))?,
            other => self.inner.seek(other)?,
        };
        absolute.checked_sub(self.origin).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before segment start")
        })
    }
}
