use crate::error::{IndexError, Result};
use crate::index::builder::InMemoryIndexBuilder;
use crate::index::stats::SegmentStats;
use crate::index::types::*;
use crate::query::{plan_literal, LiteralPlan, PostingSource, Query};
use crate::utils::{decode_varint, delta_decode};
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// Backing storage shared by every segment reader of one index file
#[derive(Debug)]
pub enum IndexBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl IndexBytes {
    /// Map a file read-only. An empty file cannot be mapped and yields an
    /// empty owned buffer instead.
    pub fn map_file(file: &File) -> io::Result<Self> {
        if file.metadata()?.len() == 0 {
            return Ok(IndexBytes::Owned(Vec::new()));
        }
        // The index file is only ever appended to by a single writer; readers
        // open it after the writer has completed.
        let mmap = unsafe { Mmap::map(file)? };
        Ok(IndexBytes::Mapped(mmap))
    }
}

impl Deref for IndexBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            IndexBytes::Mapped(m) => m,
            IndexBytes::Owned(v) => v,
        }
    }
}

/// Trigram directory entry; `offset` is relative to the posting section
#[derive(Debug, Clone, Copy)]
struct DirEntry {
    trigram: Trigram,
    offset: u64,
}

/// Read-only view of one serialized segment.
///
/// The trigram directory is decoded eagerly on open; posting lists, the
/// documents table and the strings blob are read on demand.
#[derive(Debug)]
pub struct IndexReader {
    bytes: Arc<IndexBytes>,
    start: usize,
    preamble: Preamble,
    directory: Vec<DirEntry>,
    postings_len: u64,
    path_lookup: OnceLock<FxHashMap<String, DocNode>>,
}

impl IndexReader {
    /// Open the segment starting at byte `start` of `bytes`
    pub fn open(bytes: Arc<IndexBytes>, start: usize) -> Result<Self> {
        let header = bytes
            .get(start..)
            .ok_or_else(|| IndexError::corrupted("segment starts past end of file"))?;
        let preamble = Preamble::parse(header)?;

        let length = preamble.length as usize;
        if header.len() < length {
            return Err(IndexError::corrupted(format!(
                "segment at {} claims {} bytes, only {} available",
                start,
                length,
                header.len()
            )));
        }

        let mut reader = Self {
            bytes,
            start,
            preamble,
            directory: Vec::new(),
            postings_len: 0,
            path_lookup: OnceLock::new(),
        };
        reader.load_directory()?;
        tracing::debug!(
            start,
            length,
            documents = reader.document_count(),
            trigrams = reader.directory.len(),
            "opened segment"
        );
        Ok(reader)
    }

    /// Open a single segment held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::open(Arc::new(IndexBytes::Owned(bytes)), 0)
    }

    /// Read exactly one segment from the stream's current position, leaving
    /// the stream positioned right after it.
    pub fn from_stream<R: Read>(stream: &mut R) -> Result<Self> {
        let preamble = Preamble::read_from(stream)?;
        let body = (preamble.length as u64).saturating_sub(Preamble::SIZE as u64);
        let mut buf = Vec::with_capacity(Preamble::SIZE);
        preamble.write_to(&mut buf)?;
        // the header length is untrusted, so only what the stream holds is allocated
        let read = stream.by_ref().take(body).read_to_end(&mut buf)?;
        if (read as u64) < body {
            return Err(IndexError::corrupted(format!(
                "segment claims {} bytes, stream ended after {}",
                preamble.length,
                Preamble::SIZE + read
            )));
        }
        Self::from_bytes(buf)
    }

    fn segment(&self) -> &[u8] {
        &self.bytes[self.start..self.start + self.preamble.length as usize]
    }

    fn load_directory(&mut self) -> Result<()> {
        let p = self.preamble;
        let dir = &self.segment()[p.trigram_index_offset as usize..];
        let truncated = || IndexError::corrupted("trigram directory is truncated");

        let (count, mut pos) = decode_varint(dir).ok_or_else(truncated)?;
        // two bytes at least per entry
        let mut entries = Vec::with_capacity((count as usize).min(dir.len() / 2));
        let mut trigram = 0u32;
        let mut offset = 0u64;
        for i in 0..count {
            let (delta, n) = decode_varint(&dir[pos..]).ok_or_else(truncated)?;
            pos += n;
            let (length, n) = decode_varint(&dir[pos..]).ok_or_else(truncated)?;
            pos += n;

            if i > 0 && delta == 0 {
                return Err(IndexError::corrupted("trigram directory is not sorted"));
            }
            trigram = trigram
                .checked_add(delta)
                .filter(|t| *t <= Trigram::MASK)
                .ok_or_else(|| IndexError::corrupted("trigram directory value out of range"))?;
            entries.push(DirEntry {
                trigram: Trigram::new(trigram),
                offset,
            });
            offset += length as u64;
        }

        if dir.get(pos..pos + 2) != Some(&[0u8, 0][..]) {
            return Err(IndexError::corrupted("trigram directory has no terminator"));
        }
        if pos + 2 != dir.len() {
            return Err(IndexError::corrupted(format!(
                "{} unexpected bytes after the trigram directory",
                dir.len() - pos - 2
            )));
        }
        let section = (p.strings_offset - p.posting_list_offset()) as u64;
        if offset != section {
            return Err(IndexError::corrupted(format!(
                "posting lengths add up to {} bytes, section holds {}",
                offset, section
            )));
        }

        self.directory = entries;
        self.postings_len = offset;
        Ok(())
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    /// Byte offset of this segment inside its backing storage
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of live documents in the segment
    pub fn document_count(&self) -> usize {
        (self.preamble.document_rows() - 1) as usize
    }

    pub fn trigram_count(&self) -> usize {
        self.directory.len()
    }

    /// All trigrams in ascending order
    pub fn trigrams(&self) -> impl Iterator<Item = Trigram> + '_ {
        self.directory.iter().map(|e| e.trigram)
    }

    /// Binary search the directory
    pub fn try_find_trigram_block(&self, trigram: Trigram) -> Option<TrigramBlock> {
        let i = self
            .directory
            .binary_search_by_key(&trigram, |e| e.trigram)
            .ok()?;
        Some(self.block_at(i))
    }

    fn block_at(&self, i: usize) -> TrigramBlock {
        let entry = self.directory[i];
        let end = self
            .directory
            .get(i + 1)
            .map_or(self.postings_len, |next| next.offset);
        TrigramBlock {
            trigram: entry.trigram,
            offset: entry.offset,
            length: (end - entry.offset) as u32,
        }
    }

    /// Decode one posting list into ascending doc ids
    pub fn read_document_ids(&self, block: &TrigramBlock) -> Result<Vec<DocId>> {
        let start = self.preamble.posting_list_offset() as usize + block.offset as usize;
        let bytes = self
            .segment()
            .get(start..start + block.length as usize)
            .ok_or_else(|| IndexError::corrupted("posting list out of bounds"))?;
        let ids = delta_decode(bytes).ok_or_else(|| {
            IndexError::corrupted(format!("posting list of {:?} is truncated", block.trigram))
        })?;

        let count = self.document_count();
        match ids.last() {
            Some(&last) if last as usize >= count => Err(IndexError::corrupted(format!(
                "posting list of {:?} references document {} of {}",
                block.trigram, last, count
            ))),
            _ => Ok(ids.into_iter().map(|id| id as DocId).collect()),
        }
    }

    fn row(&self, i: usize) -> Result<DocRow> {
        let offset = self.preamble.documents_table_offset as usize + i * DocRow::SIZE;
        DocRow::parse(self.segment(), offset)
            .ok_or_else(|| IndexError::corrupted("documents table out of bounds"))
    }

    fn path_between(&self, row: &DocRow, next: &DocRow) -> Result<String> {
        let p = &self.preamble;
        let strings = &self.segment()[p.strings_offset as usize..p.documents_table_offset as usize];
        let bytes = strings
            .get(row.path_offset as usize..next.path_offset as usize)
            .ok_or_else(|| {
                IndexError::corrupted(format!(
                    "path bounds {}..{} outside the strings blob",
                    row.path_offset, next.path_offset
                ))
            })?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| IndexError::corrupted("document path is not valid UTF-8"))
    }

    /// Decode every document in id order
    pub fn read_all_doc_nodes(&self) -> Result<Vec<DocNode>> {
        let count = self.document_count();
        let mut nodes = Vec::with_capacity(count);
        let mut row = self.row(0)?;
        for i in 0..count {
            let next = self.row(i + 1)?;
            let path = self.path_between(&row, &next)?;
            nodes.push(DocNode::new(i as DocId, path, row.mod_stamp));
            row = next;
        }
        Ok(nodes)
    }

    pub fn read_doc_node_by_id(&self, doc_id: DocId) -> Result<DocNode> {
        let i = usize::try_from(doc_id)
            .ok()
            .filter(|&i| i < self.document_count())
            .ok_or_else(|| {
                IndexError::corrupted(format!(
                    "document {} out of range 0..{}",
                    doc_id,
                    self.document_count()
                ))
            })?;
        let row = self.row(i)?;
        let next = self.row(i + 1)?;
        Ok(DocNode::new(doc_id, self.path_between(&row, &next)?, row.mod_stamp))
    }

    /// Evaluate a query to sorted doc ids
    pub fn evaluate_ids(&self, query: &Query) -> Result<Vec<DocId>> {
        query.evaluate(self)
    }

    pub fn evaluate(&self, query: &Query) -> Result<Vec<DocNode>> {
        let ids = self.evaluate_ids(query)?;
        self.materialize(&ids)
    }

    fn materialize(&self, ids: &[DocId]) -> Result<Vec<DocNode>> {
        ids.iter().map(|&id| self.read_doc_node_by_id(id)).collect()
    }

    /// Documents whose key set is compatible with containing `text`
    pub fn containing_str(&self, text: &str, case_sensitive: bool) -> Result<Vec<DocNode>> {
        match plan_literal(text, case_sensitive) {
            LiteralPlan::All => self.read_all_doc_nodes(),
            LiteralPlan::Short(pattern) => {
                let query = Query::Or(
                    self.trigrams()
                        .filter(|t| pattern.matches(*t))
                        .map(Query::Contains)
                        .collect(),
                );
                self.evaluate(&query)
            }
            LiteralPlan::Indexed(query) => self.evaluate(&query),
        }
    }

    /// Every posting list in ascending trigram order
    pub fn read_all_posting_lists(&self) -> Result<Vec<(Trigram, Vec<DocId>)>> {
        (0..self.directory.len())
            .map(|i| {
                let block = self.block_at(i);
                Ok((block.trigram, self.read_document_ids(&block)?))
            })
            .collect()
    }

    /// Load the whole segment back into a mutable builder
    pub fn to_writable(&self) -> Result<InMemoryIndexBuilder> {
        let builder = InMemoryIndexBuilder::from_documents(self.read_all_doc_nodes()?)?;
        for (trigram, ids) in self.read_all_posting_lists()? {
            builder.add_trigrams(trigram, &ids);
        }
        Ok(builder)
    }

    /// Lazily built map from path to document
    pub fn path_lookup(&self) -> Result<&FxHashMap<String, DocNode>> {
        if let Some(map) = self.path_lookup.get() {
            return Ok(map);
        }
        let map = self
            .read_all_doc_nodes()?
            .into_iter()
            .map(|doc| (doc.path.clone(), doc))
            .collect();
        Ok(self.path_lookup.get_or_init(|| map))
    }

    /// Size breakdown of the segment's sections
    pub fn stats(&self) -> SegmentStats {
        let p = &self.preamble;
        SegmentStats {
            segments: 1,
            documents: self.document_count() as u64,
            trigrams: self.directory.len() as u64,
            header_bytes: Preamble::SIZE as u64,
            posting_bytes: self.postings_len,
            string_bytes: (p.documents_table_offset - p.strings_offset) as u64,
            table_bytes: (p.trigram_index_offset - p.documents_table_offset) as u64,
            directory_bytes: (p.length - p.trigram_index_offset) as u64,
        }
    }
}

impl PostingSource for IndexReader {
    fn postings(&self, trigram: Trigram) -> Result<Vec<DocId>> {
        match self.try_find_trigram_block(trigram) {
            Some(block) => self.read_document_ids(&block),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::extract_trigrams;
    use std::io::Cursor;

    fn build(docs: &[(&str, &str)]) -> IndexReader {
        let builder = InMemoryIndexBuilder::new();
        for (i, (path, content)) in docs.iter().enumerate() {
            builder.add_document(*path, i as i64 * 10, &extract_trigrams(content));
        }
        let mut buf = Cursor::new(Vec::new());
        builder.save_to(&mut buf).unwrap();
        IndexReader::from_bytes(buf.into_inner()).unwrap()
    }

    fn paths(nodes: &[DocNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.path.as_str()).collect()
    }

    #[test]
    fn test_foo_bar_foobar() {
        let reader = build(&[("1", "foo"), ("2", "bar"), ("3", "foobar")]);
        assert_eq!(paths(&reader.containing_str("foo", true).unwrap()), ["1", "3"]);
        assert!(reader.containing_str("baz", true).unwrap().is_empty());
        assert_eq!(reader.containing_str("", true).unwrap().len(), 3);
        assert_eq!(paths(&reader.containing_str("FOO", false).unwrap()), ["1", "3"]);
        assert!(reader.containing_str("FOO", true).unwrap().is_empty());
    }

    #[test]
    fn test_short_queries() {
        let reader = build(&[("1", "foo"), ("2", "bar"), ("3", "Xyz")]);
        // sparse keys share the directory, so a short scan may over-approximate
        assert!(paths(&reader.containing_str("oo", true).unwrap()).contains(&"1"));
        assert!(paths(&reader.containing_str("a", true).unwrap()).contains(&"2"));
        assert!(paths(&reader.containing_str("x", false).unwrap()).contains(&"3"));
    }

    #[test]
    fn test_ignore_case_finds_compatibility_letters() {
        let reader = build(&[("1", "temperature 300 \u{212A}elvin"), ("2", "Kelvin"), ("3", "cold")]);
        for query in ["kelvin", "KELVIN", "\u{212A}ELVIN"] {
            let hits = reader.containing_str(query, false).unwrap();
            assert_eq!(paths(&hits), ["1", "2"], "query {:?}", query);
        }
        assert_eq!(paths(&reader.containing_str("kelvin", true).unwrap()), Vec::<&str>::new());
        assert!(paths(&reader.containing_str("k", false).unwrap()).contains(&"1"));
    }

    #[test]
    fn test_read_doc_nodes() {
        let reader = build(&[("src/a.rs", "fn a()"), ("src/äbc.rs", "")]);
        let all = reader.read_all_doc_nodes().unwrap();
        assert_eq!(all[1], DocNode::new(1, "src/äbc.rs", 10));
        assert_eq!(reader.read_doc_node_by_id(0).unwrap(), all[0]);
        assert!(reader.read_doc_node_by_id(2).is_err());
        assert!(reader.read_doc_node_by_id(-1).is_err());
    }

    #[test]
    fn test_absent_trigram() {
        let reader = build(&[("1", "abc")]);
        assert!(reader
            .try_find_trigram_block(Trigram::from_bytes(b'z', b'z', b'z'))
            .is_none());
        let block = reader
            .try_find_trigram_block(Trigram::from_bytes(b'a', b'b', b'c'))
            .unwrap();
        assert_eq!(reader.read_document_ids(&block).unwrap(), vec![0]);
    }

    #[test]
    fn test_missing_terminator() {
        let builder = InMemoryIndexBuilder::new();
        builder.add_document("a", 1, &extract_trigrams("hello"));
        let mut buf = Cursor::new(Vec::new());
        builder.save_to(&mut buf).unwrap();
        let mut bytes = buf.into_inner();
        let n = bytes.len();
        bytes[n - 1] = 7;
        let err = IndexReader::from_bytes(bytes).err().unwrap();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("terminator"));
    }

    #[test]
    fn test_truncated_segment() {
        let builder = InMemoryIndexBuilder::new();
        builder.add_document("a", 1, &extract_trigrams("hello"));
        let mut buf = Cursor::new(Vec::new());
        builder.save_to(&mut buf).unwrap();
        let mut bytes = buf.into_inner();
        bytes.truncate(bytes.len() - 5);
        assert!(IndexReader::from_bytes(bytes.clone()).err().unwrap().is_corruption());
        assert!(IndexReader::from_stream(&mut bytes.as_slice())
            .err()
            .unwrap()
            .is_corruption());
    }

    #[test]
    fn test_from_stream_rejects_oversized_length() {
        let builder = InMemoryIndexBuilder::new();
        builder.add_document("a", 1, &extract_trigrams("hello"));
        let mut buf = Cursor::new(Vec::new());
        builder.save_to(&mut buf).unwrap();
        let mut bytes = buf.into_inner();
        bytes[36..44].copy_from_slice(&(i64::MAX / 2).to_le_bytes());

        let err = IndexReader::from_stream(&mut Cursor::new(&bytes)).err().unwrap();
        assert!(matches!(err, IndexError::Corrupted { .. }), "{:?}", err);
    }

    #[test]
    fn test_from_stream_stops_after_segment() {
        let builder = InMemoryIndexBuilder::new();
        builder.add_document("a", 1, &extract_trigrams("hello"));
        let mut buf = Cursor::new(Vec::new());
        builder.save_to(&mut buf).unwrap();
        builder.save_to(&mut buf).unwrap();
        let bytes = buf.into_inner();

        let mut stream = Cursor::new(&bytes);
        let first = IndexReader::from_stream(&mut stream).unwrap();
        assert_eq!(stream.position() as i64, first.preamble().length);
        let second = IndexReader::from_stream(&mut stream).unwrap();
        assert_eq!(stream.position() as usize, bytes.len());
        assert_eq!(
            first.read_all_doc_nodes().unwrap(),
            second.read_all_doc_nodes().unwrap()
        );
    }

    #[test]
    fn test_to_writable_roundtrip() {
        let reader = build(&[("a", "alpha beta"), ("b", "beta gamma")]);
        let mut again = Cursor::new(Vec::new());
        reader.to_writable().unwrap().save_to(&mut again).unwrap();
        assert_eq!(again.into_inner(), reader.segment());
    }

    #[test]
    fn test_path_lookup() {
        let reader = build(&[("a", "alpha"), ("b", "beta")]);
        let lookup = reader.path_lookup().unwrap();
        assert_eq!(lookup["b"].doc_id, 1);
        assert!(!lookup.contains_key("c"));
    }

    #[test]
    fn test_stats_add_up() {
        let reader = build(&[("a", "alpha"), ("b", "beta")]);
        let s = reader.stats();
        assert_eq!(s.total_bytes() as i64, reader.preamble().length);
        assert_eq!(s.documents, 2);
    }
}
