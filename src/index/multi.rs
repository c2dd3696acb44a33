use crate::error::{IndexError, Result};
use crate::index::reader::{IndexBytes, IndexReader};
use crate::index::state::{IndexState, PathAndStamp};
use crate::index::stats::SegmentStats;
use crate::index::types::{DocNode, Preamble};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Location of one segment inside an index file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRange {
    pub start: u64,
    pub length: u64,
    pub preamble: Preamble,
}

/// An index file made of concatenated segments.
///
/// Segments are independent: each has its own doc id space, so results from
/// different segments are simply concatenated. A path indexed twice shows up
/// twice.
#[derive(Debug)]
pub struct MultiIndex {
    segments: Vec<IndexReader>,
}

impl MultiIndex {
    /// Memory-map and open an index file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let bytes = Arc::new(IndexBytes::map_file(&file)?);
        Self::from_shared(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_shared(Arc::new(IndexBytes::Owned(bytes)))
    }

    fn from_shared(bytes: Arc<IndexBytes>) -> Result<Self> {
        let mut segments = Vec::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            let reader = IndexReader::open(Arc::clone(&bytes), pos)?;
            pos += reader.preamble().length as usize;
            segments.push(reader);
        }
        tracing::debug!(segments = segments.len(), bytes = bytes.len(), "opened index");
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[IndexReader] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Query every segment in parallel; results keep segment order
    pub fn containing_str(&self, text: &str, case_sensitive: bool) -> Result<Vec<DocNode>> {
        let per_segment: Vec<Vec<DocNode>> = self
            .segments
            .par_iter()
            .map(|segment| segment.containing_str(text, case_sensitive))
            .collect::<Result<_>>()?;
        Ok(per_segment.into_iter().flatten().collect())
    }

    pub fn read_all_doc_nodes(&self) -> Result<Vec<DocNode>> {
        let mut nodes = Vec::new();
        for segment in &self.segments {
            nodes.extend(segment.read_all_doc_nodes()?);
        }
        Ok(nodes)
    }

    /// Every distinct indexed path, sorted
    pub fn read_paths(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .read_all_doc_nodes()?
            .into_iter()
            .map(|doc| doc.path)
            .collect())
    }

    /// Snapshot of which indexed file versions match `query`
    pub fn create_index_state_for_query(&self, query: &str, case_sensitive: bool) -> Result<IndexState> {
        let all = self.read_all_doc_nodes()?;
        let matching = self.containing_str(query, case_sensitive)?;
        Ok(IndexState::new(
            all.iter().map(PathAndStamp::from),
            matching.iter().map(PathAndStamp::from),
        ))
    }

    pub fn stats(&self) -> SegmentStats {
        self.segments.iter().map(IndexReader::stats).sum()
    }

    /// Walk the segment headers of a stream without decoding any segment.
    /// The stream position is unspecified afterwards.
    pub fn read_structure<R: Read + Seek>(stream: &mut R) -> Result<Vec<SegmentRange>> {
        let end = stream.seek(SeekFrom::End(0))?;
        let mut ranges = Vec::new();
        let mut pos = 0u64;
        while pos < end {
            stream.seek(SeekFrom::Start(pos))?;
            let preamble = Preamble::read_from(stream)?;
            let length = preamble.length as u64;
            if pos + length > end {
                return Err(IndexError::corrupted(format!(
                    "segment at {} runs {} bytes past end of file",
                    pos,
                    pos + length - end
                )));
            }
            ranges.push(SegmentRange {
                start: pos,
                length,
                preamble,
            });
            pos += length;
        }
        Ok(ranges)
    }
}
