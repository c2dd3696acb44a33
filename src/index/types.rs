use crate::error::{IndexError, Result};
use crate::utils::{read_i32_at, read_i64_at, read_u32_at, write_i32_le, write_i64_le, write_u32_le};
use std::fmt;
use std::io::{self, Read, Write};

/// Dense, zero-based document identifier inside one segment.
/// `-1` marks a tombstoned document inside a live builder.
pub type DocId = i32;

pub const TOMBSTONE: DocId = -1;

/// Magic word at the start of every segment
pub const MAGIC: [u8; 8] = *b"IDX_ULEX";

/// Current format version
pub const FORMAT_VERSION: i32 = 1;

/// Modification stamp of the sentinel row closing the documents table
pub const SENTINEL_STAMP: i64 = 0x0EED_FEED_FEED_FEED;

/// A 24-bit index key: either three hashed code points packed as
/// `(a << 16) | (b << 8) | c`, or the hash of a longer sparse n-gram.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Trigram(u32);

impl Trigram {
    pub const MASK: u32 = 0x00FF_FFFF;
    /// Number of distinct trigram values
    pub const SPACE: usize = 1 << 24;

    #[inline]
    pub const fn new(value: u32) -> Self {
        Trigram(value & Self::MASK)
    }

    #[inline]
    pub const fn from_bytes(a: u8, b: u8, c: u8) -> Self {
        Trigram(((a as u32) << 16) | ((b as u32) << 8) | (c as u32))
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn a(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn c(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Debug for Trigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = |b: u8| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
        write!(
            f,
            "Trigram({:06x} \"{}{}{}\")",
            self.0,
            printable(self.a()),
            printable(self.b()),
            printable(self.c())
        )
    }
}

/// A document's identity record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocNode {
    pub doc_id: DocId,
    pub path: String,
    pub last_write_time: i64,
}

impl DocNode {
    pub fn new(doc_id: DocId, path: impl Into<String>, last_write_time: i64) -> Self {
        Self {
            doc_id,
            path: path.into(),
            last_write_time,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.doc_id == TOMBSTONE
    }
}

/// Fixed-size row of the documents table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocRow {
    pub path_offset: u32,
    pub mod_stamp: i64,
}

impl DocRow {
    /// Size of a row in bytes
    pub const SIZE: usize = 4 + 8;

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u32_le(writer, self.path_offset)?;
        write_i64_le(writer, self.mod_stamp)
    }

    pub fn parse(buf: &[u8], offset: usize) -> Option<Self> {
        Some(Self {
            path_offset: read_u32_at(buf, offset)?,
            mod_stamp: read_i64_at(buf, offset + 4)?,
        })
    }
}

/// Location of one trigram's posting list.
/// `offset` is relative to the start of the posting-list section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrigramBlock {
    pub trigram: Trigram,
    pub offset: u64,
    pub length: u32,
}

/// Fixed-size segment header. Every offset is relative to the segment's own
/// first byte, which is what makes segments concatenable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preamble {
    pub format_version: i32,
    pub strings_offset: i64,
    pub documents_table_offset: i64,
    pub trigram_index_offset: i64,
    pub length: i64,
}

impl Preamble {
    /// magic + version + 4 offsets
    pub const SIZE: usize = 8 + 4 + 8 * 4;

    pub fn new(
        strings_offset: i64,
        documents_table_offset: i64,
        trigram_index_offset: i64,
        length: i64,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            strings_offset,
            documents_table_offset,
            trigram_index_offset,
            length,
        }
    }

    /// Posting lists start immediately after the header
    #[inline]
    pub fn posting_list_offset(&self) -> i64 {
        Self::SIZE as i64
    }

    /// Number of rows in the documents table, including the sentinel row
    pub fn document_rows(&self) -> i64 {
        (self.trigram_index_offset - self.documents_table_offset) / DocRow::SIZE as i64
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&MAGIC)?;
        write_i32_le(writer, self.format_version)?;
        write_i64_le(writer, self.strings_offset)?;
        write_i64_le(writer, self.documents_table_offset)?;
        write_i64_le(writer, self.trigram_index_offset)?;
        write_i64_le(writer, self.length)
    }

    /// Read a header from the reader's current position
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;
        Self::parse(&buf)
    }

    /// Parse and validate a header from the first bytes of `buf`
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(IndexError::corrupted("segment shorter than its header"));
        }
        if buf[..8] != MAGIC {
            return Err(IndexError::InvalidMagic);
        }
        let field = |offset| read_i64_at(buf, offset).unwrap_or(-1);
        let preamble = Self {
            format_version: read_i32_at(buf, 8).unwrap_or(-1),
            strings_offset: field(12),
            documents_table_offset: field(20),
            trigram_index_offset: field(28),
            length: field(36),
        };
        if preamble.format_version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: preamble.format_version,
            });
        }
        preamble.validate()?;
        Ok(preamble)
    }

    fn validate(&self) -> Result<()> {
        let ordered = self.posting_list_offset() <= self.strings_offset
            && self.strings_offset <= self.documents_table_offset
            && self.documents_table_offset <= self.trigram_index_offset
            && self.trigram_index_offset <= self.length;
        if !ordered {
            return Err(IndexError::corrupted(format!(
                "section offsets out of order: {:?}",
                self
            )));
        }
        let table = self.trigram_index_offset - self.documents_table_offset;
        if table < DocRow::SIZE as i64 || table % DocRow::SIZE as i64 != 0 {
            return Err(IndexError::corrupted(format!(
                "documents table of {} bytes is not a whole number of rows",
                table
            )));
        }
        Ok(())
    }
}
