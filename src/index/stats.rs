use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Size breakdown of one segment, or the sum over several
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    pub segments: u64,
    pub documents: u64,
    pub trigrams: u64,
    pub header_bytes: u64,
    pub posting_bytes: u64,
    pub string_bytes: u64,
    pub table_bytes: u64,
    pub directory_bytes: u64,
}

impl SegmentStats {
    pub fn total_bytes(&self) -> u64 {
        self.header_bytes
            + self.posting_bytes
            + self.string_bytes
            + self.table_bytes
            + self.directory_bytes
    }
}

impl AddAssign for SegmentStats {
    fn add_assign(&mut self, rhs: Self) {
        self.segments += rhs.segments;
        self.documents += rhs.documents;
        self.trigrams += rhs.trigrams;
        self.header_bytes += rhs.header_bytes;
        self.posting_bytes += rhs.posting_bytes;
        self.string_bytes += rhs.string_bytes;
        self.table_bytes += rhs.table_bytes;
        self.directory_bytes += rhs.directory_bytes;
    }
}

impl Add for SegmentStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sum for SegmentStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl fmt::Display for SegmentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total_bytes();
        let percent = |part: u64| {
            if total == 0 {
                0.0
            } else {
                part as f64 * 100.0 / total as f64
            }
        };

        writeln!(f, "Segments:         {}", self.segments)?;
        writeln!(f, "Documents:        {}", self.documents)?;
        writeln!(f, "Trigram keys:     {}", self.trigrams)?;
        writeln!(f, "Index size:       {}", format_size(total))?;
        for (name, bytes) in [
            ("Headers", self.header_bytes),
            ("Posting lists", self.posting_bytes),
            ("Strings", self.string_bytes),
            ("File table", self.table_bytes),
            ("N-gram table", self.directory_bytes),
        ] {
            writeln!(
                f,
                "  {:15} {:>12} {:>6.2}%",
                name,
                format_size(bytes),
                percent(bytes)
            )?;
        }
        Ok(())
    }
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_sum() {
        let one = SegmentStats {
            segments: 1,
            documents: 2,
            posting_bytes: 10,
            header_bytes: 44,
            ..Default::default()
        };
        let total: SegmentStats = [one, one].into_iter().sum();
        assert_eq!(total.segments, 2);
        assert_eq!(total.documents, 4);
        assert_eq!(total.total_bytes(), 108);
        assert!(total.to_string().contains("Posting lists"));
    }
}
