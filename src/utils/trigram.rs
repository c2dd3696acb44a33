use crate::index::types::Trigram;
use crate::utils::sparse::SparseNgramCollector;

/// Bitset for tracking which trigrams have been seen.
/// Uses 2MB to cover all 16M possible trigram values (24 bits).
/// This is MUCH faster than HashSet for trigram deduplication.
struct TrigramBitset {
    bits: Vec<u64>,
}

impl TrigramBitset {
    /// Create a new bitset (2MB allocation, zeroed)
    #[inline]
    fn new() -> Self {
        // 16M trigrams / 64 bits per u64 = 262144 u64s = 2MB
        Self {
            bits: vec![0u64; 262144],
        }
    }

    /// Check if trigram is set and set it. Returns true if it was already set.
    #[inline]
    fn test_and_set(&mut self, trigram: u32) -> bool {
        let trigram = trigram & Trigram::MASK;
        let idx = (trigram >> 6) as usize; // divide by 64
        let bit = 1u64 << (trigram & 63); // mod 64
        let was_set = (self.bits[idx] & bit) != 0;
        self.bits[idx] |= bit;
        was_set
    }

    /// Collect all set trigrams into an ascending vector
    fn collect(&self) -> Vec<Trigram> {
        let mut result = Vec::with_capacity(8192);
        for (word_idx, &word) in self.bits.iter().enumerate() {
            if word == 0 {
                continue;
            }
            let base = (word_idx as u32) << 6;
            let mut w = word;
            while w != 0 {
                let bit_pos = w.trailing_zeros();
                result.push(Trigram::new(base | bit_pos));
                w &= w - 1; // clear lowest set bit
            }
        }
        result
    }
}

/// Fold a code point into a single byte.
///
/// For ASCII this is the byte itself, so plain-text trigrams stay readable.
#[inline]
pub fn hash_codepoint(cp: u32) -> u8 {
    (cp ^ (cp >> 8) ^ (cp >> 16)) as u8
}

/// Pack three code points into a literal trigram
#[inline]
pub fn literal_trigram(a: char, b: char, c: char) -> Trigram {
    Trigram::from_bytes(
        hash_codepoint(a as u32),
        hash_codepoint(b as u32),
        hash_codepoint(c as u32),
    )
}

/// Extract the set of index keys for a document's text: every literal
/// trigram plus the sparse n-grams chosen by [`SparseNgramCollector`].
///
/// Returns an empty set for text that contains a NUL character; such files
/// are treated as binary and are never matched through the index.
pub fn extract_trigrams(text: &str) -> Vec<Trigram> {
    if memchr::memchr(0, text.as_bytes()).is_some() {
        return Vec::new();
    }

    // For small inputs, use simple sort+dedup (more cache-friendly than bitset)
    if text.len() < 1024 {
        let mut keys = Vec::with_capacity(text.len() * 2);
        collect_keys(text, |t| keys.push(t));
        keys.sort_unstable();
        keys.dedup();
        return keys.into_iter().map(Trigram::new).collect();
    }

    let mut bitset = TrigramBitset::new();
    collect_keys(text, |t| {
        bitset.test_and_set(t);
    });
    bitset.collect()
}

fn collect_keys(text: &str, mut sink: impl FnMut(u32)) {
    let mut sparse = SparseNgramCollector::new();
    let mut window = 0u32;
    for (pos, ch) in text.chars().enumerate() {
        window = ((window << 8) | hash_codepoint(ch as u32) as u32) & Trigram::MASK;
        if pos >= 2 {
            sink(window);
        }
        sparse.feed(ch as u32, |ngram| sink(ngram.hash.value()));
    }
    sparse.finish(|ngram| sink(ngram.hash.value()));
}

/// Check if content is likely binary
pub fn is_binary(content: &[u8]) -> bool {
    let sample_size = content.len().min(8192);
    memchr::memchr(0, &content[..sample_size]).is_some()
}
