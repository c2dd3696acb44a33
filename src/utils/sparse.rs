//! Sparse n-gram selection.
//!
//! Besides the literal trigrams of a text, the index stores hashes of longer
//! "sparse" n-grams: spans whose inner digram weights are all strictly below
//! the weights at both of its edges. A long query can then be anchored on a
//! handful of selective keys instead of ANDing every overlapping trigram.
//!
//! The selection only looks at the digrams inside a span, so the same span is
//! chosen wherever its text occurs. Weights are computed on lower-cased code
//! points, which keeps the selection identical for every casing of a text; the
//! emitted hash is computed on the original code points.

use crate::index::types::Trigram;

const WINDOW_MASK: usize = 0x7;
const WINDOW: usize = WINDOW_MASK + 1;

/// One selected n-gram: `len` code points starting at code point `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseNgram {
    pub start: u64,
    pub len: usize,
    pub hash: Trigram,
}

/// Streaming collector over a circular window of the last 8 code points.
///
/// Call [`feed`](Self::feed) once per code point and [`finish`](Self::finish)
/// exactly once at the end; `finish` pushes 8 zero code points to flush the
/// window and leaves the collector ready for the next input.
#[derive(Debug, Clone, Default)]
pub struct SparseNgramCollector {
    consumed: u64,
    code_points: [u32; WINDOW],
    weights: [u32; WINDOW],
}

impl SparseNgramCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, cp: u32, mut on_ngram: impl FnMut(SparseNgram)) {
        let i = (self.consumed as usize) & WINDOW_MASK;

        if self.consumed >= WINDOW as u64 {
            let left = self.weights[i];
            let mut middle = self.weights[(i + 1) & WINDOW_MASK];
            for j in i + 2..WINDOW + i - 1 {
                if middle >= left {
                    break;
                }
                let right = self.weights[j & WINDOW_MASK];
                if right > middle {
                    on_ngram(self.span(i, (j + 1) & WINDOW_MASK));
                    middle = right;
                }
            }
        }

        self.code_points[i] = cp;
        let prev = (i + WINDOW - 1) & WINDOW_MASK;
        self.weights[prev] = digram_weight(self.code_points[prev], cp);
        self.consumed += 1;
    }

    pub fn finish(&mut self, mut on_ngram: impl FnMut(SparseNgram)) {
        for _ in 0..WINDOW {
            self.feed(0, &mut on_ngram);
        }
        self.reset();
    }

    pub fn reset(&mut self) {
        self.consumed = 0;
        self.code_points = [0; WINDOW];
        self.weights = [0; WINDOW];
    }

    /// Run over a whole sequence and collect every selected n-gram
    pub fn run(&mut self, code_points: impl IntoIterator<Item = u32>) -> Vec<SparseNgram> {
        self.reset();
        let mut out = Vec::new();
        for cp in code_points {
            self.feed(cp, |n| out.push(n));
        }
        self.finish(|n| out.push(n));
        out
    }

    // start and end slots are both included
    fn span(&self, start: usize, end: usize) -> SparseNgram {
        let mut hash = 0u32;
        let mut k = start;
        while k != end {
            hash = mix_hashes(hash, self.code_points[k]);
            k = (k + 1) & WINDOW_MASK;
        }
        hash = mix_hashes(hash, self.code_points[end]);

        let len = (end + WINDOW - start) % WINDOW + 1;
        SparseNgram {
            start: self.consumed - WINDOW as u64,
            len,
            hash: Trigram::new(hash >> 8),
        }
    }
}

/// Hash of an n-gram longer than three code points; agrees with the streaming
/// hash produced by [`SparseNgramCollector`] for the same span.
pub fn hash_ngram(code_points: &[u32]) -> Trigram {
    let hash = code_points.iter().fold(0u32, |h, &cp| mix_hashes(h, cp));
    Trigram::new(hash >> 8)
}

/// Murmur2-style mixing step
#[inline]
pub fn mix_hashes(hash1: u32, hash2: u32) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;
    let mut h2 = hash2.wrapping_mul(M);
    h2 ^= h2 >> R;
    h2 = h2.wrapping_mul(M);
    hash1.wrapping_mul(M) ^ h2
}

/// Weight of the digram `(prev, cp)`, insensitive to letter case
#[inline]
pub fn digram_weight(prev: u32, cp: u32) -> u32 {
    let h = mix_hashes(mix_hashes(0x9747_b28c, fold_case(prev)), fold_case(cp));
    h ^ (h >> 15)
}

fn fold_case(cp: u32) -> u32 {
    if cp < 0x80 {
        return (cp as u8).to_ascii_lowercase() as u32;
    }
    match char::from_u32(cp) {
        Some(c) => {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) => l as u32,
                _ => cp,
            }
        }
        None => cp,
    }
}
