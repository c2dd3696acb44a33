use crate::index::types::Trigram;
use crate::query::Query;
use crate::utils::sparse::{hash_ngram, SparseNgramCollector};
use crate::utils::trigram::{hash_codepoint, literal_trigram};
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// How a literal search string is answered by an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralPlan {
    /// Empty string: every document matches
    All,
    /// One or two characters: scan the trigram directory
    Short(ShortPattern),
    /// Three or more characters: evaluate a trigram query
    Indexed(Query),
}

/// Byte hashes of a one- or two-character string, one set per position
/// holding every case variant that is searched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortPattern {
    first: Vec<u8>,
    second: Option<Vec<u8>>,
}

impl ShortPattern {
    fn new(chars: &[char], case_sensitive: bool) -> Self {
        let hashes = |c: char| {
            let mut bytes: Vec<u8> = case_variants(c, case_sensitive)
                .into_iter()
                .map(|v| hash_codepoint(v as u32))
                .collect();
            bytes.sort_unstable();
            bytes.dedup();
            bytes
        };
        Self {
            first: hashes(chars[0]),
            second: chars.get(1).map(|&c| hashes(c)),
        }
    }

    /// Could a key with this packed value contain the pattern?
    pub fn matches(&self, trigram: Trigram) -> bool {
        let (a, b, c) = (trigram.a(), trigram.b(), trigram.c());
        match &self.second {
            None => [a, b, c].iter().any(|x| self.first.contains(x)),
            Some(second) => {
                (self.first.contains(&a) && second.contains(&b))
                    || (self.first.contains(&b) && second.contains(&c))
            }
        }
    }
}

/// Build the lookup plan for a literal search string.
///
/// For three or more characters the plan ANDs every literal trigram of the
/// string and every sparse n-gram lying fully inside it. Without case
/// sensitivity each key becomes an OR over the hashes of all case
/// permutations of its characters.
pub fn plan_literal(text: &str, case_sensitive: bool) -> LiteralPlan {
    let chars: Vec<char> = text.chars().collect();
    match chars.len() {
        0 => LiteralPlan::All,
        1 | 2 => LiteralPlan::Short(ShortPattern::new(&chars, case_sensitive)),
        n => {
            let mut keys: Vec<Query> = Vec::new();
            let mut push = |q: Query| {
                if !keys.contains(&q) {
                    keys.push(q);
                }
            };

            // sparse anchors are the more selective keys, evaluate them first
            let code_points = chars.iter().map(|&c| c as u32);
            for ngram in SparseNgramCollector::new().run(code_points) {
                let start = ngram.start as usize;
                if start + ngram.len > n {
                    continue;
                }
                push(expand(&chars[start..start + ngram.len], case_sensitive, |v| {
                    let cps: Vec<u32> = v.iter().map(|&c| c as u32).collect();
                    hash_ngram(&cps)
                }));
            }
            for window in chars.windows(3) {
                push(expand(window, case_sensitive, |v| {
                    literal_trigram(v[0], v[1], v[2])
                }));
            }

            if keys.len() == 1 {
                LiteralPlan::Indexed(keys.remove(0))
            } else {
                LiteralPlan::Indexed(Query::And(keys))
            }
        }
    }
}

/// OR of the key hashes of every case permutation of `chars`
fn expand(chars: &[char], case_sensitive: bool, hash: impl Fn(&[char]) -> Trigram) -> Query {
    let mut permutations: Vec<Vec<char>> = vec![Vec::with_capacity(chars.len())];
    for &c in chars {
        let variants = case_variants(c, case_sensitive);
        permutations = permutations
            .into_iter()
            .flat_map(|prefix| {
                variants.iter().map(move |&v| {
                    let mut next = prefix.clone();
                    next.push(v);
                    next
                })
            })
            .collect();
    }

    let mut hashes: Vec<Trigram> = permutations.iter().map(|p| hash(p.as_slice())).collect();
    hashes.sort_unstable();
    hashes.dedup();
    if hashes.len() == 1 {
        Query::Contains(hashes[0])
    } else {
        Query::Or(hashes.into_iter().map(Query::Contains).collect())
    }
}

/// Case-insensitive comparison key of a character: its lower case form when
/// that is a single character, otherwise the character itself.
pub fn fold_char(c: char) -> char {
    single(c.to_lowercase()).unwrap_or(c)
}

/// Characters folding to a key other than the key itself and its upper case
/// form, e.g. KELVIN SIGN for `k` or ANGSTROM SIGN for `å`
fn irregular_folds() -> &'static FxHashMap<char, Vec<char>> {
    static IRREGULAR: OnceLock<FxHashMap<char, Vec<char>>> = OnceLock::new();
    IRREGULAR.get_or_init(|| {
        let mut irregular: FxHashMap<char, Vec<char>> = FxHashMap::default();
        for c in '\0'..=char::MAX {
            let folded = fold_char(c);
            if folded != c && single(folded.to_uppercase()) != Some(c) {
                irregular.entry(folded).or_default().push(c);
            }
        }
        irregular
    })
}

/// `c` plus every character with the same [`fold_char`] key
fn case_variants(c: char, case_sensitive: bool) -> Vec<char> {
    let mut variants = vec![c];
    if case_sensitive {
        return variants;
    }
    let folded = fold_char(c);
    let upper = single(folded.to_uppercase()).filter(|&u| fold_char(u) == folded);
    let irregular = irregular_folds().get(&folded).into_iter().flatten().copied();
    for v in std::iter::once(folded).chain(upper).chain(irregular) {
        if !variants.contains(&v) {
            variants.push(v);
        }
    }
    variants
}

fn single(mut mapping: impl Iterator<Item = char>) -> Option<char> {
    match (mapping.next(), mapping.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::trigram::extract_trigrams;

    fn leaves(q: &Query, out: &mut Vec<Trigram>) {
        match q {
            Query::Contains(t) => out.push(*t),
            Query::And(qs) | Query::Or(qs) => qs.iter().for_each(|q| leaves(q, out)),
        }
    }

    #[test]
    fn test_empty_and_short() {
        assert_eq!(plan_literal("", true), LiteralPlan::All);
        assert!(matches!(plan_literal("a", true), LiteralPlan::Short(_)));
        assert!(matches!(plan_literal("ab", false), LiteralPlan::Short(_)));
    }

    #[test]
    fn test_three_chars_single_key() {
        match plan_literal("foo", true) {
            LiteralPlan::Indexed(q) => {
                assert_eq!(q, Query::Contains(Trigram::from_bytes(b'f', b'o', b'o')))
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_case_sensitive_keys_are_in_document() {
        let text = "let result = CreateMissingNamespaces(&config);";
        let keys = extract_trigrams(text);
        let LiteralPlan::Indexed(q) = plan_literal("CreateMissingNamespaces", true) else {
            panic!("expected indexed plan");
        };
        let mut wanted = Vec::new();
        leaves(&q, &mut wanted);
        assert!(wanted.len() >= 10);
        for t in wanted {
            assert!(keys.binary_search(&t).is_ok(), "missing {:?}", t);
        }
    }

    #[test]
    fn test_case_variants_cover_fold_class() {
        for c in '\0'..='\u{2200}' {
            let folded = fold_char(c);
            assert!(case_variants(folded, false).contains(&c), "{:?} missing for {:?}", c, folded);
            assert!(case_variants(c, false).contains(&folded));
        }
        assert!(case_variants('k', false).contains(&'\u{212A}'));
        assert!(case_variants('K', false).contains(&'\u{212A}'));
        assert!(case_variants('\u{2126}', false).contains(&'Ω'));
        assert_eq!(case_variants('k', true), ['k']);
    }

    #[test]
    fn test_case_insensitive_expands_permutations() {
        let LiteralPlan::Indexed(q) = plan_literal("aB1", false) else {
            panic!("expected indexed plan");
        };
        let mut wanted = Vec::new();
        leaves(&q, &mut wanted);
        // a/A x b/B x 1
        assert_eq!(wanted.len(), 4);
        assert!(wanted.contains(&Trigram::from_bytes(b'A', b'b', b'1')));
    }

    #[test]
    fn test_short_pattern_matches() {
        let LiteralPlan::Short(p) = plan_literal("oo", true) else {
            panic!("expected short plan");
        };
        assert!(p.matches(Trigram::from_bytes(b'f', b'o', b'o')));
        assert!(p.matches(Trigram::from_bytes(b'o', b'o', b'x')));
        assert!(!p.matches(Trigram::from_bytes(b'o', b'x', b'o')));

        let LiteralPlan::Short(p) = plan_literal("F", false) else {
            panic!("expected short plan");
        };
        assert!(p.matches(Trigram::from_bytes(b'x', b'x', b'f')));
        assert!(!p.matches(Trigram::from_bytes(b'x', b'x', b'g')));
    }

    #[test]
    fn test_case_variants() {
        assert_eq!(case_variants('a', true), vec!['a']);
        assert_eq!(case_variants('a', false), vec!['a', 'A']);
        assert_eq!(case_variants('1', false), vec!['1']);
        // 'ß' upper-cases to "SS"; only CAPITAL SHARP S folds back to it
        assert_eq!(case_variants('ß', false), vec!['ß', 'ẞ']);
        assert_eq!(case_variants('ẞ', false), vec!['ẞ', 'ß']);
    }
}
