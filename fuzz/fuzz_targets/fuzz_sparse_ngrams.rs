#![no_main]

use libfuzzer_sys::fuzz_target;
use trigrep::index::{DocId, Trigram};
use trigrep::query::{plan_literal, LiteralPlan, PostingSource};
use trigrep::utils::extract_trigrams;

struct Keys(Vec<Trigram>);

impl PostingSource for Keys {
    fn postings(&self, trigram: Trigram) -> trigrep::error::Result<Vec<DocId>> {
        Ok(if self.0.binary_search(&trigram).is_ok() { vec![0] } else { Vec::new() })
    }
}

fuzz_target!(|text: String| {
    // Every substring of an indexed text must still select that text
    let keys = Keys(extract_trigrams(&text));
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < 3 || text.contains('\0') {
        return;
    }
    let start = chars.len() / 3;
    let needle: String = chars[start..].iter().collect();
    for case_sensitive in [true, false] {
        if let LiteralPlan::Indexed(query) = plan_literal(&needle, case_sensitive) {
            assert_eq!(query.evaluate(&keys).unwrap(), vec![0]);
        }
    }
});
