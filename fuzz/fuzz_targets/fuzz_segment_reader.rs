#![no_main]

use libfuzzer_sys::fuzz_target;
use trigrep::index::MultiIndex;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be rejected with an error, never a panic
    let Ok(index) = MultiIndex::from_bytes(data.to_vec()) else {
        return;
    };
    let _ = index.read_all_doc_nodes();
    for segment in index.segments() {
        let _ = segment.read_all_posting_lists();
    }
    let _ = index.containing_str("abc", false);
    let _ = index.containing_str("x", true);
});
