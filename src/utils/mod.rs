//! Utility functions and data structures.
//!
//! ## Modules
//!
//! - [`app_data`] - Config file, index locations and the stable path hash
//! - [`encoding`] - Variable-length integer encoding (varint) and fixed-width fields
//! - [`trigram`] - Code point hashing and per-file key extraction
//! - [`sparse`] - Sparse n-gram selection over code point streams
//! - [`progress`] - Progress bars, no-op without the `progress` feature
//!
//! ## Key Functions
//!
//! ```no_run
//! use trigrep::utils::extract_trigrams;
//!
//! // Sorted, distinct keys: literal trigrams plus sparse n-gram hashes
//! let keys = extract_trigrams("hello world");
//! assert!(!keys.is_empty());
//! ```

pub mod app_data;
pub mod encoding;
pub mod progress;
pub mod sparse;
pub mod trigram;

pub use app_data::*;
pub use encoding::*;
pub use trigram::*;
