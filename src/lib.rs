//! # trigrep - trigram indexed literal search
//!
//! trigrep keeps a persistent n-gram index of a directory tree and uses it to
//! rule out files that cannot contain a literal before reading them.
//!
//! ## Architecture
//!
//! - [`index`] - Segment format, in-memory and segmented builders, readers
//! - [`query`] - Boolean posting algebra and the literal query planner
//! - [`scan`] - File-tree walking with `.gitignore` and glob exclusion
//! - [`search`] - Verifying candidate files line by line
//! - [`output`] - vimgrep style result printing
//! - [`utils`] - Key extraction, varints, config and index locations
//!
//! ## Quick Start
//!
//! ```no_run
//! use trigrep::index::MultiIndex;
//! use std::path::Path;
//!
//! let index = MultiIndex::open(Path::new("/path/to/index"))?;
//! for doc in index.containing_str("fn main", true)? {
//!     println!("{}", doc.path);
//! }
//! # Ok::<(), trigrep::error::IndexError>(())
//! ```
//!
//! Query results are a superset: a file listed may still not contain the
//! literal, but a file that contains it is never missed.

pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod query;
pub mod scan;
pub mod search;
pub mod utils;
