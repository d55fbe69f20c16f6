//! Byte-offset XML record indexing.
//!
//! This crate indexes large byte streams containing a sequence of repeated
//! XML records — bulk database or biological export files, for example —
//! without building a document tree and without reading the whole file.
//! For every occurrence of a designated *target tag* it produces a small
//! tree of offset-annotated nodes describing the record's structure and
//! the exact byte range of each captured element, so the raw bytes of any
//! element can later be re-read straight from storage and handed to a
//! strict validating parser.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xmlindex::index_file;
//!
//! // Index every <entry> record, also capturing <accession> elements.
//! let mut iter = index_file("export.xml", "entry", &["accession"]).unwrap();
//! for result in &mut iter {
//!     let tree = result.unwrap();
//!     let entry = tree.record().unwrap();
//!     println!(
//!         "entry at {} ({} bytes)",
//!         tree.node(entry).begin,
//!         tree.node(entry).len_bytes().unwrap()
//!     );
//! }
//! ```
//!
//! # Retrieving raw bytes
//!
//! Every captured node carries its byte range, so the exact markup of a
//! record can be pulled back out of the source at any time:
//!
//! ```rust
//! use std::io::Cursor;
//! use xmlindex::RecordIter;
//!
//! let xml = r#"<export><a><b number="1">hello</b></a><a><b number="2"/></a></export>"#;
//! let mut iter = RecordIter::new(Cursor::new(xml.as_bytes()), "a", &["b"]);
//! let tree = iter.next().unwrap().unwrap();
//! let mut source = iter.into_source();
//!
//! let record = tree.record().unwrap();
//! let raw = tree.node(record).extract_range(&mut source).unwrap();
//! assert_eq!(raw, r#"<a><b number="1">hello</b></a>"#);
//! ```
//!
//! # Module Structure
//!
//! - [`tree`] - Offset-annotated element trees and the flattened [`Record`]
//! - [`indexer`] - The event-driven, offset-tracking parser driver
//! - [`iter`] - Record iteration over sources and files
//! - [`error`] - Error types
//!
//! # Optional Features
//!
//! - `serde` - Serialization support for the flattened [`Record`]
//! - `cli` - Builds the `list_records` command-line tool

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod indexer;
pub mod iter;
mod scanner;
pub mod tree;

// Re-export commonly used types at the crate root
pub use error::{Error, Result};
pub use indexer::{Flow, TagIndexer, TokenSink};
pub use iter::{index_file, index_file_records, RecordIter};
pub use tree::{IndexTree, Node, NodeId, Record};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
