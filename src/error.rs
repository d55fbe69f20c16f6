//! Error types for the xmlindex library.

use thiserror::Error;

/// Errors that can occur while indexing or extracting XML records.
#[derive(Error, Debug)]
pub enum Error {
    /// XML parsing error
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    /// XML attribute parsing error
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// The target tag was not found at the given offset
    #[error("no '{tag}' element found at offset {offset}")]
    TargetNotFound {
        /// The tag that was being searched for
        tag: String,
        /// The byte offset the parse started from
        offset: u64,
    },

    /// The source ended before the target tag's close tag was seen
    #[error("source ended before '{tag}' (parsed from offset {offset}) was closed")]
    UnclosedRecord {
        /// The tag whose close tag was never seen
        tag: String,
        /// The byte offset the parse started from
        offset: u64,
    },

    /// The source ended during a post-parse boundary scan
    #[error("end of source reached while scanning for '{needle}' from offset {from}")]
    BoundaryScan {
        /// The delimiter byte that was being scanned for
        needle: char,
        /// The byte offset the scan started from
        from: u64,
    },

    /// Byte-range extraction attempted on an element whose end offset is not set
    #[error("element '{0}' has no finalized end offset")]
    UnfinalizedElement(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type alias for xmlindex operations.
pub type Result<T> = std::result::Result<T, Error>;
