//! Record iteration over a byte source.
//!
//! [`RecordIter`] repeatedly invokes the parser driver and boundary
//! scanner at advancing byte positions, yielding one indexed record per
//! iteration. The sequence is lazy, forward-only and single-pass: each
//! advance blocks until one full record has been parsed and scanned, and
//! re-iterating requires a fresh source handle.
//!
//! [`index_file`] and [`index_file_records`] are the path-based
//! conveniences: they open the file themselves and the handle is released
//! when the iterator is dropped, whether iteration finished or was
//! abandoned early.

use crate::error::{Error, Result};
use crate::indexer::TagIndexer;
use crate::tree::{IndexTree, Record};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

/// Iterator over the sequential target-tag records of a byte source.
///
/// Yields one [`IndexTree`] per record until the boundary scanner reports
/// the last one. Any error ends the iteration; subsequent calls return
/// `None`.
pub struct RecordIter<S> {
    source: S,
    indexer: TagIndexer,
    position: u64,
    done: bool,
}

impl<S: BufRead + Seek> RecordIter<S> {
    /// Creates an iterator over `source` for records delimited by
    /// `target`, additionally capturing `capture_tags`.
    pub fn new(source: S, target: &str, capture_tags: &[&str]) -> Self {
        RecordIter {
            source,
            indexer: TagIndexer::new(target, capture_tags),
            position: 0,
            done: false,
        }
    }

    /// Borrows the underlying source, e.g. to
    /// [`extract_range`](crate::tree::Node::extract_range) from records
    /// already yielded.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consumes the iterator and returns the source handle.
    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: BufRead + Seek> Iterator for RecordIter<S> {
    type Item = Result<IndexTree>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.indexer.index_at(&mut self.source, self.position) {
            Ok(tree) => {
                match tree.next_record_offset() {
                    Some(next) if !tree.last_record() => self.position = next,
                    _ => self.done = true,
                }
                Some(Ok(tree))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Opens `path` and iterates its records as [`IndexTree`]s.
///
/// The file handle is owned by the iterator and closed when it is dropped.
pub fn index_file<P: AsRef<Path>>(
    path: P,
    target: &str,
    capture_tags: &[&str],
) -> Result<RecordIter<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(RecordIter::new(BufReader::new(file), target, capture_tags))
}

/// Opens `path` and iterates its records flattened into [`Record`]s.
///
/// Same iteration as [`index_file`], with each tree converted to the
/// nested-map representation.
pub fn index_file_records<P: AsRef<Path>>(
    path: P,
    target: &str,
    capture_tags: &[&str],
) -> Result<impl Iterator<Item = Result<Record>>> {
    let target_tag = target.to_string();
    let iter = index_file(path, target, capture_tags)?;
    Ok(iter.map(move |result| {
        result.and_then(|tree| {
            let begin = tree.node(tree.root()).begin;
            tree.into_record().ok_or_else(|| Error::TargetNotFound {
                tag: target_tag.clone(),
                offset: begin,
            })
        })
    }))
}
