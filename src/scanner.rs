//! Post-parse record boundary scanner.
//!
//! The parser driver's provisional end offset assumes an unpadded end tag
//! (`</tag>`); end tags carrying extra whitespace (`</tag  >`) make it land
//! short of the true closing `>`. This scanner corrects the offset by
//! reading the source directly, then locates the start of the next token
//! and probes whether it opens another record.
//!
//! The next-record probe is a fixed-width literal comparison of the tag
//! name's bytes. It is deliberately not tag-boundary aware: a following
//! tag whose name has the target as a prefix (target `a`, next tag `abc`)
//! is misreported as another record. Known limitation.

use crate::error::{Error, Result};
use crate::tree::IndexTree;
use std::io::{Read, Seek, SeekFrom};

/// Bytes read per scan window.
const SCAN_WINDOW: usize = 100;

/// Corrects the tree's end offset and determines whether another record
/// follows.
///
/// Starting from the provisional end, finds the true closing `>` and sets
/// the root's end one past it (the record node is kept in sync when it
/// carried the same provisional offset). Then finds the next `<`, stores
/// it as `next_record_offset`, and compares the tag name that follows
/// against `target` to set `last_record`. Fails with
/// [`Error::BoundaryScan`] when the source ends before either delimiter is
/// found.
pub(crate) fn scan_record_boundary<S: Read + Seek>(
    source: &mut S,
    tree: &mut IndexTree,
    target: &str,
) -> Result<()> {
    let root = tree.root();
    let provisional = tree
        .node(root)
        .end
        .ok_or_else(|| Error::UnfinalizedElement(tree.node(root).tag.clone()))?;

    // The provisional offset already sits one past an unpadded '>', so
    // start one byte back to confirm it in place.
    let scan_from = provisional.saturating_sub(1);
    let gt = find_byte(source, scan_from, b'>')?.ok_or(Error::BoundaryScan {
        needle: '>',
        from: scan_from,
    })?;
    let end = gt + 1;
    tree.node_mut(root).end = Some(end);
    if let Some(record) = tree.record() {
        if tree.node(record).end == Some(provisional) {
            tree.node_mut(record).end = Some(end);
        }
    }

    let lt = find_byte(source, end, b'<')?.ok_or(Error::BoundaryScan {
        needle: '<',
        from: end,
    })?;
    tree.set_next_record_offset(lt);

    tree.set_last_record(!probe_matches(source, lt + 1, target.as_bytes())?);
    Ok(())
}

/// Scans forward from `from` in fixed windows for the first occurrence of
/// `needle`, returning its absolute offset.
fn find_byte<S: Read + Seek>(source: &mut S, from: u64, needle: u8) -> Result<Option<u64>> {
    source.seek(SeekFrom::Start(from))?;
    let mut window = [0u8; SCAN_WINDOW];
    let mut pos = from;
    loop {
        let n = source.read(&mut window)?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(i) = window[..n].iter().position(|&b| b == needle) {
            return Ok(Some(pos + i as u64));
        }
        pos += n as u64;
    }
}

/// Peeks exactly `expected.len()` bytes at `from` and compares them
/// literally. A short read at end of source counts as a mismatch.
fn probe_matches<S: Read + Seek>(source: &mut S, from: u64, expected: &[u8]) -> Result<bool> {
    source.seek(SeekFrom::Start(from))?;
    let mut peek = vec![0u8; expected.len()];
    let mut filled = 0;
    while filled < peek.len() {
        let n = source.read(&mut peek[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(peek == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::TagIndexer;
    use std::io::Cursor;

    fn parse_and_scan(xml: &str, target: &str) -> (IndexTree, Cursor<Vec<u8>>) {
        let mut source = Cursor::new(xml.as_bytes().to_vec());
        let indexer = TagIndexer::new(target, &["b"]);
        let mut tree = indexer.parse_from_position(&mut source, 0).unwrap();
        scan_record_boundary(&mut source, &mut tree, target).unwrap();
        (tree, source)
    }

    #[test]
    fn test_exact_end_tag_is_confirmed_unchanged() {
        let xml = "<r><a><b>x</b></a><a/></r>";
        let (tree, _) = parse_and_scan(xml, "a");
        let end = tree.node(tree.root()).end.unwrap();
        assert_eq!(&xml[..end as usize], "<r><a><b>x</b></a>");
        assert!(!tree.last_record());
        assert_eq!(tree.next_record_offset(), Some(18));
    }

    #[test]
    fn test_padded_end_tag_is_extended() {
        let xml = "<r><a><b>x</b></a  >\n<a/></r>";
        let (tree, mut source) = parse_and_scan(xml, "a");
        let record = tree.record().unwrap();
        assert_eq!(
            tree.node(record).extract_range(&mut source).unwrap(),
            "<a><b>x</b></a  >"
        );
        assert!(!tree.last_record());
        assert_eq!(tree.next_record_offset(), Some(21));
    }

    #[test]
    fn test_last_record_when_next_tag_differs() {
        let xml = "<r><a><b>x</b></a></r>";
        let (tree, _) = parse_and_scan(xml, "a");
        assert!(tree.last_record());
        // The next token is still located, even for the last record.
        assert_eq!(tree.next_record_offset(), Some(18));
    }

    #[test]
    fn test_boundary_scan_error_at_end_of_source() {
        // Nothing follows the record's end tag at all.
        let xml = "<a><b>x</b></a>";
        let mut source = Cursor::new(xml.as_bytes().to_vec());
        let indexer = TagIndexer::new("a", &["b"]);
        let mut tree = indexer.parse_from_position(&mut source, 0).unwrap();
        let err = scan_record_boundary(&mut source, &mut tree, "a").unwrap_err();
        assert!(matches!(err, Error::BoundaryScan { needle: '<', .. }));
    }

    #[test]
    fn test_short_probe_at_end_of_source_means_last() {
        // The '<' after the record is the final byte, so the probe reads
        // nothing.
        let xml = "<r><a><b>x</b></a><";
        let mut source = Cursor::new(xml.as_bytes().to_vec());
        let indexer = TagIndexer::new("a", &["b"]);
        let mut tree = indexer.parse_from_position(&mut source, 0).unwrap();
        scan_record_boundary(&mut source, &mut tree, "a").unwrap();
        assert!(tree.last_record());
    }

    #[test]
    fn test_prefix_ambiguity_is_a_known_false_positive() {
        // Fixed-width comparison: a following <ab> tag looks like another
        // "a" record.
        let xml = "<r><a><b>x</b></a><ab>y</ab></r>";
        let (tree, _) = parse_and_scan(xml, "a");
        assert!(!tree.last_record());
    }

    #[test]
    fn test_scan_spanning_windows() {
        // More than one 100-byte window of padding between records.
        let gap = " ".repeat(250);
        let xml = format!("<r><a><b>x</b></a>{gap}<a/></r>");
        let mut source = Cursor::new(xml.as_bytes().to_vec());
        let indexer = TagIndexer::new("a", &["b"]);
        let mut tree = indexer.parse_from_position(&mut source, 0).unwrap();
        scan_record_boundary(&mut source, &mut tree, "a").unwrap();
        assert_eq!(tree.next_record_offset(), Some(18 + 250));
        assert!(!tree.last_record());
    }
}
