//! Byte-offset parser driver.
//!
//! This module turns the quick-xml event stream into an offset-annotated
//! [`IndexTree`] for a single record. The tokenizer is pumped event by
//! event; before each read the reader's buffer position is captured, which
//! is the byte offset of the upcoming token's first byte. Those offsets are
//! what make later [`extract_range`](crate::tree::Node::extract_range)
//! calls byte-exact.
//!
//! The subtle part is end offsets: when an element's end tag is tokenized,
//! the position one past its closing `>` is only knowable from the *next*
//! event's offset. A closed element is therefore held in a transient
//! closing state and finalized on the following event of any kind. The one
//! exception is the target tag itself, whose end offset is computed
//! directly from the end-tag token so the pump can stop immediately.

use crate::error::{Error, Result};
use crate::scanner;
use crate::tree::{IndexTree, NodeId, ROOT_ID};
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Seek, SeekFrom};
use std::str;

/// Byte width of the `</` and `>` delimiters of an end tag.
const END_TAG_DELIMS: u64 = 3;

/// Status returned by every [`TokenSink`] handler.
///
/// The event pump checks this after each event and stops feeding input on
/// [`Flow::RecordComplete`]; genuine parse errors travel separately through
/// `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep consuming tokenizer events.
    Continue,
    /// The record of interest is complete; stop the tokenizer without error.
    RecordComplete,
}

/// Receiver for tokenizer events.
///
/// `offset` is the tokenizer-relative byte position of the event's first
/// byte (the `<` of a tag, the first byte of a text run).
pub trait TokenSink {
    /// A start tag (or the opening half of a self-closing tag) was read.
    fn on_open(
        &mut self,
        tag: &str,
        attributes: HashMap<String, String>,
        offset: u64,
    ) -> Result<Flow>;

    /// An end tag (or the closing half of a self-closing tag) was read.
    fn on_close(&mut self, tag: &str, offset: u64) -> Result<Flow>;

    /// Character data was read.
    fn on_text(&mut self, data: &str, offset: u64) -> Result<Flow>;
}

/// Feeds quick-xml events into `sink` until it reports
/// [`Flow::RecordComplete`] or the source is exhausted.
///
/// Returns `true` if the sink completed a record, `false` on end of input.
/// Comments, processing instructions and declarations are consumed without
/// being dispatched.
pub fn pump_events<R: BufRead>(
    reader: &mut Reader<R>,
    sink: &mut impl TokenSink,
) -> Result<bool> {
    let mut buf = Vec::with_capacity(4096);
    loop {
        buf.clear();
        let offset = reader.buffer_position();
        let event = reader.read_event_into(&mut buf)?;
        let flow = match event {
            XmlEvent::Start(ref e) => {
                let name = str::from_utf8(e.local_name().as_ref())?.to_string();
                let attrs = extract_attrs(e)?;
                sink.on_open(&name, attrs, offset)?
            }
            XmlEvent::End(ref e) => {
                let name = str::from_utf8(e.local_name().as_ref())?.to_string();
                sink.on_close(&name, offset)?
            }
            XmlEvent::Empty(ref e) => {
                let name = str::from_utf8(e.local_name().as_ref())?.to_string();
                let attrs = extract_attrs(e)?;
                match sink.on_open(&name, attrs, offset)? {
                    Flow::Continue => sink.on_close(&name, offset)?,
                    flow => flow,
                }
            }
            XmlEvent::Text(ref e) => {
                let text = e.xml_content().map_err(quick_xml::Error::from)?.to_string();
                sink.on_text(&text, offset)?
            }
            XmlEvent::CData(ref e) => {
                let text = str::from_utf8(e.as_ref())?.to_string();
                sink.on_text(&text, offset)?
            }
            XmlEvent::GeneralRef(ref e) => {
                // Predefined entities arrive as standalone reference events.
                match resolve_entity(str::from_utf8(e.as_ref())?) {
                    Some(resolved) => sink.on_text(resolved, offset)?,
                    None => Flow::Continue,
                }
            }
            XmlEvent::Eof => return Ok(false),
            _ => Flow::Continue,
        };
        if flow == Flow::RecordComplete {
            return Ok(true);
        }
    }
}

/// Extracts attributes from a start tag as owned data.
fn extract_attrs(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.to_string();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// Resolves the five predefined XML entities.
fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// [`TokenSink`] that builds an [`IndexTree`] for one record.
struct TreeBuilder<'a> {
    tree: IndexTree,
    current: NodeId,
    /// Absolute offset the parse started from; tokenizer offsets are
    /// relative to it.
    base: u64,
    target: &'a str,
    capture: &'a HashSet<String>,
    save_text: bool,
    /// The current node's end tag has been seen but its end offset is not
    /// yet known.
    closing: bool,
}

impl<'a> TreeBuilder<'a> {
    fn new(target: &'a str, capture: &'a HashSet<String>, base: u64) -> Self {
        TreeBuilder {
            tree: IndexTree::new(base),
            current: ROOT_ID,
            base,
            target,
            capture,
            save_text: false,
            closing: false,
        }
    }

    /// Resolves the pending closing state: fixes the current node's end
    /// offset from the next event's position and pops the cursor to its
    /// parent.
    fn finalize(&mut self, offset: u64) {
        self.tree.node_mut(self.current).end = Some(self.base + offset);
        self.current = self.tree.node(self.current).parent.unwrap_or(ROOT_ID);
        self.closing = false;
    }
}

impl TokenSink for TreeBuilder<'_> {
    fn on_open(
        &mut self,
        tag: &str,
        attributes: HashMap<String, String>,
        offset: u64,
    ) -> Result<Flow> {
        if self.closing {
            self.finalize(offset);
        }
        if self.capture.contains(tag) {
            self.save_text = true;
            let begin = self.base + offset;
            let node = self.tree.alloc(tag, attributes, begin);
            self.tree.append_child(self.current, node);
            self.current = node;
            if tag == self.target {
                // The record's true start is this tag, not the offset the
                // parse was invoked at.
                self.tree.node_mut(ROOT_ID).begin = begin;
            }
        } else {
            self.save_text = false;
        }
        Ok(Flow::Continue)
    }

    fn on_close(&mut self, tag: &str, offset: u64) -> Result<Flow> {
        if self.closing {
            self.finalize(offset);
        }
        if tag == self.target {
            let end = self.base + offset + tag.len() as u64 + END_TAG_DELIMS;
            self.tree.node_mut(self.current).end = Some(end);
            self.tree.node_mut(ROOT_ID).end = Some(end);
            return Ok(Flow::RecordComplete);
        }
        if tag == self.tree.node(self.current).tag {
            self.closing = true;
        }
        Ok(Flow::Continue)
    }

    fn on_text(&mut self, data: &str, offset: u64) -> Result<Flow> {
        if self.closing {
            self.finalize(offset);
        }
        let trimmed = data.trim();
        if self.save_text && !trimmed.is_empty() {
            self.tree.node_mut(self.current).text.push_str(trimmed);
        }
        Ok(Flow::Continue)
    }
}

/// Indexes sequential occurrences of a target tag in a byte source.
///
/// One `TagIndexer` is configured with the target tag (the record
/// delimiter) and the capture-set of tags worth recording; it can then be
/// invoked repeatedly at advancing byte positions.
#[derive(Debug, Clone)]
pub struct TagIndexer {
    target: String,
    capture: HashSet<String>,
}

impl TagIndexer {
    /// Creates an indexer for `target`, additionally capturing
    /// `capture_tags`. The target tag is always part of the capture-set.
    pub fn new(target: impl Into<String>, capture_tags: &[&str]) -> Self {
        let target = target.into();
        let mut capture: HashSet<String> =
            capture_tags.iter().map(|tag| tag.to_string()).collect();
        capture.insert(target.clone());
        TagIndexer { target, capture }
    }

    /// The tag whose occurrences delimit records.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Parses one record starting at `position` and returns its tree.
    ///
    /// Seeks the source, then pumps tokenizer events until the target
    /// tag's end tag is seen. Fails with [`Error::TargetNotFound`] when no
    /// target tag occurs at or after `position`, and with
    /// [`Error::UnclosedRecord`] when the source ends before the record is
    /// closed. The returned tree has not been boundary-scanned; its end
    /// offset is provisional and `last_record`/`next_record_offset` are
    /// unset.
    pub fn parse_from_position<S: BufRead + Seek>(
        &self,
        source: &mut S,
        position: u64,
    ) -> Result<IndexTree> {
        source.seek(SeekFrom::Start(position))?;
        let mut reader = Reader::from_reader(&mut *source);
        let mut builder = TreeBuilder::new(&self.target, &self.capture, position);
        let complete = match pump_events(&mut reader, &mut builder) {
            Ok(complete) => complete,
            // A truncated source surfaces as a missing end tag; the record
            // check below turns it into the right error.
            Err(Error::XmlParse(quick_xml::Error::IllFormed(
                IllFormedError::MissingEndTag(_),
            ))) => false,
            Err(e) => return Err(e),
        };

        let tree = builder.tree;
        if tree.record().is_none() {
            return Err(Error::TargetNotFound {
                tag: self.target.clone(),
                offset: position,
            });
        }
        if !complete {
            return Err(Error::UnclosedRecord {
                tag: self.target.clone(),
                offset: position,
            });
        }
        Ok(tree)
    }

    /// Parses one record at `position` and boundary-scans it: the unit of
    /// work of one iteration step.
    ///
    /// The returned tree carries the corrected end offset plus
    /// `last_record` and `next_record_offset`.
    pub fn index_at<S: BufRead + Seek>(
        &self,
        source: &mut S,
        position: u64,
    ) -> Result<IndexTree> {
        let mut tree = self.parse_from_position(source, position)?;
        scanner::scan_record_boundary(source, &mut tree, &self.target)?;
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn indexer() -> TagIndexer {
        TagIndexer::new("a", &["b", "c"])
    }

    #[test]
    fn test_offsets_are_exact() {
        let xml = "<a><b>hi</b></a>";
        let mut source = Cursor::new(xml.as_bytes());
        let tree = indexer().parse_from_position(&mut source, 0).unwrap();

        let root = tree.node(tree.root());
        assert_eq!(root.begin, 0);
        assert_eq!(root.end, Some(16));

        let a = tree.record().unwrap();
        assert_eq!(tree.node(a).begin, 0);
        assert_eq!(tree.node(a).end, Some(16));

        let b = tree.node(a).first_child().unwrap();
        assert_eq!(tree.node(b).begin, 3);
        assert_eq!(tree.node(b).end, Some(12));
        assert_eq!(tree.node(b).text, "hi");
        assert_eq!(
            tree.node(b).extract_range(&mut source).unwrap(),
            "<b>hi</b>"
        );
    }

    #[test]
    fn test_root_begin_tracks_target_tag() {
        let xml = "<begin>\n  <a><b>x</b></a></begin>";
        let mut source = Cursor::new(xml.as_bytes());
        let tree = indexer().parse_from_position(&mut source, 0).unwrap();
        let a = tree.record().unwrap();
        assert_eq!(tree.node(a).tag, "a");
        assert_eq!(tree.node(a).begin, 10);
        assert_eq!(tree.node(tree.root()).begin, 10);
    }

    #[test]
    fn test_uncaptured_tags_are_skipped_structurally() {
        // <x> is not captured; its captured descendant attaches to the
        // nearest captured ancestor, and its text is dropped.
        let xml = "<a>dropme<x>also dropped<b>kept</b></x></a>";
        let mut source = Cursor::new(xml.as_bytes());
        let tree = TagIndexer::new("a", &["b"])
            .parse_from_position(&mut source, 0)
            .unwrap();

        let a = tree.record().unwrap();
        assert_eq!(tree.node(a).text, "dropme");
        assert_eq!(tree.node(a).children.len(), 1);
        let b = tree.node(a).first_child().unwrap();
        assert_eq!(tree.node(b).tag, "b");
        assert_eq!(tree.node(b).text, "kept");
    }

    #[test]
    fn test_text_fragments_concatenate() {
        let xml = "<a><c>one<!-- split -->two</c></a>";
        let mut source = Cursor::new(xml.as_bytes());
        let tree = indexer().parse_from_position(&mut source, 0).unwrap();
        let c = tree.find_descendants_by_tag(tree.root(), "c")[0];
        assert_eq!(tree.node(c).text, "onetwo");
    }

    #[test]
    fn test_entity_references_resolve_into_text() {
        // Predefined entities arrive as standalone reference events that
        // split the surrounding character data; each fragment is trimmed
        // individually before concatenation.
        let xml = "<a><c>x &amp; y</c><c>&lt;tag&gt;</c></a>";
        let mut source = Cursor::new(xml.as_bytes());
        let tree = indexer().parse_from_position(&mut source, 0).unwrap();
        let cs = tree.find_descendants_by_tag(tree.root(), "c");
        assert_eq!(tree.node(cs[0]).text, "x&y");
        assert_eq!(tree.node(cs[1]).text, "<tag>");
    }

    #[test]
    fn test_cdata_is_captured() {
        let xml = "<a><c><![CDATA[raw <markup> here]]></c></a>";
        let mut source = Cursor::new(xml.as_bytes());
        let tree = indexer().parse_from_position(&mut source, 0).unwrap();
        let c = tree.find_descendants_by_tag(tree.root(), "c")[0];
        assert_eq!(tree.node(c).text, "raw <markup> here");
    }

    #[test]
    fn test_attributes_are_exact() {
        let xml = r#"<a><b number="1">x</b></a>"#;
        let mut source = Cursor::new(xml.as_bytes());
        let tree = indexer().parse_from_position(&mut source, 0).unwrap();
        let b = tree.find_descendants_by_tag(tree.root(), "b")[0];
        assert_eq!(tree.node(b).attributes.len(), 1);
        assert_eq!(
            tree.node(b).attributes.get("number"),
            Some(&"1".to_string())
        );
    }

    #[test]
    fn test_parse_from_nonzero_position() {
        let xml = "<a><b>first</b></a><a><b>second</b></a>";
        let mut source = Cursor::new(xml.as_bytes());
        let second = xml.find("<a><b>second").unwrap() as u64;
        let tree = indexer().parse_from_position(&mut source, second).unwrap();
        let b = tree.find_descendants_by_tag(tree.root(), "b")[0];
        assert_eq!(tree.node(b).text, "second");
        assert_eq!(tree.node(tree.record().unwrap()).begin, second);
        assert_eq!(
            tree.node(tree.record().unwrap())
                .extract_range(&mut source)
                .unwrap(),
            "<a><b>second</b></a>"
        );
    }

    #[test]
    fn test_target_not_found() {
        let xml = "<x><y>nope</y></x>";
        let mut source = Cursor::new(xml.as_bytes());
        let err = indexer().parse_from_position(&mut source, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::TargetNotFound { tag, offset: 0 } if tag == "a"
        ));
    }

    #[test]
    fn test_unclosed_record() {
        let xml = "<a><b>hi</b>";
        let mut source = Cursor::new(xml.as_bytes());
        let err = indexer().parse_from_position(&mut source, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::UnclosedRecord { tag, offset: 0 } if tag == "a"
        ));
    }

    #[test]
    fn test_self_closing_capture() {
        let xml = "<a><b/><b>two</b></a>";
        let mut source = Cursor::new(xml.as_bytes());
        let tree = indexer().parse_from_position(&mut source, 0).unwrap();
        let bs = tree.find_descendants_by_tag(tree.root(), "b");
        assert_eq!(bs.len(), 2);
        assert_eq!(tree.node(bs[0]).begin, 3);
        assert_eq!(tree.node(bs[0]).end, Some(7));
        assert_eq!(tree.node(bs[1]).text, "two");
    }

    #[test]
    fn test_deferred_finalization_is_whitespace_independent() {
        // With and without whitespace between the end tags, every node's
        // range must end at its own closing '>'.
        for xml in ["<a><b>hi</b></a>", "<a><b>hi</b>\n  </a>"] {
            let mut source = Cursor::new(xml.as_bytes());
            let tree = indexer().parse_from_position(&mut source, 0).unwrap();
            let b = tree.find_descendants_by_tag(tree.root(), "b")[0];
            assert_eq!(
                tree.node(b).extract_range(&mut source).unwrap(),
                "<b>hi</b>",
                "input: {xml}"
            );
        }
    }
}
