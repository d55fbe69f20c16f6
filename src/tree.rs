//! Offset-annotated element trees.
//!
//! An [`IndexTree`] is the output of one parse: an arena of [`Node`]s rooted
//! at a synthetic `ROOT` element whose single child is the indexed record.
//! Each node records the byte range its element occupies in the source, so
//! the raw markup of any captured element can be re-read later with
//! [`Node::extract_range`] without re-parsing the file.
//!
//! Nodes are addressed by [`NodeId`] indices into the arena. The tree owns
//! its nodes top-down through children lists; the parent link is a plain
//! index, so there are no ownership cycles.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::str;

/// Tag used for the synthetic root node created for every parse.
pub const ROOT_TAG: &str = "ROOT";

pub(crate) const ROOT_ID: NodeId = NodeId(0);

/// Index of a node within an [`IndexTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A single indexed element: tag, attributes, text, children and the byte
/// range of the element in the underlying source.
///
/// The range runs from the `<` of the start tag through the `>` of the
/// matching end tag; `end` is exclusive and remains `None` until the
/// element has been finalized by the parser.
#[derive(Debug, Clone)]
pub struct Node {
    /// Element name
    pub tag: String,
    /// Attributes of the start tag
    pub attributes: HashMap<String, String>,
    /// Concatenation of the trimmed text fragments seen directly inside
    /// this element
    pub text: String,
    /// Children in document order
    pub children: Vec<NodeId>,
    /// Parent node, `None` only for the synthetic root
    pub parent: Option<NodeId>,
    /// Byte offset of the element's opening `<`
    pub begin: u64,
    /// One past the byte offset of the element's closing `>`, once known
    pub end: Option<u64>,
}

impl Node {
    fn new(tag: String, attributes: HashMap<String, String>, begin: u64) -> Self {
        Node {
            tag,
            attributes,
            text: String::new(),
            children: Vec::new(),
            parent: None,
            begin,
            end: None,
        }
    }

    /// Returns the first child, if any.
    pub fn first_child(&self) -> Option<NodeId> {
        self.children.first().copied()
    }

    /// Returns the byte length of the element's range, if finalized.
    pub fn len_bytes(&self) -> Option<u64> {
        self.end.map(|end| end - self.begin)
    }

    /// Re-reads this element's exact bytes from `source` and decodes them
    /// as UTF-8.
    ///
    /// Seeks to `begin` and reads `end - begin` bytes. Fails with
    /// [`Error::Io`] if the range runs past the end of the source, and with
    /// [`Error::UnfinalizedElement`] if the element was never finalized.
    pub fn extract_range<S: Read + Seek>(&self, source: &mut S) -> Result<String> {
        let end = self
            .end
            .ok_or_else(|| Error::UnfinalizedElement(self.tag.clone()))?;
        source.seek(SeekFrom::Start(self.begin))?;
        let mut buf = vec![0u8; (end - self.begin) as usize];
        source.read_exact(&mut buf)?;
        Ok(str::from_utf8(&buf)?.to_string())
    }
}

/// The flattened representation of an indexed element.
///
/// A pure recursive rendering of a [`Node`] subtree into plain owned data,
/// suitable for handing across API boundaries (and for serialization with
/// the `serde` feature). Offsets are carried along so the raw bytes remain
/// retrievable from an identically structured source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    /// Element name
    pub tag: String,
    /// Concatenated trimmed text content
    pub text: String,
    /// Attributes of the start tag
    pub attributes: HashMap<String, String>,
    /// Child records in document order
    pub children: Vec<Record>,
    /// Byte offset of the element's opening `<`
    pub file_offset_begin: u64,
    /// Byte length of the element's range
    pub file_offset_length: u64,
}

/// An arena of [`Node`]s produced by one parse, rooted at a synthetic
/// `ROOT` node with exactly one child: the indexed record.
///
/// The two record-boundary fields, [`last_record`](IndexTree::last_record)
/// and [`next_record_offset`](IndexTree::next_record_offset), are filled in
/// by the boundary scanner after the parse.
#[derive(Debug)]
pub struct IndexTree {
    nodes: Vec<Node>,
    last_record: bool,
    next_record_offset: Option<u64>,
}

impl IndexTree {
    /// Creates a tree holding only the synthetic root node, beginning at
    /// `begin`.
    pub fn new(begin: u64) -> Self {
        IndexTree {
            nodes: vec![Node::new(ROOT_TAG.to_string(), HashMap::new(), begin)],
            last_record: false,
            next_record_offset: None,
        }
    }

    /// The synthetic root node's id.
    pub fn root(&self) -> NodeId {
        ROOT_ID
    }

    /// The indexed record: the root's single child.
    ///
    /// Always present on trees returned by a successful parse.
    pub fn record(&self) -> Option<NodeId> {
        self.nodes[ROOT_ID.0].first_child()
    }

    /// Whether no further record follows this one in the source.
    pub fn last_record(&self) -> bool {
        self.last_record
    }

    /// Byte offset of the `<` that starts the token after this record.
    pub fn next_record_offset(&self) -> Option<u64> {
        self.next_record_offset
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Mutably borrows a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Allocates a new unattached node in the arena.
    pub fn alloc(
        &mut self,
        tag: impl Into<String>,
        attributes: HashMap<String, String>,
        begin: u64,
    ) -> NodeId {
        self.nodes.push(Node::new(tag.into(), attributes, begin));
        NodeId(self.nodes.len() - 1)
    }

    /// Attaches `child` as the last child of `parent` and sets the child's
    /// parent back-reference.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Number of ancestors between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Collects all descendants of `from` (not only direct children) whose
    /// tag equals `tag`, in preorder.
    pub fn find_descendants_by_tag(&self, from: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_by_tag(from, tag, &mut found);
        found
    }

    fn collect_by_tag(&self, from: NodeId, tag: &str, found: &mut Vec<NodeId>) {
        for &child in &self.nodes[from.0].children {
            if self.nodes[child.0].tag == tag {
                found.push(child);
            }
            self.collect_by_tag(child, tag, found);
        }
    }

    /// Recursively flattens the subtree at `id` into a [`Record`].
    pub fn to_record(&self, id: NodeId) -> Record {
        let node = &self.nodes[id.0];
        Record {
            tag: node.tag.clone(),
            text: node.text.clone(),
            attributes: node.attributes.clone(),
            children: node
                .children
                .iter()
                .map(|&child| self.to_record(child))
                .collect(),
            file_offset_begin: node.begin,
            file_offset_length: node.end.unwrap_or(node.begin) - node.begin,
        }
    }

    /// Consumes the tree and flattens the indexed record.
    pub fn into_record(self) -> Option<Record> {
        self.record().map(|id| self.to_record(id))
    }

    pub(crate) fn set_last_record(&mut self, last: bool) {
        self.last_record = last;
    }

    pub(crate) fn set_next_record_offset(&mut self, offset: u64) {
        self.next_record_offset = Some(offset);
    }
}
