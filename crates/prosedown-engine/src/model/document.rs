//! The live document: one tree, one cursor, one writer.
//!
//! All mutation flows through [`Transaction`]: ops are compiled against a
//! clone of the tree, the result is re-checked against the schema, and the
//! commit is a single swap. External history collaborators see each commit
//! as one [`Patch`] and can treat it as a single undo entry; no partial
//! state is ever observable.

use std::ops::Range;
use std::sync::Arc;

use super::attrs::Attrs;
use super::node::Node;
use super::ModelError;
use crate::schema::{NodeKind, Schema};

/// A text-insertion event at the cursor, as reported by the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    pub text: String,
}

impl EditEvent {
    pub fn insertion(text: impl Into<String>) -> Self {
        EditEvent { text: text.into() }
    }
}

/// Result of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Document range invalidated by the commit.
    pub changed: Range<usize>,
    /// Cursor position after the commit.
    pub selection: usize,
    /// Document version after the commit.
    pub version: u64,
}

#[derive(Debug, Clone)]
pub(crate) enum Op {
    InsertText {
        at: usize,
        text: String,
    },
    DeleteInline {
        from: usize,
        to: usize,
    },
    SetBlockKind {
        at: usize,
        kind: NodeKind,
        attrs: Attrs,
    },
    WrapBlock {
        at: usize,
        outer: NodeKind,
        outer_attrs: Attrs,
        inner: Option<NodeKind>,
    },
    /// Splits the text block at `at` and inserts a new block of `kind`
    /// between the halves; inline content after `at` moves into the new
    /// block.
    InsertBlockAfter {
        at: usize,
        kind: NodeKind,
        attrs: Attrs,
    },
    /// Inserts a prebuilt node after the block containing `at`.
    InsertNodeAfter {
        at: usize,
        node: Node,
    },
    ReplaceBlockWith {
        at: usize,
        node: Node,
    },
}

impl Op {
    fn anchor(&self) -> usize {
        match self {
            Op::InsertText { at, .. }
            | Op::SetBlockKind { at, .. }
            | Op::WrapBlock { at, .. }
            | Op::InsertBlockAfter { at, .. }
            | Op::InsertNodeAfter { at, .. }
            | Op::ReplaceBlockWith { at, .. } => *at,
            Op::DeleteInline { from, .. } => *from,
        }
    }
}

/// An atomic tree rewrite: ops applied in order against a working copy,
/// committed all-or-nothing by [`Document::apply`].
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub(crate) ops: Vec<Op>,
    pub(crate) selection: Option<usize>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction::default()
    }

    pub fn insert_text(mut self, at: usize, text: impl Into<String>) -> Self {
        self.ops.push(Op::InsertText {
            at,
            text: text.into(),
        });
        self
    }

    pub fn delete_inline(mut self, from: usize, to: usize) -> Self {
        self.ops.push(Op::DeleteInline { from, to });
        self
    }

    pub fn set_block_kind(mut self, at: usize, kind: NodeKind, attrs: Attrs) -> Self {
        self.ops.push(Op::SetBlockKind { at, kind, attrs });
        self
    }

    pub fn wrap_block(
        mut self,
        at: usize,
        outer: NodeKind,
        outer_attrs: Attrs,
        inner: Option<NodeKind>,
    ) -> Self {
        self.ops.push(Op::WrapBlock {
            at,
            outer,
            outer_attrs,
            inner,
        });
        self
    }

    pub fn insert_block_after(mut self, at: usize, kind: NodeKind, attrs: Attrs) -> Self {
        self.ops.push(Op::InsertBlockAfter { at, kind, attrs });
        self
    }

    pub fn insert_node_after(mut self, at: usize, node: Node) -> Self {
        self.ops.push(Op::InsertNodeAfter { at, node });
        self
    }

    pub fn replace_block_with(mut self, at: usize, node: Node) -> Self {
        self.ops.push(Op::ReplaceBlockWith { at, node });
        self
    }

    pub fn set_selection(mut self, pos: usize) -> Self {
        self.selection = Some(pos);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.selection.is_none()
    }
}

/// A live document: tree, cursor and version under a single writer.
#[derive(Debug, Clone)]
pub struct Document {
    doc: Node,
    schema: Arc<Schema>,
    selection: usize,
    version: u64,
}

impl Document {
    /// An empty document: one empty paragraph, cursor inside it.
    pub fn new(schema: Arc<Schema>) -> Self {
        let para = Node::untrusted(NodeKind::Paragraph, Attrs::new(), Vec::new());
        let doc = Node::untrusted(NodeKind::Doc, Attrs::new(), vec![para]);
        Document {
            doc,
            schema,
            selection: 1,
            version: 0,
        }
    }

    /// Wraps an existing tree, validating it against the schema first.
    pub fn from_doc(schema: Arc<Schema>, doc: Node) -> Result<Self, ModelError> {
        schema.check(&doc)?;
        let selection = match doc.content.first() {
            Some(first) => first.first_text_position(0),
            None => 0,
        };
        Ok(Document {
            doc,
            schema,
            selection,
            version: 0,
        })
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_selection(&mut self, pos: usize) -> Result<(), ModelError> {
        if pos > self.doc.content_size() {
            return Err(ModelError::OutOfRange(pos));
        }
        self.selection = pos;
        Ok(())
    }

    /// Applies a transaction atomically: every op must succeed and the
    /// resulting tree must re-validate, or nothing is committed.
    pub fn apply(&mut self, tr: Transaction) -> Result<Patch, ModelError> {
        let mut work = self.doc.clone();
        let mut suggested = None;
        let mut touched = usize::MAX;
        for op in &tr.ops {
            touched = touched.min(op.anchor());
            if let Some(pos) = apply_op(&self.schema, &mut work, op)? {
                suggested = Some(pos);
            }
        }
        self.schema.check(&work)?;

        let size = work.content_size();
        let selection = tr
            .selection
            .or(suggested)
            .unwrap_or(self.selection)
            .min(size);
        let changed = if touched == usize::MAX {
            selection..selection
        } else {
            touched.min(size)..size
        };

        self.doc = work;
        self.selection = selection;
        self.version += 1;
        Ok(Patch {
            changed,
            selection,
            version: self.version,
        })
    }
}

/// Applies one op to the working tree, returning a suggested cursor
/// position when the op has a natural one.
fn apply_op(schema: &Schema, doc: &mut Node, op: &Op) -> Result<Option<usize>, ModelError> {
    match op {
        Op::InsertText { at, text } => {
            if text.is_empty() {
                return Ok(None);
            }
            let (indexes, content_start) = locate_textblock(doc, *at)?;
            let block = doc.node_at_mut(&indexes).expect("located path");
            insert_text_local(block, at - content_start, text);
            Ok(Some(at + text.chars().count()))
        }
        Op::DeleteInline { from, to } => {
            if to <= from {
                return Ok(None);
            }
            let (indexes, content_start) = locate_textblock(doc, *from)?;
            let block = doc.node_at_mut(&indexes).expect("located path");
            let end = (*to - content_start).min(block.content_size());
            delete_inline_local(block, from - content_start, end);
            Ok(Some(*from))
        }
        Op::SetBlockKind { at, kind, attrs } => {
            let (indexes, _) = locate_textblock(doc, *at)?;
            let block = doc.node_at_mut(&indexes).expect("located path");
            block.kind = *kind;
            block.attrs = attrs.clone();
            if *kind == NodeKind::CodeBlock {
                let flat = block.text_content();
                block.content = if flat.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::text(flat)]
                };
            }
            Ok(Some(*at))
        }
        Op::WrapBlock {
            at,
            outer,
            outer_attrs,
            inner,
        } => {
            let (parent_indexes, child_index, _) = locate_block_parent(doc, *at)?;
            let parent = doc.node_at_mut(&parent_indexes).expect("located path");
            let block = parent.content.remove(child_index);
            let core = match inner {
                Some(inner_kind) => schema.node(*inner_kind, Attrs::new(), vec![block])?,
                None => block,
            };
            let wrapper = schema.node(*outer, outer_attrs.clone(), vec![core])?;
            parent.content.insert(child_index, wrapper);
            Ok(Some(at + 1 + usize::from(inner.is_some())))
        }
        Op::InsertBlockAfter { at, kind, attrs } => {
            let (indexes, content_start) = locate_textblock(doc, *at)?;
            let block_start = content_start - 1;
            let block = doc.node_at_mut(&indexes).expect("located path");
            let tail = split_tail_local(block, at - content_start);
            let new_block = schema.node_filled(*kind, attrs.clone(), tail)?;
            let prev_size = block.node_size();
            let (parent_indexes, child_index) = split_last(&indexes);
            let parent = doc.node_at_mut(parent_indexes).expect("located path");
            parent.content.insert(child_index + 1, new_block);
            let new_start = block_start + prev_size;
            let inserted = &parent.content[child_index + 1];
            Ok(Some(inserted.first_text_position(new_start)))
        }
        Op::InsertNodeAfter { at, node } => {
            let (parent_indexes, child_index, block_start) = locate_block_parent(doc, *at)?;
            let parent = doc.node_at_mut(&parent_indexes).expect("located path");
            let prev_size = parent.content[child_index].node_size();
            parent.content.insert(child_index + 1, node.clone());
            let new_start = block_start + prev_size;
            let inserted = &parent.content[child_index + 1];
            Ok(Some(inserted.first_text_position(new_start)))
        }
        Op::ReplaceBlockWith { at, node } => {
            let (parent_indexes, child_index, block_start) = locate_block_parent(doc, *at)?;
            let parent = doc.node_at_mut(&parent_indexes).expect("located path");
            parent.content[child_index] = node.clone();
            Ok(Some(parent.content[child_index].first_text_position(block_start)))
        }
    }
}

/// Resolves `at` to the text block whose content holds it.
fn locate_textblock(doc: &Node, at: usize) -> Result<(Vec<usize>, usize), ModelError> {
    let rp = doc.resolve(at)?;
    let indexes = rp.indexes();
    match doc.node_at(&indexes) {
        Some(node) if node.kind.is_textblock() => Ok((indexes, rp.container_content_start())),
        _ => Err(ModelError::NoTextBlock(at)),
    }
}

/// Resolves `at` to the deepest entered block plus its parent: returns
/// (parent path, child index, position of the child node).
fn locate_block_parent(doc: &Node, at: usize) -> Result<(Vec<usize>, usize, usize), ModelError> {
    let rp = doc.resolve(at)?;
    let node_start = rp.path.last().ok_or(ModelError::NoTextBlock(at))?.node_start;
    let mut indexes = rp.indexes();
    let child_index = indexes.pop().expect("non-empty path");
    Ok((indexes, child_index, node_start))
}

fn split_last(indexes: &[usize]) -> (&[usize], usize) {
    let (last, parent) = indexes.split_last().expect("non-empty path");
    (parent, *last)
}

fn char_to_byte(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(b, _)| b)
}

/// Inserts plain text at a local content offset, merging into an adjacent
/// text node (and inheriting its marks) when possible.
fn insert_text_local(block: &mut Node, at: usize, text: &str) {
    let mut cur = 0usize;
    for i in 0..block.content.len() {
        let size = block.content[i].node_size();
        if block.content[i].is_text() && at >= cur && at <= cur + size {
            let t = block.content[i].text.as_mut().expect("text node");
            let byte = char_to_byte(t, at - cur);
            t.insert_str(byte, text);
            return;
        }
        if at <= cur {
            block.content.insert(i, Node::text(text));
            return;
        }
        cur += size;
    }
    block.content.push(Node::text(text));
}

/// Removes the local content range `[from, to)` from a text block.
fn delete_inline_local(block: &mut Node, from: usize, to: usize) {
    let mut out = Vec::with_capacity(block.content.len());
    let mut cur = 0usize;
    for child in block.content.drain(..) {
        let size = child.node_size();
        let (a, b) = (cur, cur + size);
        cur = b;
        if b <= from || a >= to {
            out.push(child);
            continue;
        }
        if let Some(text) = &child.text {
            let head: String = text.chars().take(from.saturating_sub(a)).collect();
            let tail: String = text.chars().skip(to.min(b) - a).collect();
            let kept = head + &tail;
            if !kept.is_empty() {
                out.push(Node::text_with_marks(kept, child.marks.clone()));
            }
        }
        // Atoms overlapped by the range are dropped whole.
    }
    block.content = out;
    merge_adjacent_text(&mut block.content);
}

/// Removes and returns the content after a local offset.
fn split_tail_local(block: &mut Node, at: usize) -> Vec<Node> {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let mut cur = 0usize;
    for child in block.content.drain(..) {
        let size = child.node_size();
        let (a, b) = (cur, cur + size);
        cur = b;
        if b <= at {
            head.push(child);
        } else if a >= at {
            tail.push(child);
        } else if let Some(text) = &child.text {
            let first: String = text.chars().take(at - a).collect();
            let rest: String = text.chars().skip(at - a).collect();
            if !first.is_empty() {
                head.push(Node::text_with_marks(first, child.marks.clone()));
            }
            if !rest.is_empty() {
                tail.push(Node::text_with_marks(rest, child.marks.clone()));
            }
        } else {
            head.push(child);
        }
    }
    block.content = head;
    tail
}

fn merge_adjacent_text(children: &mut Vec<Node>) {
    let mut merged: Vec<Node> = Vec::with_capacity(children.len());
    for child in children.drain(..) {
        if let (Some(last), Some(text)) = (merged.last_mut(), child.text.as_deref())
            && last.is_text()
            && last.marks == child.marks
        {
            last.text.as_mut().expect("text node").push_str(text);
            continue;
        }
        merged.push(child);
    }
    *children = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Capabilities;
    use pretty_assertions::assert_eq;

    fn doc() -> Document {
        Document::new(Arc::new(Schema::new(Capabilities::article())))
    }

    #[test]
    fn insert_text_commits_atomically() {
        let mut d = doc();
        let patch = d.apply(Transaction::new().insert_text(1, "hello")).unwrap();
        assert_eq!(d.doc().text_content(), "hello");
        assert_eq!(patch.selection, 6);
        assert_eq!(d.version(), 1);
    }

    #[test]
    fn failed_transaction_leaves_document_untouched() {
        let mut d = doc();
        d.apply(Transaction::new().insert_text(1, "hi")).unwrap();
        let before = d.doc().clone();
        let version = d.version();
        // Position 99 is outside the document.
        let err = d.apply(Transaction::new().insert_text(99, "x"));
        assert!(err.is_err());
        assert_eq!(d.doc(), &before);
        assert_eq!(d.version(), version);
    }

    #[test]
    fn delete_inline_splits_text() {
        let mut d = doc();
        d.apply(Transaction::new().insert_text(1, "hello world")).unwrap();
        d.apply(Transaction::new().delete_inline(6, 12)).unwrap();
        assert_eq!(d.doc().text_content(), "hello");
    }

    #[test]
    fn set_block_kind_to_heading() {
        let mut d = doc();
        d.apply(Transaction::new().insert_text(1, "title")).unwrap();
        d.apply(
            Transaction::new().set_block_kind(1, NodeKind::Heading, Attrs::new().with("level", 2)),
        )
        .unwrap();
        let block = &d.doc().content[0];
        assert_eq!(block.kind, NodeKind::Heading);
        assert_eq!(block.attrs.int_or("level", 0), 2);
        assert_eq!(block.text_content(), "title");
    }

    #[test]
    fn wrap_block_in_list() {
        let mut d = doc();
        d.apply(Transaction::new().insert_text(1, "item")).unwrap();
        let patch = d
            .apply(Transaction::new().wrap_block(
                1,
                NodeKind::BulletList,
                Attrs::new(),
                Some(NodeKind::ListItem),
            ))
            .unwrap();
        let list = &d.doc().content[0];
        assert_eq!(list.kind, NodeKind::BulletList);
        assert_eq!(list.content[0].kind, NodeKind::ListItem);
        assert_eq!(list.content[0].content[0].kind, NodeKind::Paragraph);
        // Cursor shifted past the two opening boundaries.
        assert_eq!(patch.selection, 3);
    }

    #[test]
    fn insert_block_after_moves_tail() {
        let mut d = doc();
        d.apply(Transaction::new().insert_text(1, "headtail")).unwrap();
        d.apply(
            Transaction::new().insert_block_after(5, NodeKind::Paragraph, Attrs::new()),
        )
        .unwrap();
        assert_eq!(d.doc().content.len(), 2);
        assert_eq!(d.doc().content[0].text_content(), "head");
        assert_eq!(d.doc().content[1].text_content(), "tail");
    }
}
