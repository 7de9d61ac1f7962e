//! Schema capabilities and the node/mark vocabulary.
//!
//! A [`Schema`] is built once from a [`Capabilities`] value and is immutable
//! for its lifetime. It declares, for every enabled node kind, the content
//! constraint its children must satisfy; checked construction lives here so
//! a tree that violates a constraint fails to build instead of being
//! silently coerced.

mod capabilities;
mod kinds;

pub use capabilities::{Capabilities, DEFAULT_MAX_HEADING_LEVEL};
pub use kinds::{MarkKind, NodeKind};

use std::collections::BTreeMap;

use crate::model::{Attrs, Mark, ModelError, Node};

/// Content constraint a node kind declares for its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentExpr {
    /// No children (leaf or atom).
    None,
    /// Inline children only (text and inline atoms), possibly empty.
    Inline,
    /// Text children only.
    Text,
    /// One or more block children.
    Blocks,
    /// One or more children drawn from the listed kinds.
    OnlyKinds(&'static [NodeKind]),
}

/// Per-kind declaration materialized for an enabled node kind.
#[derive(Debug, Clone, Copy)]
pub struct NodeSpec {
    pub content: ContentExpr,
    pub inline: bool,
    pub atomic: bool,
}

const LIST_CONTENT: &[NodeKind] = &[NodeKind::ListItem];
const TABLE_CONTENT: &[NodeKind] = &[NodeKind::TableRow];
const ROW_CONTENT: &[NodeKind] = &[NodeKind::TableHeader, NodeKind::TableCell];

fn spec_for(kind: NodeKind) -> NodeSpec {
    let content = match kind {
        NodeKind::Doc | NodeKind::Blockquote | NodeKind::ListItem => ContentExpr::Blocks,
        NodeKind::TableCell | NodeKind::TableHeader => ContentExpr::Blocks,
        NodeKind::Paragraph | NodeKind::Heading => ContentExpr::Inline,
        NodeKind::CodeBlock => ContentExpr::Text,
        NodeKind::OrderedList | NodeKind::BulletList => ContentExpr::OnlyKinds(LIST_CONTENT),
        NodeKind::Table => ContentExpr::OnlyKinds(TABLE_CONTENT),
        NodeKind::TableRow => ContentExpr::OnlyKinds(ROW_CONTENT),
        NodeKind::HorizontalRule
        | NodeKind::Image
        | NodeKind::HardBreak
        | NodeKind::Mention
        | NodeKind::Text => ContentExpr::None,
    };
    NodeSpec {
        content,
        inline: kind.is_inline(),
        atomic: kind.is_atom(),
    }
}

/// A materialized schema instance: the enabled subset of the vocabulary plus
/// the per-kind specs, derived once from a capability set.
#[derive(Debug, Clone)]
pub struct Schema {
    caps: Capabilities,
    nodes: BTreeMap<NodeKind, NodeSpec>,
}

impl Schema {
    pub fn new(caps: Capabilities) -> Self {
        let caps = caps.normalized();
        let nodes = caps.nodes.iter().map(|&k| (k, spec_for(k))).collect();
        Schema { caps, nodes }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn has_node(&self, kind: NodeKind) -> bool {
        self.nodes.contains_key(&kind)
    }

    pub fn has_mark(&self, kind: MarkKind) -> bool {
        self.caps.marks.contains(&kind)
    }

    pub fn node_spec(&self, kind: NodeKind) -> Option<&NodeSpec> {
        self.nodes.get(&kind)
    }

    pub fn max_heading_level(&self) -> u8 {
        self.caps.max_heading_level
    }

    /// Checked node construction: the kind must be enabled and the children
    /// must satisfy its content constraint.
    pub fn node(
        &self,
        kind: NodeKind,
        attrs: Attrs,
        content: Vec<Node>,
    ) -> Result<Node, ModelError> {
        self.check_content(kind, &content)?;
        Ok(Node::untrusted(kind, attrs, content))
    }

    /// Checked leaf construction.
    pub fn leaf(&self, kind: NodeKind, attrs: Attrs) -> Result<Node, ModelError> {
        self.node(kind, attrs, Vec::new())
    }

    pub fn text(&self, text: impl Into<String>) -> Node {
        Node::text(text)
    }

    /// Like [`Schema::node`], but fills in required content: loose inline
    /// children are wrapped in paragraphs when the kind wants blocks, and
    /// an empty block container gains one empty paragraph (or list item,
    /// for lists).
    pub fn node_filled(
        &self,
        kind: NodeKind,
        attrs: Attrs,
        mut content: Vec<Node>,
    ) -> Result<Node, ModelError> {
        let spec = self
            .node_spec(kind)
            .ok_or(ModelError::DisabledKind(kind))?;
        match spec.content {
            ContentExpr::Blocks => {
                if content.is_empty() {
                    content = vec![self.node(NodeKind::Paragraph, Attrs::new(), Vec::new())?];
                } else if content.iter().any(|c| c.kind.is_inline()) {
                    // Group loose inline runs into paragraphs (degraded
                    // formatting tokens leave bare text between blocks).
                    let mut grouped = Vec::with_capacity(content.len());
                    let mut run: Vec<Node> = Vec::new();
                    for child in content {
                        if child.kind.is_inline() {
                            run.push(child);
                        } else {
                            if !run.is_empty() {
                                grouped.push(self.node(
                                    NodeKind::Paragraph,
                                    Attrs::new(),
                                    std::mem::take(&mut run),
                                )?);
                            }
                            grouped.push(child);
                        }
                    }
                    if !run.is_empty() {
                        grouped.push(self.node(NodeKind::Paragraph, Attrs::new(), run)?);
                    }
                    content = grouped;
                }
            }
            ContentExpr::OnlyKinds(kinds) if content.is_empty() => {
                let child = kinds
                    .iter()
                    .copied()
                    .find(|&k| self.has_node(k))
                    .ok_or_else(|| ModelError::InvalidContent {
                        parent: kind,
                        reason: "no enabled child kind to fill with".to_string(),
                    })?;
                content = vec![self.node_filled(child, Attrs::new(), Vec::new())?];
            }
            ContentExpr::Text
                if content.iter().any(|c| !c.is_text() || !c.marks.is_empty()) =>
            {
                // Flatten stray inline content to plain text.
                let flat: String = content.iter().map(Node::text_content).collect();
                content = if flat.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::text(flat)]
                };
            }
            _ => {}
        }
        self.node(kind, attrs, content)
    }

    /// Validates the children (and their marks) against `kind`'s constraint.
    pub fn check_content(&self, kind: NodeKind, content: &[Node]) -> Result<(), ModelError> {
        let spec = self
            .node_spec(kind)
            .ok_or(ModelError::DisabledKind(kind))?;
        let fail = |reason: String| ModelError::InvalidContent {
            parent: kind,
            reason,
        };
        for child in content {
            if !self.has_node(child.kind) {
                return Err(ModelError::DisabledKind(child.kind));
            }
            for mark in &child.marks {
                if !self.has_mark(mark.kind) {
                    return Err(ModelError::DisabledMark(mark.kind));
                }
            }
        }
        match spec.content {
            ContentExpr::None => {
                if !content.is_empty() {
                    return Err(fail("leaf kinds take no children".to_string()));
                }
            }
            ContentExpr::Inline => {
                if let Some(bad) = content.iter().find(|c| !c.kind.is_inline()) {
                    return Err(fail(format!("`{}` is not inline", bad.kind)));
                }
            }
            ContentExpr::Text => {
                if let Some(bad) = content.iter().find(|c| !c.is_text()) {
                    return Err(fail(format!("`{}` is not text", bad.kind)));
                }
            }
            ContentExpr::Blocks => {
                if content.is_empty() {
                    return Err(fail("at least one block child required".to_string()));
                }
                if let Some(bad) = content.iter().find(|c| c.kind.is_inline()) {
                    return Err(fail(format!("`{}` is not block level", bad.kind)));
                }
            }
            ContentExpr::OnlyKinds(kinds) => {
                if content.is_empty() {
                    return Err(fail("at least one child required".to_string()));
                }
                if let Some(bad) = content.iter().find(|c| !kinds.contains(&c.kind)) {
                    return Err(fail(format!("`{}` not permitted here", bad.kind)));
                }
            }
        }
        Ok(())
    }

    /// Deep validation of an externally built tree (e.g. deserialized JSON).
    pub fn check(&self, node: &Node) -> Result<(), ModelError> {
        self.check_content(node.kind, &node.content)?;
        for child in &node.content {
            self.check(child)?;
        }
        Ok(())
    }

    /// Checked mark construction.
    pub fn mark(&self, kind: MarkKind, attrs: Attrs) -> Result<Mark, ModelError> {
        if !self.has_mark(kind) {
            return Err(ModelError::DisabledMark(kind));
        }
        Ok(Mark::with_attrs(kind, attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;

    #[test]
    fn list_rejects_non_item_children() {
        let schema = Schema::new(Capabilities::article());
        let para = schema
            .node(NodeKind::Paragraph, Attrs::new(), vec![])
            .unwrap();
        let err = schema
            .node(NodeKind::BulletList, Attrs::new(), vec![para])
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidContent { .. }));
    }

    #[test]
    fn disabled_kind_fails_construction() {
        let schema = Schema::new(Capabilities::message());
        let err = schema.node(NodeKind::Heading, Attrs::new(), vec![]).unwrap_err();
        assert!(matches!(err, ModelError::DisabledKind(NodeKind::Heading)));
    }

    #[test]
    fn node_filled_wraps_inline_in_paragraph() {
        let schema = Schema::new(Capabilities::article());
        let item = schema
            .node_filled(NodeKind::ListItem, Attrs::new(), vec![Node::text("hi")])
            .unwrap();
        assert_eq!(item.content.len(), 1);
        assert_eq!(item.content[0].kind, NodeKind::Paragraph);
    }

    #[test]
    fn node_filled_fills_empty_cell() {
        let schema = Schema::new(Capabilities::article());
        let cell = schema
            .node_filled(NodeKind::TableCell, Attrs::new(), vec![])
            .unwrap();
        assert_eq!(cell.content[0].kind, NodeKind::Paragraph);
        assert!(cell.content[0].content.is_empty());
    }

    #[test]
    fn code_block_flattens_marked_text() {
        let schema = Schema::new(Capabilities::article());
        let marked = Node::text_with_marks("hi", vec![Mark::new(MarkKind::Strong)]);
        let code = schema
            .node_filled(NodeKind::CodeBlock, Attrs::new(), vec![marked])
            .unwrap();
        assert_eq!(code.text_content(), "hi");
        assert!(code.content[0].marks.is_empty());
    }
}
