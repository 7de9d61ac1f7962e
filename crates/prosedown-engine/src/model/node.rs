use serde::{Deserialize, Serialize};

use super::attrs::Attrs;
use super::mark::Mark;
use crate::schema::NodeKind;

/// A typed element of the document tree.
///
/// Block and inline nodes share one shape: a kind, kind-specific attributes,
/// marks (inline nodes only), ordered children, and text (text kind only).
/// Validated construction goes through [`Schema::node`](crate::schema::Schema::node);
/// trees arriving from outside (JSON) are re-checked with
/// [`Schema::check`](crate::schema::Schema::check).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Node {
    /// Unchecked construction, for code that has already validated content
    /// (the schema, the transaction layer after a full re-check).
    pub(crate) fn untrusted(kind: NodeKind, attrs: Attrs, content: Vec<Node>) -> Self {
        Node {
            kind,
            attrs,
            marks: Vec::new(),
            content,
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node {
            kind: NodeKind::Text,
            attrs: Attrs::new(),
            marks: Vec::new(),
            content: Vec::new(),
            text: Some(text.into()),
        }
    }

    pub fn text_with_marks(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Node {
            marks,
            ..Node::text(text)
        }
    }

    pub fn with_marks(mut self, marks: Vec<Mark>) -> Self {
        self.marks = marks;
        self
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    /// Size of this node in document positions: text counts its characters,
    /// leaves count 1, containers count their content plus an open and a
    /// close position.
    pub fn node_size(&self) -> usize {
        if let Some(text) = &self.text {
            text.chars().count()
        } else if self.kind.is_leaf() {
            1
        } else {
            self.content_size() + 2
        }
    }

    /// Total size of the children in document positions.
    pub fn content_size(&self) -> usize {
        self.content.iter().map(Node::node_size).sum()
    }

    /// Concatenated text of this subtree.
    pub fn text_content(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => self.content.iter().map(Node::text_content).collect(),
        }
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.content.get(index)
    }

    /// Follows child indexes down the tree.
    pub fn node_at(&self, indexes: &[usize]) -> Option<&Node> {
        let mut node = self;
        for &i in indexes {
            node = node.content.get(i)?;
        }
        Some(node)
    }

    pub(crate) fn node_at_mut(&mut self, indexes: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &i in indexes {
            node = node.content.get_mut(i)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        let text = Node::text("hello");
        assert_eq!(text.node_size(), 5);

        let para = Node::untrusted(NodeKind::Paragraph, Attrs::new(), vec![text]);
        assert_eq!(para.node_size(), 7);

        let doc = Node::untrusted(NodeKind::Doc, Attrs::new(), vec![para]);
        assert_eq!(doc.content_size(), 7);

        let rule = Node::untrusted(NodeKind::HorizontalRule, Attrs::new(), vec![]);
        assert_eq!(rule.node_size(), 1);
    }

    #[test]
    fn text_content_concatenates() {
        let para = Node::untrusted(
            NodeKind::Paragraph,
            Attrs::new(),
            vec![Node::text("a"), Node::text("b")],
        );
        assert_eq!(para.text_content(), "ab");
    }
}
