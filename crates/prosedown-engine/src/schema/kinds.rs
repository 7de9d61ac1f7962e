use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed node vocabulary.
///
/// A concrete [`Schema`](super::Schema) enables a subset of these kinds;
/// nothing downstream assumes they are all present. `Doc`, `Paragraph` and
/// `Text` are the baseline every schema carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Doc,
    Paragraph,
    Blockquote,
    Heading,
    CodeBlock,
    OrderedList,
    BulletList,
    ListItem,
    HorizontalRule,
    Table,
    TableRow,
    TableCell,
    TableHeader,
    Image,
    HardBreak,
    Mention,
    Text,
}

impl NodeKind {
    pub const ALL: [NodeKind; 17] = [
        NodeKind::Doc,
        NodeKind::Paragraph,
        NodeKind::Blockquote,
        NodeKind::Heading,
        NodeKind::CodeBlock,
        NodeKind::OrderedList,
        NodeKind::BulletList,
        NodeKind::ListItem,
        NodeKind::HorizontalRule,
        NodeKind::Table,
        NodeKind::TableRow,
        NodeKind::TableCell,
        NodeKind::TableHeader,
        NodeKind::Image,
        NodeKind::HardBreak,
        NodeKind::Mention,
        NodeKind::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Doc => "doc",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Blockquote => "blockquote",
            NodeKind::Heading => "heading",
            NodeKind::CodeBlock => "code_block",
            NodeKind::OrderedList => "ordered_list",
            NodeKind::BulletList => "bullet_list",
            NodeKind::ListItem => "list_item",
            NodeKind::HorizontalRule => "horizontal_rule",
            NodeKind::Table => "table",
            NodeKind::TableRow => "table_row",
            NodeKind::TableCell => "table_cell",
            NodeKind::TableHeader => "table_header",
            NodeKind::Image => "image",
            NodeKind::HardBreak => "hard_break",
            NodeKind::Mention => "mention",
            NodeKind::Text => "text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        NodeKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Inline kinds live inside text blocks; everything else is block level.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            NodeKind::Text | NodeKind::Image | NodeKind::HardBreak | NodeKind::Mention
        )
    }

    /// Leaf kinds have no content and occupy a single document position.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Image | NodeKind::HardBreak | NodeKind::Mention | NodeKind::HorizontalRule
        )
    }

    /// Atomic kinds are opaque to editing: non-decomposable as a unit.
    pub fn is_atom(self) -> bool {
        matches!(self, NodeKind::Image | NodeKind::Mention)
    }

    /// Text blocks hold inline content directly and are what input rules
    /// scan and convert.
    pub fn is_textblock(self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph | NodeKind::Heading | NodeKind::CodeBlock
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fixed mark vocabulary: inline, stackable decorations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Link,
    Em,
    Strong,
    Strike,
    Superscript,
    Code,
}

impl MarkKind {
    pub const ALL: [MarkKind; 6] = [
        MarkKind::Link,
        MarkKind::Em,
        MarkKind::Strong,
        MarkKind::Strike,
        MarkKind::Superscript,
        MarkKind::Code,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarkKind::Link => "link",
            MarkKind::Em => "em",
            MarkKind::Strong => "strong",
            MarkKind::Strike => "strike",
            MarkKind::Superscript => "superscript",
            MarkKind::Code => "code",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        MarkKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Canonical nesting rank for serialization. Lower ranks open first, so
    /// round-tripping reconstructs equivalent mark sets regardless of the
    /// order marks were applied in.
    pub fn rank(self) -> u8 {
        match self {
            MarkKind::Link => 0,
            MarkKind::Em => 1,
            MarkKind::Strong => 2,
            MarkKind::Strike => 3,
            MarkKind::Superscript => 4,
            MarkKind::Code => 5,
        }
    }
}

impl fmt::Display for MarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
