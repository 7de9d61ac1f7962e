use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::kinds::{MarkKind, NodeKind};

/// The capability set of one deployed editor: which node and mark kinds the
/// schema enables, whether tables are available, and how deep headings go.
///
/// Computed once per schema instance and treated as read-only configuration
/// by everything downstream (mapping filter, tokenizer options, rule engine,
/// serializer) rather than queried ad hoc per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub nodes: BTreeSet<NodeKind>,
    pub marks: BTreeSet<MarkKind>,
    pub tables: bool,
    pub max_heading_level: u8,
}

pub const DEFAULT_MAX_HEADING_LEVEL: u8 = 6;

impl Capabilities {
    /// The full article editor: every kind in the vocabulary.
    pub fn article() -> Self {
        Capabilities {
            nodes: NodeKind::ALL.into_iter().collect(),
            marks: MarkKind::ALL.into_iter().collect(),
            tables: true,
            max_heading_level: DEFAULT_MAX_HEADING_LEVEL,
        }
    }

    /// The constrained message editor: no headings, tables, images or
    /// superscript.
    pub fn message() -> Self {
        Capabilities {
            nodes: [
                NodeKind::Doc,
                NodeKind::Paragraph,
                NodeKind::Blockquote,
                NodeKind::CodeBlock,
                NodeKind::OrderedList,
                NodeKind::BulletList,
                NodeKind::ListItem,
                NodeKind::HorizontalRule,
                NodeKind::HardBreak,
                NodeKind::Mention,
                NodeKind::Text,
            ]
            .into_iter()
            .collect(),
            marks: [
                MarkKind::Link,
                MarkKind::Em,
                MarkKind::Strong,
                MarkKind::Strike,
                MarkKind::Code,
            ]
            .into_iter()
            .collect(),
            tables: false,
            max_heading_level: DEFAULT_MAX_HEADING_LEVEL,
        }
    }

    pub fn with_node(mut self, kind: NodeKind) -> Self {
        self.nodes.insert(kind);
        self
    }

    pub fn without_node(mut self, kind: NodeKind) -> Self {
        self.nodes.remove(&kind);
        self
    }

    pub fn with_mark(mut self, kind: MarkKind) -> Self {
        self.marks.insert(kind);
        self
    }

    pub fn without_mark(mut self, kind: MarkKind) -> Self {
        self.marks.remove(&kind);
        self
    }

    pub fn with_tables(mut self, tables: bool) -> Self {
        self.tables = tables;
        self
    }

    /// Applies the baseline and the `tables` flag: `doc`/`paragraph`/`text`
    /// are always present, table kinds only when tables are on.
    pub(crate) fn normalized(mut self) -> Self {
        self.nodes.insert(NodeKind::Doc);
        self.nodes.insert(NodeKind::Paragraph);
        self.nodes.insert(NodeKind::Text);
        if self.tables {
            // Header cells stay governed by the explicit node set: a table
            // schema without `table_header` builds plain-cell tables.
            self.nodes.insert(NodeKind::Table);
            self.nodes.insert(NodeKind::TableRow);
            self.nodes.insert(NodeKind::TableCell);
        } else {
            self.nodes.remove(&NodeKind::Table);
            self.nodes.remove(&NodeKind::TableRow);
            self.nodes.remove(&NodeKind::TableCell);
            self.nodes.remove(&NodeKind::TableHeader);
        }
        if self.max_heading_level == 0 || self.max_heading_level > DEFAULT_MAX_HEADING_LEVEL {
            self.max_heading_level = DEFAULT_MAX_HEADING_LEVEL;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_preset_has_no_tables_or_headings() {
        let caps = Capabilities::message().normalized();
        assert!(!caps.nodes.contains(&NodeKind::Table));
        assert!(!caps.nodes.contains(&NodeKind::Heading));
        assert!(caps.nodes.contains(&NodeKind::Paragraph));
    }

    #[test]
    fn tables_flag_wins_over_node_list() {
        let caps = Capabilities::article().with_tables(false).normalized();
        assert!(!caps.nodes.contains(&NodeKind::Table));
        assert!(!caps.nodes.contains(&NodeKind::TableHeader));

        let caps = Capabilities::message().with_tables(true).normalized();
        assert!(caps.nodes.contains(&NodeKind::Table));
        assert!(caps.nodes.contains(&NodeKind::TableCell));
    }

    #[test]
    fn baseline_kinds_always_present() {
        let caps = Capabilities {
            nodes: BTreeSet::new(),
            marks: BTreeSet::new(),
            tables: false,
            max_heading_level: 0,
        }
        .normalized();
        assert!(caps.nodes.contains(&NodeKind::Doc));
        assert!(caps.nodes.contains(&NodeKind::Paragraph));
        assert!(caps.nodes.contains(&NodeKind::Text));
        assert_eq!(caps.max_heading_level, DEFAULT_MAX_HEADING_LEVEL);
    }
}
