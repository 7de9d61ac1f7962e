//! Flat document coordinates.
//!
//! A position counts 1 for every node boundary and 1 for every character of
//! text. Position 0 is the start of the root's content; the root itself
//! contributes no outer boundaries.

use super::node::Node;
use super::ModelError;

/// One step of a resolved path: which child was entered and where it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    /// Index of the entered child within its parent.
    pub index: usize,
    /// Document position of the child node itself.
    pub node_start: usize,
    /// Document position where the child's content begins.
    pub content_start: usize,
}

/// A position resolved against a concrete tree: the path of containers
/// entered from the root down to the deepest node whose content holds the
/// position, plus the offset within that node's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPos {
    pub pos: usize,
    pub path: Vec<PathStep>,
    pub parent_offset: usize,
}

impl ResolvedPos {
    /// Child indexes from the root to the deepest entered node.
    pub fn indexes(&self) -> Vec<usize> {
        self.path.iter().map(|s| s.index).collect()
    }

    /// Document position where the deepest entered node's content begins
    /// (0 when the position resolves directly inside the root).
    pub fn container_content_start(&self) -> usize {
        self.path.last().map_or(0, |s| s.content_start)
    }
}

impl Node {
    /// Resolves `pos` against this tree (self is the root).
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ModelError> {
        if pos > self.content_size() {
            return Err(ModelError::OutOfRange(pos));
        }
        let mut node = self;
        let mut content_start = 0usize;
        let mut offset = pos;
        let mut path = Vec::new();
        loop {
            let mut cur = 0usize;
            let mut entered = None;
            for (i, child) in node.content.iter().enumerate() {
                if offset <= cur {
                    break;
                }
                let size = child.node_size();
                if offset < cur + size {
                    // Strictly inside this child. Descend into containers;
                    // stop at text (offset is a character position).
                    if !child.is_text() && !child.kind.is_leaf() {
                        entered = Some((i, cur));
                    }
                    break;
                }
                cur += size;
            }
            match entered {
                Some((i, cur)) => {
                    path.push(PathStep {
                        index: i,
                        node_start: content_start + cur,
                        content_start: content_start + cur + 1,
                    });
                    content_start = content_start + cur + 1;
                    offset = offset - cur - 1;
                    node = &node.content[i];
                }
                None => {
                    return Ok(ResolvedPos {
                        pos,
                        path,
                        parent_offset: offset,
                    });
                }
            }
        }
    }

    /// Document position of the first text location inside this node, given
    /// the position of the node itself. Descends into first children until a
    /// text block (or childless container) is reached.
    pub fn first_text_position(&self, node_start: usize) -> usize {
        let mut node = self;
        let mut pos = node_start;
        loop {
            if node.is_text() || node.kind.is_leaf() {
                return pos;
            }
            pos += 1; // step inside the open boundary
            if node.kind.is_textblock() {
                return pos;
            }
            match node.content.first() {
                Some(first) => node = first,
                None => return pos,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;
    use crate::schema::NodeKind;

    fn doc_with_para(text: &str) -> Node {
        Node::untrusted(
            NodeKind::Doc,
            Attrs::new(),
            vec![Node::untrusted(
                NodeKind::Paragraph,
                Attrs::new(),
                vec![Node::text(text)],
            )],
        )
    }

    #[test]
    fn resolve_inside_paragraph() {
        let doc = doc_with_para("hi");
        // positions: 0 = before para, 1 = before 'h', 2 = between, 3 = after 'i'
        let rp = doc.resolve(2).unwrap();
        assert_eq!(rp.path.len(), 1);
        assert_eq!(rp.path[0].index, 0);
        assert_eq!(rp.path[0].content_start, 1);
        assert_eq!(rp.parent_offset, 1);
    }

    #[test]
    fn resolve_at_block_boundary_stays_in_root() {
        let doc = doc_with_para("hi");
        let rp = doc.resolve(0).unwrap();
        assert!(rp.path.is_empty());
        assert_eq!(rp.parent_offset, 0);
    }

    #[test]
    fn resolve_out_of_range() {
        let doc = doc_with_para("hi");
        assert!(doc.resolve(99).is_err());
    }

    #[test]
    fn first_text_position_descends() {
        let cell = Node::untrusted(
            NodeKind::TableCell,
            Attrs::new(),
            vec![Node::untrusted(NodeKind::Paragraph, Attrs::new(), vec![])],
        );
        let row = Node::untrusted(NodeKind::TableRow, Attrs::new(), vec![cell]);
        let table = Node::untrusted(NodeKind::Table, Attrs::new(), vec![row]);
        // table at 0: row at 1, cell at 2, paragraph at 3, content at 4
        assert_eq!(table.first_text_position(0), 4);
    }
}
