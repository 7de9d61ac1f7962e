//! The attributed document tree and its single-writer mutation layer.

mod attrs;
mod document;
mod mark;
mod node;
mod position;

pub use attrs::{AttrValue, Attrs};
pub use document::{Document, EditEvent, Patch, Transaction};
pub use mark::{sort_marks, Mark};
pub use node::Node;
pub use position::{PathStep, ResolvedPos};

use crate::schema::{MarkKind, NodeKind};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("node kind `{0}` is not enabled in this schema")]
    DisabledKind(NodeKind),
    #[error("mark kind `{0}` is not enabled in this schema")]
    DisabledMark(MarkKind),
    #[error("invalid content for `{parent}`: {reason}")]
    InvalidContent { parent: NodeKind, reason: String },
    #[error("position {0} is outside the document")]
    OutOfRange(usize),
    #[error("no text block at position {0}")]
    NoTextBlock(usize),
}
