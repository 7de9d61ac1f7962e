use serde::{Deserialize, Serialize};

use super::attrs::Attrs;
use crate::schema::MarkKind;

/// An inline decoration applied to text. Marks stack, are non-exclusive,
/// and are independent of tree structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: MarkKind,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(kind: MarkKind) -> Self {
        Mark {
            kind,
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(kind: MarkKind, attrs: Attrs) -> Self {
        Mark { kind, attrs }
    }
}

/// Sorts a mark set into the canonical serialization nesting order.
pub fn sort_marks(marks: &mut [Mark]) {
    marks.sort_by_key(|m| m.kind.rank());
}
