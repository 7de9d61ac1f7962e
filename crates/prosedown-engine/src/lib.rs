pub mod markdown;
pub mod model;
pub mod rules;
pub mod schema;

// Re-export key types for easier usage
pub use markdown::{
    MarkdownParser, MarkdownSerializer, MarkdownTransformer, ParseError, SerializeError,
};
pub use model::{
    AttrValue, Attrs, Document, EditEvent, Mark, ModelError, Node, Patch, Transaction,
};
pub use rules::{
    create_table, EditOutcome, InputRule, InputRuleEngine, RuleContext, RuleError,
    LEAF_REPLACEMENT_CHARACTER,
};
pub use schema::{Capabilities, MarkKind, NodeKind, Schema};
