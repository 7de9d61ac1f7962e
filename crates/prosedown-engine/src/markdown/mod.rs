//! The bidirectional markdown transform.
//!
//! Parsing goes token stream -> tree through the capability-filtered
//! mapping; serializing goes tree -> text through the per-kind registry.
//! [`MarkdownTransformer`] bundles both directions for one schema instance.

pub mod mapping;
pub mod parser;
pub mod serializer;
pub mod tokens;

pub use mapping::{
    filter_mapping, AttrExtractor, AttributeExtractionError, FilteredMapping, MappingEntry,
    MappingTarget, ResolvedMapping, UNIVERSAL_MAPPING,
};
pub use parser::{MarkdownParser, ParseError};
pub use serializer::{
    MarkRender, MarkdownSerializer, NodeSerializerFn, SerializeError, SerializerState,
};
pub use tokens::{
    mention_from_uri, tokenize, Nesting, Token, TokenPayload, TokenizerOptions,
    MENTION_URI_PREFIX,
};

use std::sync::Arc;

use crate::model::Node;
use crate::schema::Schema;

/// Both directions of the transform for one schema instance.
pub struct MarkdownTransformer {
    parser: MarkdownParser,
    serializer: MarkdownSerializer,
}

impl MarkdownTransformer {
    pub fn new(schema: Arc<Schema>) -> Self {
        MarkdownTransformer {
            parser: MarkdownParser::new(schema),
            serializer: MarkdownSerializer::full(),
        }
    }

    /// Swaps in a restricted serializer registry (e.g.
    /// [`MarkdownSerializer::plain_text`]) while keeping the parse side.
    pub fn with_serializer(schema: Arc<Schema>, serializer: MarkdownSerializer) -> Self {
        MarkdownTransformer {
            parser: MarkdownParser::new(schema),
            serializer,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.parser.schema()
    }

    pub fn parse(&self, text: &str) -> Result<Node, ParseError> {
        self.parser.parse(text)
    }

    pub fn encode(&self, doc: &Node) -> Result<String, SerializeError> {
        self.serializer.serialize(doc)
    }
}
