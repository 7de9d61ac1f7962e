//! The universal token-to-kind mapping table and its capability filter.
//!
//! Entries are declared once for the whole vocabulary and only materialized
//! for a schema instance when their target kind is enabled. An entry may
//! declare several target aliases in preference order (the header-cell
//! token falls back to a plain cell when headers are off); the filter keeps
//! the entry if any alias is enabled and resolves it to the first enabled
//! one. Token types with no surviving entry are simply absent from the
//! filtered map and degrade to plain content in the parser.

use std::collections::BTreeMap;

use super::tokens::{Token, TokenPayload};
use crate::model::{AttrValue, Attrs};
use crate::schema::{MarkKind, NodeKind, Schema};

#[derive(Debug, thiserror::Error)]
#[error("cannot extract attributes from `{token}` token: {reason}")]
pub struct AttributeExtractionError {
    pub token: String,
    pub reason: String,
}

impl AttributeExtractionError {
    fn new(token: &Token, reason: impl Into<String>) -> Self {
        AttributeExtractionError {
            token: token.name.clone(),
            reason: reason.into(),
        }
    }
}

pub type AttrExtractor = fn(&Token) -> Result<Attrs, AttributeExtractionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingTarget {
    Node(NodeKind),
    Mark(MarkKind),
}

/// One universal table entry: alias targets in preference order plus an
/// optional attribute extractor whose expected payload shape is part of
/// this declaration.
#[derive(Clone, Copy)]
pub struct MappingEntry {
    pub targets: &'static [MappingTarget],
    pub attrs: Option<AttrExtractor>,
}

/// A filtered entry: the single enabled target this schema maps to.
#[derive(Clone, Copy)]
pub struct ResolvedMapping {
    pub target: MappingTarget,
    pub attrs: Option<AttrExtractor>,
}

pub type FilteredMapping = BTreeMap<&'static str, ResolvedMapping>;

use MappingTarget::{Mark, Node};

/// The universal mapping table for the whole vocabulary.
pub static UNIVERSAL_MAPPING: &[(&str, MappingEntry)] = &[
    ("paragraph", entry(&[Node(NodeKind::Paragraph)], None)),
    ("blockquote", entry(&[Node(NodeKind::Blockquote)], None)),
    (
        "heading",
        entry(&[Node(NodeKind::Heading)], Some(heading_attrs)),
    ),
    ("fence", entry(&[Node(NodeKind::CodeBlock)], Some(fence_attrs))),
    ("code_block", entry(&[Node(NodeKind::CodeBlock)], None)),
    (
        "ordered_list",
        entry(&[Node(NodeKind::OrderedList)], Some(ordered_list_attrs)),
    ),
    ("bullet_list", entry(&[Node(NodeKind::BulletList)], None)),
    ("list_item", entry(&[Node(NodeKind::ListItem)], None)),
    ("hr", entry(&[Node(NodeKind::HorizontalRule)], None)),
    ("softbreak", entry(&[Node(NodeKind::HardBreak)], None)),
    ("hardbreak", entry(&[Node(NodeKind::HardBreak)], None)),
    ("image", entry(&[Node(NodeKind::Image)], Some(image_attrs))),
    (
        "mention",
        entry(&[Node(NodeKind::Mention)], Some(mention_attrs)),
    ),
    ("table", entry(&[Node(NodeKind::Table)], None)),
    ("tr", entry(&[Node(NodeKind::TableRow)], None)),
    (
        "th",
        entry(
            &[Node(NodeKind::TableHeader), Node(NodeKind::TableCell)],
            Some(cell_attrs),
        ),
    ),
    ("td", entry(&[Node(NodeKind::TableCell)], Some(cell_attrs))),
    ("em", entry(&[Mark(MarkKind::Em)], None)),
    ("strong", entry(&[Mark(MarkKind::Strong)], None)),
    ("s", entry(&[Mark(MarkKind::Strike)], None)),
    ("sup", entry(&[Mark(MarkKind::Superscript)], None)),
    ("code_inline", entry(&[Mark(MarkKind::Code)], None)),
    ("link", entry(&[Mark(MarkKind::Link)], Some(link_attrs))),
];

const fn entry(targets: &'static [MappingTarget], attrs: Option<AttrExtractor>) -> MappingEntry {
    MappingEntry { targets, attrs }
}

/// Narrows the universal table to the entries this schema supports.
pub fn filter_mapping(schema: &Schema) -> FilteredMapping {
    UNIVERSAL_MAPPING
        .iter()
        .filter_map(|(name, entry)| {
            let target = entry.targets.iter().copied().find(|t| match t {
                Node(kind) => schema.has_node(*kind),
                Mark(kind) => schema.has_mark(*kind),
            })?;
            Some((
                *name,
                ResolvedMapping {
                    target,
                    attrs: entry.attrs,
                },
            ))
        })
        .collect()
}

// Attribute extractors. Failures degrade the node to its default attribute
// form in the parser; they never abort a parse.

fn heading_attrs(tok: &Token) -> Result<Attrs, AttributeExtractionError> {
    let level: i64 = tok
        .tag
        .strip_prefix('h')
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| AttributeExtractionError::new(tok, format!("bad tag `{}`", tok.tag)))?;
    Ok(Attrs::new().with("level", level))
}

fn fence_attrs(tok: &Token) -> Result<Attrs, AttributeExtractionError> {
    let language = tok.info.trim();
    Ok(Attrs::new().with(
        "language",
        if language.is_empty() {
            AttrValue::Null
        } else {
            AttrValue::from(language)
        },
    ))
}

fn ordered_list_attrs(tok: &Token) -> Result<Attrs, AttributeExtractionError> {
    let order = tok
        .attr_get("order")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(1);
    Ok(Attrs::new().with("order", order))
}

fn link_attrs(tok: &Token) -> Result<Attrs, AttributeExtractionError> {
    let href = tok
        .attr_get("href")
        .ok_or_else(|| AttributeExtractionError::new(tok, "missing href"))?;
    let mut attrs = Attrs::new().with("href", href);
    if let Some(title) = tok.attr_get("title") {
        attrs.set("title", title);
    }
    Ok(attrs)
}

fn image_attrs(tok: &Token) -> Result<Attrs, AttributeExtractionError> {
    let src = tok
        .attr_get("src")
        .ok_or_else(|| AttributeExtractionError::new(tok, "missing src"))?;
    let mut attrs = Attrs::new().with("src", src);
    if let Some(alt) = tok.attr_get("alt") {
        attrs.set("alt", alt);
    }
    if let Some(title) = tok.attr_get("title") {
        attrs.set("title", title);
    }
    Ok(attrs)
}

fn mention_attrs(tok: &Token) -> Result<Attrs, AttributeExtractionError> {
    match &tok.payload {
        TokenPayload::Mention {
            user_id,
            user_full_name,
        } => Ok(Attrs::new()
            .with("userId", user_id.as_str())
            .with("userFullName", user_full_name.as_str())),
        TokenPayload::None => Err(AttributeExtractionError::new(tok, "missing mention payload")),
    }
}

fn cell_attrs(tok: &Token) -> Result<Attrs, AttributeExtractionError> {
    let span = |name: &str| -> Result<i64, AttributeExtractionError> {
        match tok.attr_get(name) {
            None => Ok(1),
            Some(raw) => raw
                .parse()
                .map_err(|_| AttributeExtractionError::new(tok, format!("bad {name} `{raw}`"))),
        }
    };
    let mut attrs = Attrs::new()
        .with("colspan", span("colspan")?)
        .with("rowspan", span("rowspan")?);
    if !tok.info.is_empty() {
        attrs.set("alignment", tok.info.as_str());
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Capabilities;

    #[test]
    fn message_schema_drops_table_and_heading_entries() {
        let schema = Schema::new(Capabilities::message());
        let mapping = filter_mapping(&schema);
        assert!(!mapping.contains_key("table"));
        assert!(!mapping.contains_key("th"));
        assert!(!mapping.contains_key("heading"));
        assert!(!mapping.contains_key("sup"));
        assert!(mapping.contains_key("blockquote"));
        assert!(mapping.contains_key("s"));
    }

    #[test]
    fn header_cell_falls_back_to_plain_cell_alias() {
        // Tables on, but no header kind declared.
        let schema = Schema::new(Capabilities::message().with_tables(true));
        let mapping = filter_mapping(&schema);
        match mapping.get("th") {
            Some(resolved) => {
                assert_eq!(resolved.target, MappingTarget::Node(NodeKind::TableCell));
            }
            None => panic!("th entry should survive via its alias"),
        }
    }

    #[test]
    fn fence_language_is_trimmed_or_null() {
        let tok = Token::open("fence").with_info("  rust  ");
        let attrs = fence_attrs(&tok).unwrap();
        assert_eq!(attrs.str("language"), Some("rust"));

        let tok = Token::open("fence").with_info("   ");
        let attrs = fence_attrs(&tok).unwrap();
        assert!(attrs.get("language").unwrap().is_null());
    }

    #[test]
    fn heading_level_comes_from_tag() {
        let tok = Token::open("heading").with_tag("h4");
        assert_eq!(heading_attrs(&tok).unwrap().int_or("level", 0), 4);

        let tok = Token::open("heading").with_tag("bogus");
        assert!(heading_attrs(&tok).is_err());
    }

    #[test]
    fn cell_span_defaults_and_errors() {
        let tok = Token::open("td");
        let attrs = cell_attrs(&tok).unwrap();
        assert_eq!(attrs.int_or("colspan", 0), 1);
        assert_eq!(attrs.int_or("rowspan", 0), 1);

        let tok = Token::open("td").with_attr("colspan", "wide");
        assert!(cell_attrs(&tok).is_err());
    }
}
