//! Token stream to document tree.
//!
//! One pass, one frame stack. Mapped node tokens open and close build
//! frames; mapped mark tokens maintain the active mark set applied to text
//! produced inside them; everything unmapped degrades to plain content.
//! Only genuinely structural damage (a mapped close with no matching open,
//! an unclosed frame at end of stream) aborts the parse.

use std::sync::Arc;

use super::mapping::{filter_mapping, FilteredMapping, MappingTarget, ResolvedMapping};
use super::tokens::{tokenize, Nesting, Token, TokenizerOptions};
use crate::model::{Attrs, Mark, ModelError, Node};
use crate::schema::{MarkKind, NodeKind, Schema};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Mismatched token nesting: fatal for the whole document.
    #[error("mismatched token nesting: {0}")]
    Structural(String),
    /// The mapped tree could not be built against the schema; a mapping and
    /// schema that disagree are a configuration fault, not an input fault.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Markdown-to-tree direction of the transform, configured once per schema.
pub struct MarkdownParser {
    schema: Arc<Schema>,
    mapping: FilteredMapping,
    options: TokenizerOptions,
}

struct Frame {
    kind: NodeKind,
    attrs: Attrs,
    content: Vec<Node>,
}

impl MarkdownParser {
    pub fn new(schema: Arc<Schema>) -> Self {
        let mapping = filter_mapping(&schema);
        let options = TokenizerOptions::from_capabilities(schema.capabilities());
        MarkdownParser {
            schema,
            mapping,
            options,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Tokenizes and parses markdown text into a document tree.
    pub fn parse(&self, text: &str) -> Result<Node, ParseError> {
        let tokens = tokenize(text, &self.options);
        self.parse_tokens(&tokens)
    }

    /// Parses an already-tokenized stream. Public so an alternative
    /// tokenizer can sit behind the same boundary.
    pub fn parse_tokens(&self, tokens: &[Token]) -> Result<Node, ParseError> {
        let mut stack = vec![Frame {
            kind: NodeKind::Doc,
            attrs: Attrs::new(),
            content: Vec::new(),
        }];
        let mut marks: Vec<Mark> = Vec::new();

        for tok in tokens {
            match self.mapping.get(tok.name.as_str()) {
                Some(resolved) => match resolved.target {
                    MappingTarget::Node(kind) => {
                        self.node_token(&mut stack, &marks, tok, kind, resolved)?;
                    }
                    MappingTarget::Mark(kind) => {
                        self.mark_token(&mut stack, &mut marks, tok, kind, resolved)?;
                    }
                },
                None if tok.name == "text" => {
                    push_text(top(&mut stack), &tok.content, &marks);
                }
                None => {
                    // Unmapped token: structure is dropped, literal content
                    // survives as plain text.
                    if !tok.content.is_empty() {
                        push_text(top(&mut stack), &tok.content, &marks);
                    }
                }
            }
        }

        if stack.len() != 1 {
            return Err(ParseError::Structural(format!(
                "`{}` left open at end of input",
                stack.last().map_or(NodeKind::Doc, |f| f.kind)
            )));
        }
        let doc = stack.pop().expect("doc frame");
        let mut content = doc.content;
        if content.is_empty() {
            content.push(self.schema.node(NodeKind::Paragraph, Attrs::new(), Vec::new())?);
        }
        Ok(self.schema.node_filled(NodeKind::Doc, Attrs::new(), content)?)
    }

    fn node_token(
        &self,
        stack: &mut Vec<Frame>,
        marks: &[Mark],
        tok: &Token,
        kind: NodeKind,
        resolved: &ResolvedMapping,
    ) -> Result<(), ParseError> {
        match tok.nesting {
            Nesting::Open => {
                stack.push(Frame {
                    kind,
                    attrs: extract_attrs(tok, resolved),
                    content: Vec::new(),
                });
                Ok(())
            }
            Nesting::Close => {
                if stack.len() < 2 {
                    return Err(ParseError::Structural(format!(
                        "close `{}` without matching open",
                        tok.name
                    )));
                }
                let frame = stack.pop().expect("checked depth");
                if frame.kind != kind {
                    return Err(ParseError::Structural(format!(
                        "close `{}` while `{}` is open",
                        tok.name, frame.kind
                    )));
                }
                let mut content = frame.content;
                if kind == NodeKind::CodeBlock {
                    content = trim_code_content(content);
                }
                let node = self.schema.node_filled(kind, frame.attrs, content)?;
                top(stack).content.push(node);
                Ok(())
            }
            Nesting::SelfClosing => {
                let node = self
                    .schema
                    .leaf(kind, extract_attrs(tok, resolved))?
                    .with_marks(if kind.is_inline() {
                        marks.to_vec()
                    } else {
                        Vec::new()
                    });
                top(stack).content.push(node);
                Ok(())
            }
        }
    }

    fn mark_token(
        &self,
        stack: &mut Vec<Frame>,
        marks: &mut Vec<Mark>,
        tok: &Token,
        kind: MarkKind,
        resolved: &ResolvedMapping,
    ) -> Result<(), ParseError> {
        match tok.nesting {
            Nesting::Open => {
                marks.push(Mark::with_attrs(kind, extract_attrs(tok, resolved)));
                Ok(())
            }
            Nesting::Close => match marks.last() {
                Some(mark) if mark.kind == kind => {
                    marks.pop();
                    Ok(())
                }
                _ => Err(ParseError::Structural(format!(
                    "close mark `{}` without matching open",
                    tok.name
                ))),
            },
            Nesting::SelfClosing => {
                // code_inline: content with the mark applied directly.
                let mut with = marks.to_vec();
                with.push(Mark::with_attrs(kind, extract_attrs(tok, resolved)));
                push_text(top(stack), &tok.content, &with);
                Ok(())
            }
        }
    }
}

fn top<'a>(stack: &'a mut [Frame]) -> &'a mut Frame {
    stack.last_mut().expect("stack holds the doc frame")
}

/// Runs the entry's extractor, degrading to default attributes on failure.
fn extract_attrs(tok: &Token, resolved: &ResolvedMapping) -> Attrs {
    match resolved.attrs {
        Some(extractor) => match extractor(tok) {
            Ok(attrs) => attrs,
            Err(err) => {
                log::warn!("degrading to default attributes: {err}");
                Attrs::new()
            }
        },
        None => Attrs::new(),
    }
}

fn push_text(frame: &mut Frame, text: &str, marks: &[Mark]) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = frame.content.last_mut()
        && last.is_text()
        && last.marks == marks
    {
        last.text.as_mut().expect("text node").push_str(text);
        return;
    }
    frame
        .content
        .push(Node::text_with_marks(text, marks.to_vec()));
}

/// Code block text arrives with a trailing newline from the tokenizer;
/// the tree form stores the content without it.
fn trim_code_content(content: Vec<Node>) -> Vec<Node> {
    let mut content = content;
    if let Some(last) = content.last_mut()
        && let Some(text) = last.text.as_mut()
        && text.ends_with('\n')
    {
        text.pop();
        if text.is_empty() {
            content.pop();
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Capabilities;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parser() -> MarkdownParser {
        MarkdownParser::new(Arc::new(Schema::new(Capabilities::article())))
    }

    #[rstest]
    #[case("# one", 1)]
    #[case("### three", 3)]
    #[case("###### six", 6)]
    fn heading_levels(#[case] md: &str, #[case] level: i64) {
        let doc = parser().parse(md).unwrap();
        let heading = &doc.content[0];
        assert_eq!(heading.kind, NodeKind::Heading);
        assert_eq!(heading.attrs.int_or("level", 0), level);
    }

    #[test]
    fn fence_language_or_null() {
        let doc = parser().parse("```rust\nlet x = 1;\n```").unwrap();
        let code = &doc.content[0];
        assert_eq!(code.kind, NodeKind::CodeBlock);
        assert_eq!(code.attrs.str("language"), Some("rust"));
        assert_eq!(code.text_content(), "let x = 1;");

        let doc = parser().parse("```\nplain\n```").unwrap();
        assert!(doc.content[0].attrs.get("language").unwrap().is_null());
    }

    #[test]
    fn ordered_list_start() {
        let doc = parser().parse("3. a\n4. b").unwrap();
        let list = &doc.content[0];
        assert_eq!(list.kind, NodeKind::OrderedList);
        assert_eq!(list.attrs.int_or("order", 1), 3);
        assert_eq!(list.content.len(), 2);
        assert_eq!(list.content[0].kind, NodeKind::ListItem);
        // Tight items still get their paragraph wrapper.
        assert_eq!(list.content[0].content[0].kind, NodeKind::Paragraph);
    }

    #[test]
    fn nested_marks_apply_to_text() {
        let doc = parser().parse("a **_b_** c").unwrap();
        let para = &doc.content[0];
        let marked = para
            .content
            .iter()
            .find(|n| !n.marks.is_empty())
            .expect("marked text");
        assert_eq!(marked.text.as_deref(), Some("b"));
        let kinds: Vec<MarkKind> = marked.marks.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&MarkKind::Strong));
        assert!(kinds.contains(&MarkKind::Em));
    }

    #[test]
    fn link_attrs_survive() {
        let doc = parser().parse("[docs](https://example.com \"Docs\")").unwrap();
        let text = &doc.content[0].content[0];
        let link = text
            .marks
            .iter()
            .find(|m| m.kind == MarkKind::Link)
            .expect("link mark");
        assert_eq!(link.attrs.str("href"), Some("https://example.com"));
        assert_eq!(link.attrs.str("title"), Some("Docs"));
    }

    #[test]
    fn mention_parses_to_node() {
        let doc = parser()
            .parse("hi [@Ada Lovelace](mention://user/42/Ada%20Lovelace)!")
            .unwrap();
        let para = &doc.content[0];
        let mention = para
            .content
            .iter()
            .find(|n| n.kind == NodeKind::Mention)
            .expect("mention node");
        assert_eq!(mention.attrs.str("userId"), Some("42"));
        assert_eq!(mention.attrs.str("userFullName"), Some("Ada Lovelace"));
    }

    #[test]
    fn unsupported_formatting_degrades_to_text() {
        // Message schema has no heading: the text survives, the structure
        // does not.
        let message =
            MarkdownParser::new(Arc::new(Schema::new(Capabilities::message())));
        let doc = message.parse("# title").unwrap();
        assert_eq!(doc.content[0].kind, NodeKind::Paragraph);
        assert_eq!(doc.text_content(), "title");
    }

    #[test]
    fn table_parses_with_alignment() {
        let md = "| a | b |\n| :--- | ---: |\n| c | d |";
        let doc = parser().parse(md).unwrap();
        let table = &doc.content[0];
        assert_eq!(table.kind, NodeKind::Table);
        assert_eq!(table.content.len(), 2);
        let head = &table.content[0];
        assert_eq!(head.content[0].kind, NodeKind::TableHeader);
        assert_eq!(head.content[0].attrs.str("alignment"), Some("left"));
        let body = &table.content[1];
        assert_eq!(body.content[1].kind, NodeKind::TableCell);
        assert_eq!(body.content[1].attrs.str("alignment"), Some("right"));
        // Cell content is wrapped in a paragraph.
        assert_eq!(body.content[0].content[0].kind, NodeKind::Paragraph);
    }

    #[test]
    fn empty_input_yields_empty_paragraph() {
        let doc = parser().parse("").unwrap();
        assert_eq!(doc.content.len(), 1);
        assert_eq!(doc.content[0].kind, NodeKind::Paragraph);
        assert!(doc.content[0].content.is_empty());
    }

    #[test]
    fn stray_close_is_structural_error() {
        let tokens = vec![Token::close("blockquote")];
        let err = parser().parse_tokens(&tokens).unwrap_err();
        assert!(matches!(err, ParseError::Structural(_)));
    }

    #[test]
    fn mismatched_close_is_structural_error() {
        let tokens = vec![Token::open("blockquote"), Token::close("paragraph")];
        let err = parser().parse_tokens(&tokens).unwrap_err();
        assert!(matches!(err, ParseError::Structural(_)));
    }

    #[test]
    fn unclosed_open_is_structural_error() {
        let tokens = vec![Token::open("blockquote")];
        let err = parser().parse_tokens(&tokens).unwrap_err();
        assert!(matches!(err, ParseError::Structural(_)));
    }

    #[test]
    fn malformed_attrs_degrade_not_abort() {
        let tokens = vec![
            Token::open("heading").with_tag("h?"),
            Token::text("still here"),
            Token::close("heading"),
        ];
        let doc = parser().parse_tokens(&tokens).unwrap();
        assert_eq!(doc.content[0].kind, NodeKind::Heading);
        assert!(doc.content[0].attrs.is_empty());
        assert_eq!(doc.text_content(), "still here");
    }

    #[test]
    fn softbreak_maps_to_hard_break() {
        let doc = parser().parse("one\ntwo").unwrap();
        let para = &doc.content[0];
        assert!(para.content.iter().any(|n| n.kind == NodeKind::HardBreak));
    }
}
