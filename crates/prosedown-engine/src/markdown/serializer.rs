//! Document tree to markdown text.
//!
//! Every node kind gets an independent serializer function in a registry;
//! marks get wrapping delimiters applied in one canonical nesting order.
//! Looking up a kind with no registered function is a hard
//! [`SerializeError::UnsupportedNode`], never a silent drop: an
//! unimplemented reverse path must surface to the caller instead of
//! producing corrupted output.

use std::collections::BTreeMap;

use super::tokens::MENTION_URI_PREFIX;
use crate::model::{sort_marks, Mark, Node};
use crate::schema::{MarkKind, NodeKind};

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("no serializer registered for node kind `{0}`")]
    UnsupportedNode(NodeKind),
    #[error("no serializer registered for mark kind `{0}`")]
    UnsupportedMark(MarkKind),
}

pub type NodeSerializerFn = fn(&mut SerializerState<'_>, &Node) -> Result<(), SerializeError>;

/// How a mark renders: fixed delimiters, or the link form whose closing
/// text depends on the mark's attributes.
#[derive(Debug, Clone, Copy)]
pub enum MarkRender {
    Fixed {
        open: &'static str,
        close: &'static str,
    },
    Link,
}

/// Tree-to-markdown direction of the transform.
pub struct MarkdownSerializer {
    nodes: BTreeMap<NodeKind, NodeSerializerFn>,
    marks: BTreeMap<MarkKind, MarkRender>,
}

impl MarkdownSerializer {
    pub fn new(
        nodes: BTreeMap<NodeKind, NodeSerializerFn>,
        marks: BTreeMap<MarkKind, MarkRender>,
    ) -> Self {
        MarkdownSerializer { nodes, marks }
    }

    /// The full registry: every kind in the vocabulary.
    pub fn full() -> Self {
        let nodes: BTreeMap<NodeKind, NodeSerializerFn> = BTreeMap::from([
            (NodeKind::Paragraph, paragraph as NodeSerializerFn),
            (NodeKind::Blockquote, blockquote),
            (NodeKind::Heading, heading),
            (NodeKind::CodeBlock, code_block),
            (NodeKind::OrderedList, ordered_list),
            (NodeKind::BulletList, bullet_list),
            (NodeKind::ListItem, list_item),
            (NodeKind::HorizontalRule, horizontal_rule),
            (NodeKind::Table, table),
            (NodeKind::TableRow, table_row),
            (NodeKind::TableCell, table_cell),
            (NodeKind::TableHeader, table_cell),
            (NodeKind::Image, image),
            (NodeKind::HardBreak, hard_break),
            (NodeKind::Mention, mention),
            (NodeKind::Text, text_node),
        ]);
        let marks = BTreeMap::from([
            (
                MarkKind::Em,
                MarkRender::Fixed {
                    open: "_",
                    close: "_",
                },
            ),
            (
                MarkKind::Strong,
                MarkRender::Fixed {
                    open: "**",
                    close: "**",
                },
            ),
            (
                MarkKind::Code,
                MarkRender::Fixed {
                    open: "`",
                    close: "`",
                },
            ),
            (
                MarkKind::Strike,
                MarkRender::Fixed {
                    open: "~~",
                    close: "~~",
                },
            ),
            (
                MarkKind::Superscript,
                MarkRender::Fixed {
                    open: "^",
                    close: "^",
                },
            ),
            (MarkKind::Link, MarkRender::Link),
        ]);
        MarkdownSerializer { nodes, marks }
    }

    /// The restricted plain-text registry: paragraphs, text and hard breaks
    /// only, no marks. Anything else surfaces as `UnsupportedNode`.
    pub fn plain_text() -> Self {
        let nodes: BTreeMap<NodeKind, NodeSerializerFn> = BTreeMap::from([
            (NodeKind::Paragraph, paragraph as NodeSerializerFn),
            (NodeKind::HardBreak, hard_break),
            (NodeKind::Text, text_node),
        ]);
        MarkdownSerializer {
            nodes,
            marks: BTreeMap::new(),
        }
    }

    pub fn serialize(&self, doc: &Node) -> Result<String, SerializeError> {
        let mut state = SerializerState::new(self);
        state.render_content(doc)?;
        Ok(state.finish())
    }
}

/// Accumulates output during one serializer walk. The tree is read-only
/// for the duration.
pub struct SerializerState<'a> {
    serializer: &'a MarkdownSerializer,
    out: String,
    delim: String,
    closed: bool,
    in_tight_list: bool,
    in_table: bool,
}

impl<'a> SerializerState<'a> {
    fn new(serializer: &'a MarkdownSerializer) -> Self {
        SerializerState {
            serializer,
            out: String::new(),
            delim: String::new(),
            closed: false,
            in_tight_list: false,
            in_table: false,
        }
    }

    fn finish(self) -> String {
        self.out
    }

    fn at_blank(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    /// Emits the pending block separation: a newline, plus `size - 1` blank
    /// delimiter lines.
    fn flush_close(&mut self, size: usize) {
        if !self.closed {
            return;
        }
        if !self.at_blank() {
            self.out.push('\n');
        }
        if size > 1 && !self.out.is_empty() {
            let blank = self.delim.trim_end().to_string();
            for _ in 1..size {
                self.out.push_str(&blank);
                self.out.push('\n');
            }
        }
        self.closed = false;
    }

    /// Writes raw output, prefixing the block delimiter at line starts.
    pub fn write(&mut self, content: &str) {
        self.flush_close(2);
        if !self.delim.is_empty() && self.at_blank() {
            let delim = self.delim.clone();
            self.out.push_str(&delim);
        }
        self.out.push_str(content);
    }

    pub fn ensure_new_line(&mut self) {
        if !self.at_blank() {
            self.out.push('\n');
        }
    }

    pub fn close_block(&mut self) {
        self.closed = true;
    }

    /// Writes text content, escaping markdown syntax and handling embedded
    /// newlines line by line.
    pub fn text(&mut self, text: &str, escape: bool) {
        let lines: Vec<&str> = text.split('\n').collect();
        let last = lines.len() - 1;
        for (i, line) in lines.iter().enumerate() {
            let start_of_line = self.at_blank() || self.closed;
            let rendered = if escape {
                self.esc(line, start_of_line)
            } else {
                (*line).to_string()
            };
            self.write(&rendered);
            if i != last {
                self.out.push('\n');
            }
        }
    }

    /// Runs `f` with `delim` added to the per-line prefix, writing
    /// `first_delim` (or `delim`) before the wrapped content.
    pub fn wrap_block<F>(
        &mut self,
        delim: &str,
        first_delim: Option<&str>,
        f: F,
    ) -> Result<(), SerializeError>
    where
        F: FnOnce(&mut Self) -> Result<(), SerializeError>,
    {
        let old = self.delim.clone();
        self.write(first_delim.unwrap_or(delim));
        self.delim.push_str(delim);
        f(self)?;
        self.delim = old;
        self.close_block();
        Ok(())
    }

    /// Renders one node through the registry. A kind with no entry is a
    /// hard failure.
    pub fn render(&mut self, node: &Node) -> Result<(), SerializeError> {
        let f = *self
            .serializer
            .nodes
            .get(&node.kind)
            .ok_or(SerializeError::UnsupportedNode(node.kind))?;
        f(self, node)
    }

    pub fn render_content(&mut self, node: &Node) -> Result<(), SerializeError> {
        for child in &node.content {
            self.render(child)?;
        }
        Ok(())
    }

    /// Renders inline content with marks as wrapping delimiters, opened and
    /// closed in canonical rank order so round-trips reconstruct the same
    /// mark sets.
    pub fn render_inline(&mut self, parent: &Node) -> Result<(), SerializeError> {
        let mut active: Vec<Mark> = Vec::new();
        // A hard break at the end of a block cannot round-trip; trailing
        // ones are dropped.
        let upto = parent
            .content
            .iter()
            .rposition(|c| c.kind != NodeKind::HardBreak)
            .map_or(0, |i| i + 1);
        for child in parent.content.iter().take(upto) {
            let mut wanted = child.marks.clone();
            sort_marks(&mut wanted);
            let keep = active
                .iter()
                .zip(&wanted)
                .take_while(|(a, b)| a == b)
                .count();
            while active.len() > keep {
                let mark = active.pop().expect("checked length");
                let close = self.mark_close(&mark)?;
                self.write(&close);
            }
            for mark in &wanted[keep..] {
                let open = self.mark_open(mark)?;
                self.write(&open);
                active.push(mark.clone());
            }
            self.render(child)?;
        }
        while let Some(mark) = active.pop() {
            let close = self.mark_close(&mark)?;
            self.write(&close);
        }
        Ok(())
    }

    fn mark_render(&self, mark: &Mark) -> Result<MarkRender, SerializeError> {
        self.serializer
            .marks
            .get(&mark.kind)
            .copied()
            .ok_or(SerializeError::UnsupportedMark(mark.kind))
    }

    fn mark_open(&self, mark: &Mark) -> Result<String, SerializeError> {
        Ok(match self.mark_render(mark)? {
            MarkRender::Fixed { open, .. } => open.to_string(),
            MarkRender::Link => "[".to_string(),
        })
    }

    fn mark_close(&self, mark: &Mark) -> Result<String, SerializeError> {
        Ok(match self.mark_render(mark)? {
            MarkRender::Fixed { close, .. } => close.to_string(),
            MarkRender::Link => {
                let href = mark.attrs.str("href").unwrap_or_default();
                match mark.attrs.str("title") {
                    Some(title) => {
                        format!("]({} \"{}\")", href, title.replace('"', "\\\""))
                    }
                    None => format!("]({href})"),
                }
            }
        })
    }

    /// Context-aware escaping: characters significant to the markdown
    /// grammar are backslash-escaped, with extra care at line starts and
    /// inside tables.
    pub fn esc(&self, text: &str, start_of_line: bool) -> String {
        // An ordered-list lookalike ("12. x" at line start) needs its dot
        // escaped.
        let dot_index = if start_of_line {
            let digits = text.chars().take_while(char::is_ascii_digit).count();
            (digits > 0 && text.chars().nth(digits) == Some('.')).then_some(digits)
        } else {
            None
        };

        let mut out = String::with_capacity(text.len());
        for (i, ch) in text.chars().enumerate() {
            let escape = match ch {
                '`' | '*' | '_' | '[' | ']' | '\\' | '~' | '^' => true,
                '|' => self.in_table,
                '#' | '>' | '-' | '+' => start_of_line && i == 0,
                '.' => dot_index == Some(i),
                _ => false,
            };
            if escape {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    }
}

// Node serializer functions, one per kind, registered in
// `MarkdownSerializer::full`.

fn paragraph(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    state.render_inline(node)?;
    state.close_block();
    Ok(())
}

fn blockquote(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    state.wrap_block("> ", None, |state| state.render_content(node))
}

fn heading(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    let level = node.attrs.int_or("level", 1).clamp(1, 6) as usize;
    state.write(&format!("{} ", "#".repeat(level)));
    state.render_inline(node)?;
    state.close_block();
    Ok(())
}

fn code_block(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    let language = node.attrs.str("language").unwrap_or_default();
    state.write(&format!("```{language}\n"));
    state.text(&node.text_content(), false);
    state.ensure_new_line();
    state.write("```");
    state.close_block();
    Ok(())
}

fn horizontal_rule(state: &mut SerializerState<'_>, _node: &Node) -> Result<(), SerializeError> {
    state.write("---");
    state.close_block();
    Ok(())
}

fn bullet_list(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    render_list(state, node, "  ", |_| "* ".to_string())
}

fn ordered_list(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    let start = node.attrs.int_or("order", 1);
    let max_width = (start + node.content.len() as i64 - 1).to_string().len();
    let indent = " ".repeat(max_width + 2);
    render_list(state, node, &indent, |i| {
        let number = (start + i as i64).to_string();
        format!("{}{}. ", " ".repeat(max_width - number.len()), number)
    })
}

fn render_list<F>(
    state: &mut SerializerState<'_>,
    node: &Node,
    delim: &str,
    first_delim: F,
) -> Result<(), SerializeError>
where
    F: Fn(usize) -> String,
{
    if state.in_tight_list {
        state.flush_close(1);
    }
    let prev_tight = state.in_tight_list;
    state.in_tight_list = true;
    for (i, item) in node.content.iter().enumerate() {
        if i > 0 {
            state.flush_close(1);
        }
        let first = first_delim(i);
        state.wrap_block(delim, Some(&first), |state| state.render(item))?;
    }
    state.in_tight_list = prev_tight;
    Ok(())
}

fn list_item(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    state.render_content(node)
}

fn image(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    let src = node.attrs.str("src").unwrap_or_default();
    let alt = state.esc(node.attrs.str("alt").unwrap_or_default(), false);
    let title = match node.attrs.str("title") {
        Some(title) => format!(" \"{}\"", title.replace('"', "\\\"")),
        None => String::new(),
    };
    state.write(&format!("![{alt}]({src}{title})"));
    Ok(())
}

fn hard_break(state: &mut SerializerState<'_>, _node: &Node) -> Result<(), SerializeError> {
    state.write("\\\n");
    Ok(())
}

fn text_node(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    state.text(node.text.as_deref().unwrap_or_default(), true);
    Ok(())
}

/// Mentions serialize as a reversible custom URI, not a regular hyperlink:
/// `[@Full Name](mention://user/<id>/<url-encoded name>)`, with the display
/// text escaped (spaces included) per the active escape rules.
fn mention(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    let user_id = node.attrs.str("userId").unwrap_or_default();
    let name = node.attrs.str("userFullName").unwrap_or_default();
    let uri = format!(
        "{}{}/{}",
        MENTION_URI_PREFIX,
        user_id,
        urlencoding::encode(name)
    );
    let display = esc_mention_text(&format!("@{name}"));
    state.write(&format!("[{display}]({uri})"));
    Ok(())
}

fn esc_mention_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '`' | '*' | '_' | '[' | ']' | '(' | ')' | '~' | '^' | ' '
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn table(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    state.in_table = true;
    for (i, row) in node.content.iter().enumerate() {
        state.render(row)?;
        if i == 0 {
            let mut separator = String::from("|");
            for cell in &row.content {
                separator.push_str(match cell.attrs.str("alignment") {
                    Some("left") => " :--- |",
                    Some("center") => " :---: |",
                    Some("right") => " ---: |",
                    _ => " --- |",
                });
            }
            state.write(&separator);
            state.ensure_new_line();
        }
    }
    state.in_table = false;
    state.close_block();
    Ok(())
}

fn table_row(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    state.write("|");
    for cell in &node.content {
        state.write(" ");
        state.render(cell)?;
        state.write(" |");
    }
    state.ensure_new_line();
    Ok(())
}

/// Serves both plain and header cells; pipe-table cells flatten their block
/// content onto one line.
fn table_cell(state: &mut SerializerState<'_>, node: &Node) -> Result<(), SerializeError> {
    for (i, block) in node.content.iter().enumerate() {
        if i > 0 {
            state.write(" ");
        }
        if block.kind.is_textblock() {
            state.render_inline(block)?;
        } else {
            state.text(&block.text_content(), true);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;
    use pretty_assertions::assert_eq;

    fn para(text: &str) -> Node {
        Node::untrusted(NodeKind::Paragraph, Attrs::new(), vec![Node::text(text)])
    }

    fn doc_of(content: Vec<Node>) -> Node {
        Node::untrusted(NodeKind::Doc, Attrs::new(), content)
    }

    #[test]
    fn paragraphs_separated_by_blank_line() {
        let doc = doc_of(vec![para("one"), para("two")]);
        let out = MarkdownSerializer::full().serialize(&doc).unwrap();
        assert_eq!(out, "one\n\ntwo");
    }

    #[test]
    fn heading_prefix() {
        let heading = Node::untrusted(
            NodeKind::Heading,
            Attrs::new().with("level", 3),
            vec![Node::text("title")],
        );
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![heading]))
            .unwrap();
        assert_eq!(out, "### title");
    }

    #[test]
    fn blockquote_prefixes_every_line() {
        let quote = Node::untrusted(
            NodeKind::Blockquote,
            Attrs::new(),
            vec![para("one"), para("two")],
        );
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![quote]))
            .unwrap();
        assert_eq!(out, "> one\n>\n> two");
    }

    #[test]
    fn code_block_with_language() {
        let code = Node::untrusted(
            NodeKind::CodeBlock,
            Attrs::new().with("language", "rust"),
            vec![Node::text("let x = 1;")],
        );
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![code]))
            .unwrap();
        assert_eq!(out, "```rust\nlet x = 1;\n```");
    }

    #[test]
    fn marks_nest_in_canonical_order() {
        let text = Node::text_with_marks(
            "both",
            vec![Mark::new(MarkKind::Strong), Mark::new(MarkKind::Em)],
        );
        let para = Node::untrusted(NodeKind::Paragraph, Attrs::new(), vec![Node::text("a "), text]);
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![para]))
            .unwrap();
        // Em ranks before strong regardless of the order marks were applied.
        assert_eq!(out, "a _**both**_");
    }

    #[test]
    fn link_mark_with_title() {
        let link = Mark::with_attrs(
            MarkKind::Link,
            Attrs::new().with("href", "https://example.com").with("title", "Docs"),
        );
        let para = Node::untrusted(
            NodeKind::Paragraph,
            Attrs::new(),
            vec![Node::text_with_marks("docs", vec![link])],
        );
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![para]))
            .unwrap();
        assert_eq!(out, "[docs](https://example.com \"Docs\")");
    }

    #[test]
    fn mention_uses_custom_uri() {
        let mention = Node::untrusted(
            NodeKind::Mention,
            Attrs::new()
                .with("userId", "42")
                .with("userFullName", "Ada Lovelace"),
            vec![],
        );
        let para = Node::untrusted(NodeKind::Paragraph, Attrs::new(), vec![mention]);
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![para]))
            .unwrap();
        assert_eq!(out, "[@Ada\\ Lovelace](mention://user/42/Ada%20Lovelace)");
    }

    #[test]
    fn image_omits_absent_title() {
        let image = Node::untrusted(
            NodeKind::Image,
            Attrs::new().with("src", "pic.png").with("alt", "diagram"),
            vec![],
        );
        let para = Node::untrusted(NodeKind::Paragraph, Attrs::new(), vec![image]);
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![para]))
            .unwrap();
        assert_eq!(out, "![diagram](pic.png)");
    }

    #[test]
    fn escaping_protects_syntax_characters() {
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![para("a *b* [c] `d`")]))
            .unwrap();
        assert_eq!(out, "a \\*b\\* \\[c\\] \\`d\\`");
    }

    #[test]
    fn line_start_escapes() {
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![para("# not a heading")]))
            .unwrap();
        assert_eq!(out, "\\# not a heading");

        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![para("12. not a list")]))
            .unwrap();
        assert_eq!(out, "12\\. not a list");
    }

    #[test]
    fn table_emits_separator_with_alignment() {
        let cell = |kind, align: Option<&str>, text: &str| {
            let mut attrs = Attrs::new();
            if let Some(align) = align {
                attrs.set("alignment", align);
            }
            Node::untrusted(kind, attrs, vec![para(text)])
        };
        let head = Node::untrusted(
            NodeKind::TableRow,
            Attrs::new(),
            vec![
                cell(NodeKind::TableHeader, Some("left"), "a"),
                cell(NodeKind::TableHeader, Some("right"), "b"),
            ],
        );
        let body = Node::untrusted(
            NodeKind::TableRow,
            Attrs::new(),
            vec![
                cell(NodeKind::TableCell, None, "c"),
                cell(NodeKind::TableCell, None, "d"),
            ],
        );
        let table = Node::untrusted(NodeKind::Table, Attrs::new(), vec![head, body]);
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![table]))
            .unwrap();
        assert_eq!(out, "| a | b |\n| :--- | ---: |\n| c | d |");
    }

    #[test]
    fn tight_list_rendering() {
        let item = |text: &str| {
            Node::untrusted(NodeKind::ListItem, Attrs::new(), vec![para(text)])
        };
        let list = Node::untrusted(
            NodeKind::BulletList,
            Attrs::new(),
            vec![item("one"), item("two")],
        );
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![list]))
            .unwrap();
        assert_eq!(out, "* one\n* two");
    }

    #[test]
    fn ordered_list_numbering_from_order() {
        let item = |text: &str| {
            Node::untrusted(NodeKind::ListItem, Attrs::new(), vec![para(text)])
        };
        let list = Node::untrusted(
            NodeKind::OrderedList,
            Attrs::new().with("order", 3),
            vec![item("a"), item("b")],
        );
        let out = MarkdownSerializer::full()
            .serialize(&doc_of(vec![list]))
            .unwrap();
        assert_eq!(out, "3. a\n4. b");
    }

    #[test]
    fn unsupported_node_is_fatal() {
        let heading = Node::untrusted(
            NodeKind::Heading,
            Attrs::new().with("level", 1),
            vec![Node::text("title")],
        );
        let err = MarkdownSerializer::plain_text()
            .serialize(&doc_of(vec![heading]))
            .unwrap_err();
        assert!(matches!(
            err,
            SerializeError::UnsupportedNode(NodeKind::Heading)
        ));
    }

    #[test]
    fn plain_text_keeps_paragraphs() {
        let doc = doc_of(vec![para("one"), para("two")]);
        let out = MarkdownSerializer::plain_text().serialize(&doc).unwrap();
        assert_eq!(out, "one\n\ntwo");
    }
}
