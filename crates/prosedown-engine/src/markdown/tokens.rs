//! The token stream boundary.
//!
//! The parser consumes an ordered sequence of typed tokens with open/close
//! pairing, not a concrete lexer. This module provides the [`Token`] type
//! that forms the boundary, plus an adapter that flattens pulldown-cmark's
//! event stream into it. Tokenizer behavior is fixed per schema instance by
//! [`TokenizerOptions`], never toggled at runtime.

use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::schema::{Capabilities, MarkKind};

/// URI prefix that marks a link as a mention rather than a hyperlink.
pub const MENTION_URI_PREFIX: &str = "mention://user/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    Open,
    Close,
    SelfClosing,
}

/// Typed payload carried by tokens whose attributes are not plain strings.
/// The expected shape is part of the mapping entry's declared contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenPayload {
    #[default]
    None,
    Mention {
        user_id: String,
        user_full_name: String,
    },
}

/// One unit of markdown structure from the external tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub name: String,
    pub nesting: Nesting,
    /// Tag-style detail, e.g. `h3` for a heading token.
    pub tag: String,
    /// Info string: fence language, cell alignment.
    pub info: String,
    /// Literal content for text-bearing tokens.
    pub content: String,
    pub attrs: Vec<(String, String)>,
    pub payload: TokenPayload,
}

impl Token {
    fn new(name: impl Into<String>, nesting: Nesting) -> Self {
        Token {
            name: name.into(),
            nesting,
            tag: String::new(),
            info: String::new(),
            content: String::new(),
            attrs: Vec::new(),
            payload: TokenPayload::None,
        }
    }

    pub fn open(name: impl Into<String>) -> Self {
        Token::new(name, Nesting::Open)
    }

    pub fn close(name: impl Into<String>) -> Self {
        Token::new(name, Nesting::Close)
    }

    pub fn self_closing(name: impl Into<String>) -> Self {
        Token::new(name, Nesting::SelfClosing)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Token::new("text", Nesting::SelfClosing).with_content(content)
    }

    pub fn mention(user_id: impl Into<String>, user_full_name: impl Into<String>) -> Self {
        let mut tok = Token::new("mention", Nesting::SelfClosing);
        tok.payload = TokenPayload::Mention {
            user_id: user_id.into(),
            user_full_name: user_full_name.into(),
        };
        tok
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn attr_get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Immutable tokenizer configuration derived once from a capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerOptions {
    pub tables: bool,
    pub strikethrough: bool,
    pub superscript: bool,
}

impl TokenizerOptions {
    pub fn from_capabilities(caps: &Capabilities) -> Self {
        TokenizerOptions {
            tables: caps.tables,
            strikethrough: caps.marks.contains(&MarkKind::Strike),
            superscript: caps.marks.contains(&MarkKind::Superscript),
        }
    }

    fn to_pulldown(self) -> Options {
        let mut options = Options::empty();
        if self.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if self.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.superscript {
            options.insert(Options::ENABLE_SUPERSCRIPT);
        }
        options
    }
}

/// Splits a `mention://user/<id>/<url-encoded name>` destination.
pub fn mention_from_uri(dest: &str) -> Option<(String, String)> {
    let rest = dest.strip_prefix(MENTION_URI_PREFIX)?;
    let (id, encoded) = rest.split_once('/')?;
    let name = urlencoding::decode(encoded).ok()?;
    Some((id.to_string(), name.into_owned()))
}

fn align_name(alignment: Option<&Alignment>) -> &'static str {
    match alignment {
        Some(Alignment::Left) => "left",
        Some(Alignment::Center) => "center",
        Some(Alignment::Right) => "right",
        _ => "",
    }
}

/// Flattens markdown text into the token stream the parser consumes.
pub fn tokenize(text: &str, options: &TokenizerOptions) -> Vec<Token> {
    let mut it = Parser::new_ext(text, options.to_pulldown());
    let mut out = Vec::new();
    let mut aligns: Vec<Alignment> = Vec::new();
    let mut in_head = false;
    let mut col = 0usize;
    let mut open_code: Option<&'static str> = None;

    while let Some(event) = it.next() {
        match event {
            Event::Start(tag) => match tag {
                Tag::Paragraph => out.push(Token::open("paragraph")),
                Tag::Heading { level, .. } => {
                    out.push(Token::open("heading").with_tag(format!("h{}", level as usize)));
                }
                Tag::BlockQuote(_) => out.push(Token::open("blockquote")),
                Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
                    open_code = Some("fence");
                    out.push(Token::open("fence").with_info(info.to_string()));
                }
                Tag::CodeBlock(CodeBlockKind::Indented) => {
                    open_code = Some("code_block");
                    out.push(Token::open("code_block"));
                }
                Tag::List(Some(start)) => {
                    out.push(Token::open("ordered_list").with_attr("order", start.to_string()));
                }
                Tag::List(None) => out.push(Token::open("bullet_list")),
                Tag::Item => out.push(Token::open("list_item")),
                Tag::Table(table_aligns) => {
                    aligns = table_aligns;
                    out.push(Token::open("table"));
                }
                Tag::TableHead => {
                    in_head = true;
                    col = 0;
                    out.push(Token::open("tr"));
                }
                Tag::TableRow => {
                    col = 0;
                    out.push(Token::open("tr"));
                }
                Tag::TableCell => {
                    let name = if in_head { "th" } else { "td" };
                    out.push(Token::open(name).with_info(align_name(aligns.get(col))));
                }
                Tag::Emphasis => out.push(Token::open("em")),
                Tag::Strong => out.push(Token::open("strong")),
                Tag::Strikethrough => out.push(Token::open("s")),
                Tag::Superscript => out.push(Token::open("sup")),
                Tag::Subscript => out.push(Token::open("sub")),
                Tag::Link {
                    dest_url, title, ..
                } => {
                    if let Some((user_id, name)) = mention_from_uri(&dest_url) {
                        consume_link(&mut it);
                        out.push(Token::mention(user_id, name));
                    } else {
                        let mut tok = Token::open("link").with_attr("href", dest_url.to_string());
                        if !title.is_empty() {
                            tok = tok.with_attr("title", title.to_string());
                        }
                        out.push(tok);
                    }
                }
                Tag::Image {
                    dest_url, title, ..
                } => {
                    let alt = collect_image_alt(&mut it);
                    let mut tok =
                        Token::self_closing("image").with_attr("src", dest_url.to_string());
                    if !alt.is_empty() {
                        tok = tok.with_attr("alt", alt);
                    }
                    if !title.is_empty() {
                        tok = tok.with_attr("title", title.to_string());
                    }
                    out.push(tok);
                }
                _ => out.push(Token::open("unknown")),
            },
            Event::End(end) => match end {
                TagEnd::Paragraph => out.push(Token::close("paragraph")),
                TagEnd::Heading(_) => out.push(Token::close("heading")),
                TagEnd::BlockQuote(_) => out.push(Token::close("blockquote")),
                TagEnd::CodeBlock => {
                    out.push(Token::close(open_code.take().unwrap_or("code_block")));
                }
                TagEnd::List(true) => out.push(Token::close("ordered_list")),
                TagEnd::List(false) => out.push(Token::close("bullet_list")),
                TagEnd::Item => out.push(Token::close("list_item")),
                TagEnd::Table => out.push(Token::close("table")),
                TagEnd::TableHead => {
                    in_head = false;
                    out.push(Token::close("tr"));
                }
                TagEnd::TableRow => out.push(Token::close("tr")),
                TagEnd::TableCell => {
                    let name = if in_head { "th" } else { "td" };
                    col += 1;
                    out.push(Token::close(name));
                }
                TagEnd::Emphasis => out.push(Token::close("em")),
                TagEnd::Strong => out.push(Token::close("strong")),
                TagEnd::Strikethrough => out.push(Token::close("s")),
                TagEnd::Superscript => out.push(Token::close("sup")),
                TagEnd::Subscript => out.push(Token::close("sub")),
                TagEnd::Link => out.push(Token::close("link")),
                TagEnd::Image => out.push(Token::close("image")),
                _ => out.push(Token::close("unknown")),
            },
            Event::Text(t) => out.push(Token::text(t.to_string())),
            Event::Code(t) => {
                out.push(Token::self_closing("code_inline").with_content(t.to_string()));
            }
            Event::Html(t) | Event::InlineHtml(t) => out.push(Token::text(t.to_string())),
            Event::InlineMath(t) | Event::DisplayMath(t) => out.push(Token::text(t.to_string())),
            Event::FootnoteReference(t) => out.push(Token::text(format!("[^{t}]"))),
            Event::SoftBreak => out.push(Token::self_closing("softbreak")),
            Event::HardBreak => out.push(Token::self_closing("hardbreak")),
            Event::Rule => out.push(Token::self_closing("hr")),
            Event::TaskListMarker(_) => {}
        }
    }
    out
}

/// Swallows the inner events of a mention link, display text included.
fn consume_link<'a>(it: &mut impl Iterator<Item = Event<'a>>) {
    for event in it.by_ref() {
        if matches!(event, Event::End(TagEnd::Link)) {
            return;
        }
    }
}

/// Collects the alt text of an image, consuming through its end tag.
fn collect_image_alt<'a>(it: &mut impl Iterator<Item = Event<'a>>) -> String {
    let mut alt = String::new();
    for event in it.by_ref() {
        match event {
            Event::End(TagEnd::Image) => break,
            Event::Text(t) | Event::Code(t) => alt.push_str(&t),
            _ => {}
        }
    }
    alt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Capabilities;

    fn article_options() -> TokenizerOptions {
        TokenizerOptions::from_capabilities(&Capabilities::article())
    }

    fn names(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn heading_tokens_carry_level_tag() {
        let tokens = tokenize("### hi", &article_options());
        assert_eq!(tokens[0].name, "heading");
        assert_eq!(tokens[0].tag, "h3");
        assert_eq!(names(&tokens), vec!["heading", "text", "heading"]);
    }

    #[test]
    fn fence_info_is_preserved() {
        let tokens = tokenize("```rust\nfn main() {}\n```", &article_options());
        assert_eq!(tokens[0].name, "fence");
        assert_eq!(tokens[0].info, "rust");
    }

    #[test]
    fn mention_links_become_mention_tokens() {
        let tokens = tokenize(
            "[@Ada](mention://user/42/Ada%20Lovelace)",
            &article_options(),
        );
        let mention = tokens.iter().find(|t| t.name == "mention").unwrap();
        assert_eq!(
            mention.payload,
            TokenPayload::Mention {
                user_id: "42".to_string(),
                user_full_name: "Ada Lovelace".to_string(),
            }
        );
        assert!(!tokens.iter().any(|t| t.name == "link"));
    }

    #[test]
    fn plain_links_stay_links() {
        let tokens = tokenize("[docs](https://example.com)", &article_options());
        let link = tokens.iter().find(|t| t.name == "link").unwrap();
        assert_eq!(link.attr_get("href"), Some("https://example.com"));
    }

    #[test]
    fn table_cells_carry_alignment() {
        let md = "| a | b |\n| :--- | ---: |\n| c | d |";
        let tokens = tokenize(md, &article_options());
        let cells: Vec<&Token> = tokens
            .iter()
            .filter(|t| (t.name == "th" || t.name == "td") && t.nesting == Nesting::Open)
            .collect();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].name, "th");
        assert_eq!(cells[0].info, "left");
        assert_eq!(cells[1].info, "right");
        assert_eq!(cells[2].name, "td");
    }

    #[test]
    fn tables_disabled_without_capability() {
        let tokens = tokenize(
            "| a | b |\n| --- | --- |",
            &TokenizerOptions::from_capabilities(&Capabilities::message()),
        );
        assert!(!tokens.iter().any(|t| t.name == "table"));
    }

    #[test]
    fn image_collects_alt_text() {
        let tokens = tokenize("![diagram](pic.png \"The title\")", &article_options());
        let image = tokens.iter().find(|t| t.name == "image").unwrap();
        assert_eq!(image.attr_get("src"), Some("pic.png"));
        assert_eq!(image.attr_get("alt"), Some("diagram"));
        assert_eq!(image.attr_get("title"), Some("The title"));
    }
}
