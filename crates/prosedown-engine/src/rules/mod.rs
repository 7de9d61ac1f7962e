//! The live input rule engine.
//!
//! On every text-insertion event the engine scans the plain text of the
//! current text block from its start to the cursor (the pre-cursor window),
//! with inline atoms represented by a reserved placeholder character, and
//! tests it against the registered trigger patterns in order. The first
//! match wins: its handler re-validates what the pattern cannot express and
//! produces one atomic transaction in which the trigger text never reaches
//! the tree. No match, or a failed precondition, leaves the typed text as
//! plain text.
//!
//! Idle -> Scanning -> Rewriting -> Idle, once per edit event; the scan
//! itself never mutates anything.

mod block;
mod code;
mod lists;
mod tables;

pub use tables::create_table;

use regex::{Captures, Regex};
use std::sync::Arc;

use crate::model::{Attrs, Document, EditEvent, ModelError, Node, Patch, Transaction};
use crate::schema::{ContentExpr, NodeKind, Schema};

/// Placeholder standing in for an inline atom (image, mention) in the
/// pre-cursor window, so patterns can anchor past it without the atom ever
/// being part of the replaced span.
pub const LEAF_REPLACEMENT_CHARACTER: char = '\u{fffc}';

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A precondition the trigger pattern cannot express failed; the typed
    /// text stays literal.
    #[error("rule precondition failed: {0}")]
    Precondition(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Everything a rule handler sees: the match, its document coordinates and
/// the block being scanned.
pub struct RuleContext<'a> {
    pub schema: &'a Schema,
    pub doc: &'a Node,
    pub captures: &'a Captures<'a>,
    /// Document position where the match begins.
    pub start: usize,
    /// Cursor position; the matched trigger covers `[start, cursor)` in the
    /// tree plus the text being inserted.
    pub cursor: usize,
    pub block_kind: NodeKind,
    pub parent_kind: NodeKind,
    /// Document position where the scanned block's content begins.
    pub content_start: usize,
    /// Document position where the scanned block's content ends.
    pub content_end: usize,
}

pub type RuleHandler = Box<dyn Fn(&RuleContext<'_>) -> Result<Transaction, RuleError> + Send + Sync>;

/// A trigger pattern (end-anchored against the pre-cursor window) plus the
/// handler that performs the rewrite.
pub struct InputRule {
    pattern: Regex,
    name: String,
    handler: RuleHandler,
}

impl InputRule {
    pub fn new(pattern: Regex, name: impl Into<String>, handler: RuleHandler) -> Self {
        InputRule {
            pattern,
            name: name.into(),
            handler,
        }
    }
}

/// Outcome of one edit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// A rule rewrote the tree around the insertion.
    Rewritten(Patch),
    /// No rule matched; the text was committed as plain text.
    Inserted(Patch),
    /// Nothing to do: empty insertion and no matching rule.
    None,
}

/// The rule set for one schema instance. Built once, immutable rule order,
/// first match wins.
pub struct InputRuleEngine {
    schema: Arc<Schema>,
    rules: Vec<InputRule>,
}

impl InputRuleEngine {
    /// Registers the built-in rules, each only when its target kind is
    /// enabled: headings, blockquote, fenced code, list wraps, table row.
    pub fn for_schema(schema: Arc<Schema>) -> Self {
        let mut rules = Vec::new();
        block::register(&mut rules, &schema);
        code::register(&mut rules, &schema);
        lists::register(&mut rules, &schema);
        tables::register(&mut rules, &schema);
        InputRuleEngine { schema, rules }
    }

    /// Appends a custom rule after the built-ins.
    pub fn register_rule(&mut self, rule: InputRule) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Handles one text-insertion event at the document's cursor.
    ///
    /// Exactly one transaction is committed: either a matching rule's
    /// rewrite (which consumes the trigger text) or the plain insertion.
    /// An empty event that matches nothing leaves the document
    /// byte-for-byte unchanged.
    pub fn on_edit(
        &self,
        doc: &mut Document,
        event: &EditEvent,
    ) -> Result<EditOutcome, ModelError> {
        let cursor = doc.selection();
        let scan = self.scan_target(doc, cursor);

        if let Some(target) = scan {
            let mut window = target.window;
            window.push_str(&event.text);
            if !window.is_empty() {
                for rule in &self.rules {
                    let Some(captures) = rule.pattern.captures(&window) else {
                        continue;
                    };
                    let whole = captures.get(0).expect("group 0 always present");
                    if whole.end() != window.len() {
                        continue;
                    }
                    let start_chars = window[..whole.start()].chars().count();
                    let ctx = RuleContext {
                        schema: &self.schema,
                        doc: doc.doc(),
                        captures: &captures,
                        start: target.content_start + start_chars,
                        cursor,
                        block_kind: target.block_kind,
                        parent_kind: target.parent_kind,
                        content_start: target.content_start,
                        content_end: target.content_end,
                    };
                    match (rule.handler)(&ctx) {
                        Ok(tr) => match doc.apply(tr) {
                            Ok(patch) => {
                                log::debug!("input rule `{}` applied", rule.name);
                                return Ok(EditOutcome::Rewritten(patch));
                            }
                            Err(err) => {
                                log::warn!("input rule `{}` could not commit: {err}", rule.name);
                                break;
                            }
                        },
                        Err(RuleError::Precondition(reason)) => {
                            log::debug!("input rule `{}` rejected: {reason}", rule.name);
                            break;
                        }
                        Err(RuleError::Model(err)) => {
                            log::warn!("input rule `{}` failed: {err}", rule.name);
                            break;
                        }
                    }
                }
            }
        }

        if event.text.is_empty() {
            return Ok(EditOutcome::None);
        }
        let patch = doc.apply(Transaction::new().insert_text(cursor, event.text.clone()))?;
        Ok(EditOutcome::Inserted(patch))
    }

    fn scan_target(&self, doc: &Document, cursor: usize) -> Option<ScanTarget> {
        let root = doc.doc();
        let rp = root.resolve(cursor).ok()?;
        let indexes = rp.indexes();
        let block = root.node_at(&indexes)?;
        // Code blocks are opaque to input rules.
        if !block.kind.is_textblock() || block.kind == NodeKind::CodeBlock {
            return None;
        }
        let parent_kind = match indexes.split_last() {
            Some((_, parents)) if !parents.is_empty() => root.node_at(parents)?.kind,
            Some(_) => NodeKind::Doc,
            None => return None,
        };
        let content_start = rp.container_content_start();
        Some(ScanTarget {
            window: pre_cursor_window(block, rp.parent_offset),
            block_kind: block.kind,
            parent_kind,
            content_start,
            content_end: content_start + block.content_size(),
        })
    }
}

struct ScanTarget {
    window: String,
    block_kind: NodeKind,
    parent_kind: NodeKind,
    content_start: usize,
    content_end: usize,
}

/// Plain text of a block's content up to `offset`, atoms replaced by
/// [`LEAF_REPLACEMENT_CHARACTER`].
fn pre_cursor_window(block: &Node, offset: usize) -> String {
    let mut out = String::new();
    let mut cur = 0usize;
    for child in &block.content {
        if cur >= offset {
            break;
        }
        match &child.text {
            Some(text) => {
                let take = (offset - cur).min(text.chars().count());
                out.extend(text.chars().take(take));
            }
            None => out.push(LEAF_REPLACEMENT_CHARACTER),
        }
        cur += child.node_size();
    }
    out
}

/// Whether `parent` accepts a child block of `kind` under this schema.
pub(crate) fn block_allowed_in(schema: &Schema, kind: NodeKind, parent: NodeKind) -> bool {
    if !schema.has_node(kind) {
        return false;
    }
    match schema.node_spec(parent).map(|spec| spec.content) {
        Some(ContentExpr::Blocks) => !kind.is_inline(),
        Some(ContentExpr::OnlyKinds(kinds)) => kinds.contains(&kind),
        _ => false,
    }
}

/// Shared shape of the heading/blockquote/code leaf variants: delete the
/// trigger (atom excluded) and open a fresh block right after the current
/// one.
pub(crate) fn insert_block_transaction(
    after: usize,
    cursor: usize,
    kind: NodeKind,
    attrs: Attrs,
) -> Transaction {
    Transaction::new()
        .delete_inline(after, cursor)
        .insert_block_after(after, kind, attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Capabilities;

    #[test]
    fn rule_sets_are_schema_conditional() {
        let article = InputRuleEngine::for_schema(Arc::new(Schema::new(Capabilities::article())));
        let message = InputRuleEngine::for_schema(Arc::new(Schema::new(Capabilities::message())));
        // Message drops the two heading rules and the table rule.
        assert_eq!(article.rule_count() - message.rule_count(), 3);
    }

    #[test]
    fn pre_cursor_window_replaces_atoms() {
        use crate::model::Attrs;
        let block = Node::untrusted(
            NodeKind::Paragraph,
            Attrs::new(),
            vec![
                Node::untrusted(NodeKind::Mention, Attrs::new(), vec![]),
                Node::text("> "),
            ],
        );
        assert_eq!(
            pre_cursor_window(&block, 3),
            format!("{LEAF_REPLACEMENT_CHARACTER}> ")
        );
        assert_eq!(
            pre_cursor_window(&block, 2),
            format!("{LEAF_REPLACEMENT_CHARACTER}>")
        );
    }
}
