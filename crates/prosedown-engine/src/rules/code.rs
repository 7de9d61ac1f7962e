//! Blockquote and fenced code input rules.
//!
//! `> ` wraps the current block; three backticks convert it (mid-line
//! after whitespace included, with the trailing word as the language).
//! Each has a variant that fires after a leading inline atom.

use regex::Regex;

use super::{
    block_allowed_in, insert_block_transaction, InputRule, RuleContext, RuleError,
    LEAF_REPLACEMENT_CHARACTER,
};
use crate::model::{Attrs, Transaction};
use crate::schema::{NodeKind, Schema};

pub(super) fn register(rules: &mut Vec<InputRule>, schema: &Schema) {
    if schema.has_node(NodeKind::Blockquote) {
        let quote = Regex::new(r"^\s*>\s$").expect("static pattern");
        rules.push(InputRule::new(quote, "blockquote", Box::new(blockquote)));

        let after_atom =
            Regex::new(&format!(r"{LEAF_REPLACEMENT_CHARACTER}\s*>\s$")).expect("static pattern");
        rules.push(InputRule::new(
            after_atom,
            "blockquote-after-atom",
            Box::new(blockquote_after_atom),
        ));
    }

    if schema.has_node(NodeKind::CodeBlock) {
        let fence = Regex::new(r"((^`{3,})|(\s`{3,}))(\S*)$").expect("static pattern");
        rules.push(InputRule::new(fence, "code-fence", Box::new(code_fence)));

        let after_atom = Regex::new(&format!(
            r"(({LEAF_REPLACEMENT_CHARACTER}`{{3,}})|(\s`{{3,}}))(\S*)$"
        ))
        .expect("static pattern");
        rules.push(InputRule::new(
            after_atom,
            "code-fence-after-atom",
            Box::new(code_fence_after_atom),
        ));
    }
}

fn blockquote(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    if ctx.block_kind != NodeKind::Paragraph {
        return Err(RuleError::Precondition(
            "only paragraphs wrap into a blockquote".to_string(),
        ));
    }
    if !block_allowed_in(ctx.schema, NodeKind::Blockquote, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a blockquote",
            ctx.parent_kind
        )));
    }
    Ok(Transaction::new()
        .delete_inline(ctx.start, ctx.cursor)
        .wrap_block(ctx.start, NodeKind::Blockquote, Attrs::new(), None))
}

fn blockquote_after_atom(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    if !block_allowed_in(ctx.schema, NodeKind::Blockquote, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a blockquote",
            ctx.parent_kind
        )));
    }
    Ok(insert_block_transaction(
        ctx.start + 1,
        ctx.cursor,
        NodeKind::Blockquote,
        Attrs::new(),
    ))
}

fn fence_attrs(ctx: &RuleContext<'_>) -> Attrs {
    let mut attrs = Attrs::new();
    if let Some(language) = ctx.captures.get(4)
        && !language.as_str().is_empty()
    {
        attrs.set("language", language.as_str());
    }
    attrs
}

/// `is_convertible_to_code_block`: the scanned block can be converted in
/// place, rather than a fresh code block inserted after it.
fn is_convertible(ctx: &RuleContext<'_>) -> bool {
    matches!(ctx.block_kind, NodeKind::Paragraph | NodeKind::Heading)
}

fn code_fence(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    if !block_allowed_in(ctx.schema, NodeKind::CodeBlock, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a code block",
            ctx.parent_kind
        )));
    }
    let attrs = fence_attrs(ctx);
    // Mid-line matches keep the whitespace that preceded the fence.
    let start = if ctx.captures.get(3).is_some() {
        ctx.start + 1
    } else {
        ctx.start
    };
    if is_convertible(ctx) {
        Ok(Transaction::new()
            .delete_inline(start, ctx.cursor)
            .set_block_kind(start, NodeKind::CodeBlock, attrs))
    } else {
        Ok(insert_block_transaction(
            start,
            ctx.cursor,
            NodeKind::CodeBlock,
            attrs,
        ))
    }
}

fn code_fence_after_atom(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    if !block_allowed_in(ctx.schema, NodeKind::CodeBlock, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a code block",
            ctx.parent_kind
        )));
    }
    let attrs = fence_attrs(ctx);
    // Both branches skip their first character: the atom placeholder or
    // the preceding whitespace.
    Ok(insert_block_transaction(
        ctx.start + 1,
        ctx.cursor,
        NodeKind::CodeBlock,
        attrs,
    ))
}
