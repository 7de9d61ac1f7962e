//! Heading input rules: `# ` through `###### ` at the start of a block,
//! plus the variant that fires after a leading inline atom.

use regex::Regex;

use super::{
    block_allowed_in, insert_block_transaction, InputRule, RuleContext, RuleError,
    LEAF_REPLACEMENT_CHARACTER,
};
use crate::model::{Attrs, Transaction};
use crate::schema::{NodeKind, Schema};

pub(super) fn register(rules: &mut Vec<InputRule>, schema: &Schema) {
    if !schema.has_node(NodeKind::Heading) {
        return;
    }
    let max = schema.max_heading_level();

    let hash = Regex::new(&format!("^(#{{1,{max}}})\\s$")).expect("static pattern");
    rules.push(InputRule::new(hash, "heading", Box::new(heading)));

    let after_atom = Regex::new(&format!(
        "^{LEAF_REPLACEMENT_CHARACTER}(#{{1,{max}}})\\s$"
    ))
    .expect("static pattern");
    rules.push(InputRule::new(
        after_atom,
        "heading-after-atom",
        Box::new(heading_after_atom),
    ));
}

fn heading_level(ctx: &RuleContext<'_>) -> i64 {
    ctx.captures.get(1).map_or(1, |m| m.as_str().len() as i64)
}

fn heading(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    if ctx.block_kind == NodeKind::CodeBlock || !ctx.block_kind.is_textblock() {
        return Err(RuleError::Precondition(
            "block is not convertible to a heading".to_string(),
        ));
    }
    if !block_allowed_in(ctx.schema, NodeKind::Heading, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a heading",
            ctx.parent_kind
        )));
    }
    let attrs = Attrs::new().with("level", heading_level(ctx));
    Ok(Transaction::new()
        .delete_inline(ctx.start, ctx.cursor)
        .set_block_kind(ctx.start, NodeKind::Heading, attrs))
}

fn heading_after_atom(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    if !block_allowed_in(ctx.schema, NodeKind::Heading, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a heading",
            ctx.parent_kind
        )));
    }
    let attrs = Attrs::new().with("level", heading_level(ctx));
    // The span starts one position in, so the atom is never deleted.
    Ok(insert_block_transaction(
        ctx.start + 1,
        ctx.cursor,
        NodeKind::Heading,
        attrs,
    ))
}
