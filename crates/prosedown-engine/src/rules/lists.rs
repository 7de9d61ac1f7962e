//! List wrapping input rules: `* ` / `- ` / `+ ` and `1. `.

use regex::Regex;

use super::{block_allowed_in, InputRule, RuleContext, RuleError};
use crate::model::{Attrs, Transaction};
use crate::schema::{NodeKind, Schema};

pub(super) fn register(rules: &mut Vec<InputRule>, schema: &Schema) {
    if !schema.has_node(NodeKind::ListItem) {
        return;
    }
    if schema.has_node(NodeKind::BulletList) {
        let bullet = Regex::new(r"^\s*([-+*])\s$").expect("static pattern");
        rules.push(InputRule::new(bullet, "bullet-list", Box::new(bullet_list)));
    }
    if schema.has_node(NodeKind::OrderedList) {
        let ordered = Regex::new(r"^(\d+)\.\s$").expect("static pattern");
        rules.push(InputRule::new(
            ordered,
            "ordered-list",
            Box::new(ordered_list),
        ));
    }
}

fn wrap_precondition(ctx: &RuleContext<'_>, list: NodeKind) -> Result<(), RuleError> {
    if ctx.block_kind != NodeKind::Paragraph {
        return Err(RuleError::Precondition(
            "only paragraphs wrap into a list".to_string(),
        ));
    }
    if !block_allowed_in(ctx.schema, list, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a `{list}`",
            ctx.parent_kind
        )));
    }
    Ok(())
}

fn bullet_list(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    wrap_precondition(ctx, NodeKind::BulletList)?;
    Ok(Transaction::new()
        .delete_inline(ctx.start, ctx.cursor)
        .wrap_block(
            ctx.start,
            NodeKind::BulletList,
            Attrs::new(),
            Some(NodeKind::ListItem),
        ))
}

fn ordered_list(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    wrap_precondition(ctx, NodeKind::OrderedList)?;
    let order = ctx
        .captures
        .get(1)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(1);
    Ok(Transaction::new()
        .delete_inline(ctx.start, ctx.cursor)
        .wrap_block(
            ctx.start,
            NodeKind::OrderedList,
            Attrs::new().with("order", order),
            Some(NodeKind::ListItem),
        ))
}
