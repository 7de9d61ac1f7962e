//! Table row input rule and the table construction helper.
//!
//! Typing `| a | b |` on its own line builds a one-row table with as many
//! cells as pipe-delimited columns, header cells when the schema declares
//! them, and moves the cursor into the first cell.

use regex::Regex;

use super::{block_allowed_in, InputRule, RuleContext, RuleError};
use crate::model::{Attrs, ModelError, Node, Transaction};
use crate::schema::{NodeKind, Schema};

pub(super) fn register(rules: &mut Vec<InputRule>, schema: &Schema) {
    if !(schema.has_node(NodeKind::Table)
        && schema.has_node(NodeKind::TableRow)
        && schema.has_node(NodeKind::TableCell))
    {
        return;
    }
    let row = Regex::new(r"^\|\s+(.*)\s+\|\s*$").expect("static pattern");
    rules.push(InputRule::new(row, "table-row", Box::new(table_row)));
}

/// Builds a `rows` by `cols` table of empty cells, header cells when the
/// schema enables them, each filled with an empty paragraph.
pub fn create_table(schema: &Schema, rows: usize, cols: usize) -> Result<Node, ModelError> {
    let cell_kind = if schema.has_node(NodeKind::TableHeader) {
        NodeKind::TableHeader
    } else {
        NodeKind::TableCell
    };
    let mut row_nodes = Vec::with_capacity(rows);
    for _ in 0..rows {
        let cells = (0..cols)
            .map(|_| schema.node_filled(cell_kind, Attrs::new(), Vec::new()))
            .collect::<Result<Vec<_>, _>>()?;
        row_nodes.push(schema.node(NodeKind::TableRow, Attrs::new(), cells)?);
    }
    schema.node(NodeKind::Table, Attrs::new(), row_nodes)
}

fn table_row(ctx: &RuleContext<'_>) -> Result<Transaction, RuleError> {
    if !block_allowed_in(ctx.schema, NodeKind::Table, ctx.parent_kind) {
        return Err(RuleError::Precondition(format!(
            "`{}` cannot hold a table",
            ctx.parent_kind
        )));
    }
    let columns = ctx
        .captures
        .get(1)
        .map_or(1, |m| m.as_str().split('|').count());
    let table = create_table(ctx.schema, 1, columns)?;

    let tr = Transaction::new().delete_inline(ctx.start, ctx.cursor);
    // A trigger covering the whole block replaces it; a mid-block trigger
    // keeps the remaining text and inserts the table after.
    if ctx.start == ctx.content_start && ctx.cursor == ctx.content_end {
        Ok(tr.replace_block_with(ctx.start, table))
    } else {
        Ok(tr.insert_node_after(ctx.start, table))
    }
}
