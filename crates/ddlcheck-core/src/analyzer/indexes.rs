//! Index detectors

use std::collections::BTreeSet;

use crate::analyzer::keys::collect_table_keys;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::scan::grammar::{self, IndexSyntax};
use crate::scan::{table_items, SourceText};

fn column_set(columns: &[String]) -> BTreeSet<String> {
    columns.iter().cloned().collect()
}

/// `inner` is a strict subset of `outer`
fn strictly_covers(outer: &BTreeSet<String>, inner: &BTreeSet<String>) -> bool {
    !inner.is_empty() && inner.is_subset(outer) && outer.len() > inner.len()
}

fn joined<'a>(columns: impl IntoIterator<Item = &'a String>) -> String {
    columns
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn index_span(source: &SourceText, index: &IndexSyntax<'_>) -> crate::error::Span {
    source.span_at(index.offset, 0)
}

/// Report indexes that contain the primary key plus more columns, and
/// non-unique indexes that contain a UNIQUE constraint plus more columns
pub fn detect_index_anomalies(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let keys = collect_table_keys(&source);
    let mut diagnostics = Vec::new();

    for index in grammar::indexes(&source) {
        let Some(table) = keys.get(&index.table_key()) else {
            continue;
        };
        let index_cols = column_set(&index.columns);
        let span = index_span(&source, &index);

        let pk = table.primary_key_set();
        if strictly_covers(&index_cols, &pk) {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::IndexCoversPrimaryKey,
                    format!(
                        "Index '{}' on table '{}' (line {}) contains every primary key column and more",
                        index.name, table.name, index.line
                    ),
                )
                .with_span(span)
                .with_label(format!("index columns: {}", index.columns.join(", ")), span)
                .with_label(format!("primary key columns: {}", table.primary_key.join(", ")), span)
                .with_table(table.name.as_str())
                .with_index(index.name)
                .with_columns(index.columns.iter().cloned())
                .with_help(format!(
                    "Make index '{}' unique or review the primary key columns",
                    index.name
                )),
            );
        }

        if index.unique {
            continue;
        }
        for unique in &table.uniques {
            let unique_cols = column_set(&unique.columns);
            if !strictly_covers(&index_cols, &unique_cols) {
                continue;
            }
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::IndexCoversUniqueKey,
                    format!(
                        "Index '{}' on table '{}' (line {}) contains every column of UNIQUE ({}) and more",
                        index.name,
                        table.name,
                        index.line,
                        unique.columns.join(", ")
                    ),
                )
                .with_span(span)
                .with_label(format!("index columns: {}", index.columns.join(", ")), span)
                .with_table(table.name.as_str())
                .with_index(index.name)
                .with_columns(index.columns.iter().cloned())
                .with_help(format!("Declare index '{}' as UNIQUE", index.name)),
            );
        }
    }

    diagnostics
}

/// Report UNIQUE indexes whose columns are exactly the primary key
pub fn detect_redundant_unique_indexes(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let keys = collect_table_keys(&source);
    let mut diagnostics = Vec::new();

    for index in grammar::indexes(&source).iter().filter(|i| i.unique) {
        let Some(table) = keys.get(&index.table_key()) else {
            continue;
        };
        let pk = table.primary_key_set();
        if pk.is_empty() || column_set(&index.columns) != pk {
            continue;
        }

        let span = index_span(&source, index);
        diagnostics.push(
            Diagnostic::warning(
                DiagnosticKind::RedundantUniqueIndex,
                format!(
                    "Unique index '{}' on table '{}' (line {}) duplicates the primary key",
                    index.name, table.name, index.line
                ),
            )
            .with_span(span)
            .with_label(format!("primary key columns: {}", joined(&pk)), span)
            .with_label(format!("index columns: {}", index.columns.join(", ")), span)
            .with_table(table.name.as_str())
            .with_index(index.name)
            .with_columns(pk.iter().cloned())
            .with_help("Drop this index or redefine it"),
        );
    }

    diagnostics
}

/// A column pinned to one value by `CHECK (<col> = <literal>)`
struct ConstantColumn {
    table: String,
    column: String,
    line: usize,
}

/// Report indexes that cannot help: indexes on a column pinned to a single
/// value by CHECK, and indexes that contain the primary key or a unique index
/// plus more columns
pub fn detect_unnecessary_indexes(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let keys = collect_table_keys(&source);
    let indexes = grammar::indexes(&source);
    let mut diagnostics = Vec::new();

    let mut constants = Vec::new();
    for (table, item) in table_items(&source) {
        for check in grammar::check_expressions(item.text) {
            if let Some(column) = grammar::constant_column(check.expression) {
                constants.push(ConstantColumn {
                    table: table.key(),
                    column: grammar::name_key(column),
                    line: source.line_of(item.offset + check.offset),
                });
            }
        }
    }

    for constant in &constants {
        for index in indexes
            .iter()
            .filter(|i| i.table_key() == constant.table && i.columns.contains(&constant.column))
        {
            let span = index_span(&source, index);
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticKind::IndexOnConstantColumn,
                    format!(
                        "Index '{}' on table '{}' (line {}) contains column '{}', which CHECK pins to a single value (line {})",
                        index.name, index.table, index.line, constant.column, constant.line
                    ),
                )
                .with_span(span)
                .with_table(index.table)
                .with_index(index.name)
                .with_column(constant.column.as_str())
                .with_help("Drop this index; it is ineffective on a constant column"),
            );
        }
    }

    for index in &indexes {
        let table_key = index.table_key();
        let mut bases: Vec<(String, BTreeSet<String>)> = Vec::new();
        if let Some(table) = keys.get(&table_key) {
            let pk = table.primary_key_set();
            if !pk.is_empty() {
                bases.push(("PRIMARY KEY".to_string(), pk));
            }
        }
        for other in indexes
            .iter()
            .filter(|i| i.unique && i.table_key() == table_key)
        {
            bases.push((format!("UNIQUE INDEX {}", other.name), column_set(&other.columns)));
        }

        let index_cols = column_set(&index.columns);
        let Some((base_name, base_cols)) = bases
            .iter()
            .find(|(_, base)| strictly_covers(&index_cols, base))
        else {
            continue;
        };
        let extra: Vec<&str> = index
            .columns
            .iter()
            .filter(|c| !base_cols.contains(*c))
            .map(String::as_str)
            .collect();
        let span = index_span(&source, index);
        diagnostics.push(
            Diagnostic::warning(
                DiagnosticKind::IndexSupersetOfKey,
                format!(
                    "Index '{}' on table '{}' (line {}) contains every column of {} ({}) plus {}",
                    index.name,
                    index.table,
                    index.line,
                    base_name,
                    joined(base_cols),
                    extra.join(", ")
                ),
            )
            .with_span(span)
            .with_table(index.table)
            .with_index(index.name)
            .with_columns(index.columns.iter().cloned())
            .with_help(
                "Drop this index, or make it unique if the extra ordering is really needed",
            ),
        );
    }

    diagnostics
}
