//! Key detectors: primary keys, candidate keys and table connectivity

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;

use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::scan::grammar::{self, name_key};
use crate::scan::{table_items, tables, SourceLine, SourceText};

/// A UNIQUE column set declared inside a table body
#[derive(Debug, Clone)]
pub(crate) struct UniqueKey {
    pub columns: Vec<String>,
    /// Declared as a column qualifier rather than a `UNIQUE (...)` clause
    pub inline: bool,
}

/// Primary and unique keys of one table
#[derive(Debug, Clone)]
pub(crate) struct TableKeys {
    pub name: String,
    pub line: usize,
    pub span: Span,
    /// Primary key columns without duplicates, in declaration order
    pub primary_key: Vec<String>,
    pub uniques: Vec<UniqueKey>,
}

impl TableKeys {
    pub fn primary_key_set(&self) -> BTreeSet<String> {
        self.primary_key.iter().cloned().collect()
    }
}

/// Keys of every table, keyed by uppercased table name in declaration order.
/// A table declared twice keeps its first name and line and merges its keys.
pub(crate) fn collect_table_keys(source: &SourceText) -> IndexMap<String, TableKeys> {
    let mut keys: IndexMap<String, TableKeys> = IndexMap::new();

    for table in tables(source) {
        keys.entry(table.key()).or_insert_with(|| TableKeys {
            name: table.name.to_string(),
            line: table.line,
            span: source.span_at(table.offset, 0),
            primary_key: Vec::new(),
            uniques: Vec::new(),
        });
    }

    for (table, item) in table_items(source) {
        let Some(entry) = keys.get_mut(&table.key()) else {
            continue;
        };
        if let Some(column) = grammar::column_definition(item.text) {
            if column.is_primary_key() {
                push_unique(&mut entry.primary_key, column.key());
            }
            if column.is_unique() {
                entry.uniques.push(UniqueKey {
                    columns: vec![column.key()],
                    inline: true,
                });
            }
            continue;
        }

        if let Some(columns) = grammar::primary_key_columns(item.text) {
            for column in columns {
                push_unique(&mut entry.primary_key, column);
            }
        }
        for columns in grammar::unique_columns(item.text) {
            entry.uniques.push(UniqueKey {
                columns,
                inline: false,
            });
        }
    }

    keys
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Report primary key columns that allow NULL.
///
/// An inline `PRIMARY KEY` is checked on its own line. A table-level
/// `PRIMARY KEY (...)` is checked against the column definitions seen before
/// it in the same table.
pub fn detect_null_primary_keys(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut diagnostics = Vec::new();
    // (table key, column key) -> (column name, NOT NULL, definition)
    let mut columns: IndexMap<(String, String), (String, bool, SourceLine<'_>)> = IndexMap::new();

    for (table, item) in table_items(&source) {
        if let Some(column) = grammar::column_definition(item.text) {
            let not_null = column.is_not_null();
            columns.insert(
                (table.key(), column.key()),
                (column.name.to_string(), not_null, item),
            );
            if column.is_primary_key() && !not_null {
                let span = source.span_of(&item);
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::NullablePrimaryKey,
                        format!(
                            "Column '{}' in table '{}' (line {}) is declared PRIMARY KEY without NOT NULL",
                            column.name, table.name, span.line
                        ),
                    )
                    .with_span(span)
                    .with_table(table.name)
                    .with_column(column.key())
                    .with_help("Make sure no primary key column accepts NULL"),
                );
            }
            continue;
        }

        let Some(pk_columns) = grammar::primary_key_columns(item.text) else {
            continue;
        };
        for key in pk_columns {
            let Some((name, not_null, definition)) = columns.get(&(table.key(), key.clone()))
            else {
                continue;
            };
            if *not_null {
                continue;
            }
            let span = source.span_of(definition);
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::NullablePrimaryKey,
                    format!(
                        "Column '{}' in table '{}' (line {}) is part of the PRIMARY KEY but is not declared NOT NULL",
                        name, table.name, span.line
                    ),
                )
                .with_span(span)
                .with_label("primary key declared here", source.span_of(&item))
                .with_table(table.name)
                .with_column(key)
                .with_help("A primary key must not contain NULL values"),
            );
        }
    }

    diagnostics
}

/// Report tables that take part in no foreign key, as child or as parent
pub fn detect_tables_without_relations(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut related: HashSet<String> = HashSet::new();

    for (table, item) in table_items(&source) {
        for reference in grammar::references(item.text) {
            related.insert(table.key());
            related.insert(name_key(reference.table));
        }
    }
    for alter in grammar::alter_foreign_keys(&source) {
        related.insert(name_key(alter.table));
        related.insert(alter.foreign_key.table_key());
    }

    let mut seen = HashSet::new();
    let mut diagnostics = Vec::new();
    for table in tables(&source) {
        if related.contains(&table.key()) || !seen.insert(table.key()) {
            continue;
        }
        diagnostics.push(
            Diagnostic::info(
                DiagnosticKind::TableWithoutRelations,
                format!(
                    "Table '{}' (line {}) does not take part in any foreign key",
                    table.name, table.line
                ),
            )
            .with_span(source.span_at(table.offset, 0))
            .with_table(table.name)
            .with_help(
                "Review the subject area and, if needed, connect the table through a FOREIGN KEY",
            ),
        );
    }

    diagnostics
}

/// Report tables without any uniqueness guarantee: no PRIMARY KEY, no
/// `UNIQUE (...)` constraint and no UNIQUE INDEX
pub fn detect_missing_potential_keys(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let keys = collect_table_keys(&source);
    let indexed: HashSet<String> = grammar::indexes(&source)
        .iter()
        .filter(|index| index.unique)
        .map(|index| index.table_key())
        .collect();

    keys.iter()
        .filter(|(key, table)| {
            table.primary_key.is_empty()
                && table.uniques.iter().all(|u| u.inline)
                && !indexed.contains(*key)
        })
        .map(|(_, table)| {
            Diagnostic::warning(
                DiagnosticKind::MissingPotentialKey,
                format!(
                    "Table '{}' (line {}) has no potential key (no PRIMARY KEY, UNIQUE constraint or UNIQUE INDEX)",
                    table.name, table.line
                ),
            )
            .with_span(table.span)
            .with_table(table.name.as_str())
            .with_help(
                "Add a PRIMARY KEY, UNIQUE constraint or UNIQUE INDEX to guarantee row uniqueness",
            )
        })
        .collect()
}

/// Surrogate key column: `ID` or `*_ID`
pub fn is_surrogate_key(column: &str) -> bool {
    let upper = column.to_uppercase();
    upper == "ID" || upper.ends_with("_ID")
}

/// Report tables whose primary key is a single surrogate column and which
/// have no other UNIQUE constraint or UNIQUE INDEX
pub fn detect_wrong_alternate_keys(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let keys = collect_table_keys(&source);
    let indexes = grammar::indexes(&source);
    let mut diagnostics = Vec::new();

    for (key, table) in &keys {
        let [pk] = table.primary_key.as_slice() else {
            continue;
        };
        if !is_surrogate_key(pk) {
            continue;
        }

        let pk_set = table.primary_key_set();
        let has_alternate = table
            .uniques
            .iter()
            .map(|u| u.columns.iter().cloned().collect::<BTreeSet<_>>())
            .chain(
                indexes
                    .iter()
                    .filter(|index| index.unique && index.table_key() == *key)
                    .map(|index| index.columns.iter().cloned().collect()),
            )
            .any(|set| set != pk_set);
        if has_alternate {
            continue;
        }

        diagnostics.push(
            Diagnostic::info(
                DiagnosticKind::MissingAlternateKey,
                format!(
                    "Table '{}' has surrogate primary key '{}' without an alternate key",
                    table.name, pk
                ),
            )
            .with_span(table.span)
            .with_table(table.name.as_str())
            .with_column(pk.as_str())
            .with_help(
                "Create an alternate key (UNIQUE constraint or UNIQUE INDEX) on the columns that make rows unique in business terms",
            ),
        );
    }

    diagnostics
}
