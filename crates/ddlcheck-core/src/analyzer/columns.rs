//! Column-modeling detectors

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::scan::grammar::{self, ColumnSyntax};
use crate::scan::{table_items, SourceText};
use crate::types::TypeFamily;

/// ANSI SQL keywords that should not be used as column names
pub const RESERVED_WORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "TABLE", "INSERT", "UPDATE", "DELETE", "ORDER", "GROUP", "BY",
    "HAVING", "JOIN", "INNER", "OUTER", "LEFT", "RIGHT",
];

pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

struct TypeUse {
    table: String,
    type_name: String,
    span: Span,
}

/// Report columns declared with different types in different places.
///
/// The size is part of the type, so `VARCHAR(10)` and `VARCHAR(20)` conflict.
pub fn detect_conflicting_types(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    // column -> type key -> declarations
    let mut columns: IndexMap<String, (String, IndexMap<String, Vec<TypeUse>>)> = IndexMap::new();

    for (table, item) in table_items(&source) {
        let Some(column) = grammar::column_definition(item.text) else {
            continue;
        };
        let (_, types) = columns
            .entry(column.key())
            .or_insert_with(|| (column.name.to_lowercase(), IndexMap::new()));
        types
            .entry(column.data_type.key())
            .or_default()
            .push(TypeUse {
                table: table.name.to_string(),
                type_name: column.data_type.key(),
                span: source.span_at(item.offset, column.name.len()),
            });
    }

    let mut diagnostics = Vec::new();
    for (key, (name, types)) in columns {
        if types.len() < 2 {
            continue;
        }
        let mut uses = types.values().flatten();
        let Some(first) = uses.next() else {
            continue;
        };
        let mut diag = Diagnostic::warning(
            DiagnosticKind::ConflictingColumnTypes,
            format!("Column '{}' has conflicting data type declarations", name),
        )
        .with_span(first.span)
        .with_column(key);
        for usage in std::iter::once(first).chain(uses) {
            diag = diag.with_label(
                format!(
                    "table '{}' (line {}): type {}",
                    usage.table, usage.span.line, usage.type_name
                ),
                usage.span,
            );
        }
        diagnostics.push(diag.with_help(
            "Check the business rules and, if the columns mean the same thing, declare them with one data type",
        ));
    }

    diagnostics
}

/// Report `DEFAULT` values that do not fit the declared column type
pub fn detect_default_value_conflicts(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut diagnostics = Vec::new();

    for (table, item) in table_items(&source) {
        let Some(column) = grammar::column_definition(item.text) else {
            continue;
        };
        let Some(raw) = column.default_value() else {
            continue;
        };
        if raw.eq_ignore_ascii_case("NULL") {
            continue;
        }

        let Some((kind, reason)) = default_conflict(&column, raw) else {
            continue;
        };
        let span = source.span_at(item.offset, item.text.len());
        diagnostics.push(
            Diagnostic::error(
                kind,
                format!(
                    "Column '{}' in table '{}' (line {}) {}",
                    column.name, table.name, span.line, reason
                ),
            )
            .with_span(span)
            .with_table(table.name)
            .with_column(column.key())
            .with_help("Make the default value match the column type"),
        );
    }

    diagnostics
}

fn default_conflict(column: &ColumnSyntax<'_>, raw: &str) -> Option<(DiagnosticKind, String)> {
    let ty = &column.data_type;
    let quoted = raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'');

    match ty.family() {
        TypeFamily::Text if !quoted => Some((
            DiagnosticKind::UnquotedTextDefault,
            format!(
                "has default value {} without quotes, which is not valid for type {}",
                raw,
                ty.display_name()
            ),
        )),
        TypeFamily::Text => {
            let value = unquote(raw);
            let limit = ty.length()?;
            let length = value.chars().count() as u64;
            (length > limit).then(|| {
                (
                    DiagnosticKind::TextDefaultTooLong,
                    format!(
                        "has default value '{}' of length {}, longer than the size {} of type {}",
                        value,
                        length,
                        limit,
                        ty.display_name()
                    ),
                )
            })
        }
        TypeFamily::Numeric => {
            let value = if quoted { unquote(raw) } else { raw.to_string() };
            value.trim().parse::<f64>().is_err().then(|| {
                (
                    DiagnosticKind::NonNumericDefault,
                    format!(
                        "has default value {} that cannot be converted to a number for type {}",
                        raw,
                        ty.display_name()
                    ),
                )
            })
        }
        TypeFamily::Other => None,
    }
}

/// Strip the outer quotes and collapse doubled quotes
fn unquote(raw: &str) -> String {
    raw[1..raw.len() - 1].replace("''", "'")
}

/// Report columns named with an ANSI SQL reserved word.
///
/// Each (table, column) pair is reported once. Quoted names are legal
/// everywhere and are skipped.
pub fn detect_reserved_words(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut reported: HashSet<(String, String)> = HashSet::new();
    let mut diagnostics = Vec::new();

    for (table, item) in table_items(&source) {
        let Some(column) = grammar::column_definition(item.text) else {
            continue;
        };
        if column.quoted || !is_reserved_word(column.name) {
            continue;
        }
        if !reported.insert((table.key(), column.key())) {
            continue;
        }

        let span = source.span_at(item.offset, column.name.len());
        diagnostics.push(
            Diagnostic::warning(
                DiagnosticKind::ReservedWordColumn,
                format!(
                    "Column '{}' in table '{}' (line {}) uses the ANSI SQL reserved word {}",
                    column.name,
                    table.name,
                    span.line,
                    column.key()
                ),
            )
            .with_span(span)
            .with_table(table.name)
            .with_column(column.key())
            .with_help("Rename the column to avoid conflicts when generating the DBMS schema"),
        );
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_types_lists_every_declaration() {
        let sql = "CREATE TABLE a (\n  age INT\n);\nCREATE TABLE b (\n  age VARCHAR(10)\n);";
        let diags = detect_conflicting_types(sql);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].columns, vec!["AGE"]);
        let labels: Vec<_> = diags[0].labels.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(
            labels,
            vec!["table 'a' (line 2): type int", "table 'b' (line 5): type varchar(10)"]
        );
    }

    #[test]
    fn test_size_difference_is_a_conflict() {
        let sql = "CREATE TABLE a (name VARCHAR(10));\nCREATE TABLE b (NAME varchar(20));";
        assert_eq!(detect_conflicting_types(sql).len(), 1);
    }

    #[test]
    fn test_same_type_any_case_is_fine() {
        let sql = "CREATE TABLE a (id INT);\nCREATE TABLE b (ID int);";
        assert!(detect_conflicting_types(sql).is_empty());
    }

    #[test]
    fn test_default_conflicts() {
        let sql = "CREATE TABLE t (\n  code VARCHAR(3) DEFAULT abc,\n  name CHAR(2) DEFAULT 'long',\n  qty INT DEFAULT 'x1',\n  note VARCHAR(5) DEFAULT NULL,\n  ok INT DEFAULT '42'\n);";
        let kinds: Vec<_> = detect_default_value_conflicts(sql)
            .into_iter()
            .map(|d| (d.kind, d.line()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (DiagnosticKind::UnquotedTextDefault, Some(2)),
                (DiagnosticKind::TextDefaultTooLong, Some(3)),
                (DiagnosticKind::NonNumericDefault, Some(4)),
            ]
        );
    }

    #[test]
    fn test_reserved_word_reported_once_per_table() {
        let sql = "CREATE TABLE t (\n  order INT,\n  ORDER INT,\n  \"select\" INT\n);";
        let diags = detect_reserved_words(sql);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), Some(2));
        assert_eq!(diags[0].table.as_deref(), Some("t"));
    }
}
