//! CHECK and FOREIGN KEY constraint detectors

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::analyzer::one_line;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::scan::grammar::{self, pattern, ForeignKeySyntax};
use crate::scan::{table_items, SourceLine, SourceText};

pattern!(
    single_value_in_re,
    r"(?i)^\s*\w+\s+IN\s*\(\s*('[^']*'|\d+)\s*\)\s*$"
);
pattern!(non_negative_re, r"^\s*\w+\s*>=\s*0\s*$");
pattern!(tautology_re, r"^(?:1\s*=\s*1|0\s*=\s*0)$");
pattern!(
    range_re,
    r"(?i)(\w+)\s*<\s*(\d+)\s+AND\s+(\w+)\s*>\s*(\d+)"
);

/// Why a CHECK expression is useless
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckClass {
    /// `col IN (<one value>)`
    SingleValueIn,
    /// `col >= 0`
    NonRestrictive,
    /// `1=1` or `0=0`
    Tautology,
    /// `col < A AND col > B` with `A < B`
    Contradiction { column: String, upper: u128, lower: u128 },
}

impl CheckClass {
    fn kind(&self) -> DiagnosticKind {
        match self {
            CheckClass::SingleValueIn => DiagnosticKind::CheckSingleValueIn,
            CheckClass::NonRestrictive => DiagnosticKind::CheckNonRestrictive,
            CheckClass::Tautology => DiagnosticKind::CheckTautology,
            CheckClass::Contradiction { .. } => DiagnosticKind::CheckContradiction,
        }
    }
}

/// Classify a CHECK expression. The first matching class wins, in the order
/// single-value IN, `>= 0`, tautology, contradiction.
pub fn classify_check(expression: &str) -> Option<CheckClass> {
    if single_value_in_re().is_match(expression) {
        return Some(CheckClass::SingleValueIn);
    }
    if non_negative_re().is_match(expression) {
        return Some(CheckClass::NonRestrictive);
    }
    if tautology_re().is_match(expression) {
        return Some(CheckClass::Tautology);
    }

    // The same column must appear on both sides of AND
    let caps = range_re()
        .captures_iter(expression)
        .find(|caps| caps[1].eq_ignore_ascii_case(&caps[3]))?;
    let upper: u128 = caps[2].parse().ok()?;
    let lower: u128 = caps[4].parse().ok()?;
    (upper < lower).then(|| CheckClass::Contradiction {
        column: caps[1].to_string(),
        upper,
        lower,
    })
}

/// Report CHECK constraints that never restrict anything, or always fail
pub fn detect_unnecessary_check_constraints(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut diagnostics = Vec::new();

    for (table, item) in table_items(&source) {
        for check in grammar::check_expressions(item.text) {
            let Some(class) = classify_check(check.expression) else {
                continue;
            };
            let span = source.span_at(item.offset + check.offset, "CHECK".len());
            let header = format!(
                "Table '{}', line {}: CHECK ({})",
                table.name, span.line, check.expression
            );
            let (message, help) = match &class {
                CheckClass::SingleValueIn => (
                    format!("{header} is an IN list with a single value, so the value is always fixed"),
                    "Remove the CHECK or extend the list of allowed values".to_string(),
                ),
                CheckClass::NonRestrictive => (
                    format!("{header} is too weak and in most cases does not restrict the values"),
                    "Check whether this constraint is needed".to_string(),
                ),
                CheckClass::Tautology => (
                    format!("{header} is always true and has no effect on the data"),
                    "Remove the constraint".to_string(),
                ),
                CheckClass::Contradiction {
                    column,
                    upper,
                    lower,
                } => (
                    format!(
                        "{header} is contradictory and always false: {column} < {upper} AND {column} > {lower}"
                    ),
                    "Review the logic of the constraint".to_string(),
                ),
            };

            let diag = match &class {
                CheckClass::Contradiction { .. } => Diagnostic::error(class.kind(), message),
                CheckClass::NonRestrictive => Diagnostic::info(class.kind(), message),
                _ => Diagnostic::warning(class.kind(), message),
            };
            diagnostics.push(
                diag.with_span(span)
                    .with_table(table.name)
                    .with_help(help),
            );
        }
    }

    diagnostics
}

struct ForeignKeyUse<'s> {
    item: SourceLine<'s>,
    syntax: ForeignKeySyntax<'s>,
}

impl ForeignKeyUse<'_> {
    fn columns(&self) -> BTreeSet<&str> {
        self.syntax.columns.iter().map(String::as_str).collect()
    }

    /// Referenced table and columns; an omitted column list means the
    /// same-named columns
    fn target(&self) -> (String, BTreeSet<&str>) {
        let columns = if self.syntax.target_columns.is_empty() {
            &self.syntax.columns
        } else {
            &self.syntax.target_columns
        };
        (
            self.syntax.table_key(),
            columns.iter().map(String::as_str).collect(),
        )
    }
}

/// Report pairs of foreign keys in one table that share columns but point at
/// different tables or columns
pub fn detect_conflicting_foreign_keys(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut by_table: IndexMap<String, (String, Vec<ForeignKeyUse<'_>>)> = IndexMap::new();

    for (table, item) in table_items(&source) {
        for syntax in grammar::foreign_keys(item.text) {
            by_table
                .entry(table.key())
                .or_insert_with(|| (table.name.to_string(), Vec::new()))
                .1
                .push(ForeignKeyUse { item, syntax });
        }
    }

    let mut diagnostics = Vec::new();
    for (name, fks) in by_table.values() {
        for (i, first) in fks.iter().enumerate() {
            for second in &fks[i + 1..] {
                let shared: Vec<&str> = first
                    .columns()
                    .intersection(&second.columns())
                    .copied()
                    .collect();
                if shared.is_empty() || first.target() == second.target() {
                    continue;
                }

                let first_span = source.span_of(&first.item);
                let second_span = source.span_of(&second.item);
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::ConflictingForeignKeys,
                        format!(
                            "Foreign keys in table '{}' share columns {} but reference different tables or columns",
                            name,
                            shared.join(", ")
                        ),
                    )
                    .with_span(first_span)
                    .with_label(
                        format!("FK on line {}: {}", first_span.line, one_line(first.item.text)),
                        first_span,
                    )
                    .with_label(
                        format!("FK on line {}: {}", second_span.line, one_line(second.item.text)),
                        second_span,
                    )
                    .with_table(name.as_str())
                    .with_columns(shared.iter().copied())
                    .with_help("Review the foreign key design to avoid conflicting references"),
                );
            }
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_check_precedence() {
        assert_eq!(classify_check("status IN ('active')"), Some(CheckClass::SingleValueIn));
        assert_eq!(classify_check("age >= 0"), Some(CheckClass::NonRestrictive));
        assert_eq!(classify_check("1 = 1"), Some(CheckClass::Tautology));
        assert_eq!(
            classify_check("age < 10 AND AGE > 20"),
            Some(CheckClass::Contradiction {
                column: "age".to_string(),
                upper: 10,
                lower: 20
            })
        );
        assert_eq!(classify_check("age < 20 AND age > 10"), None);
        assert_eq!(classify_check("a < 10 AND b > 20"), None);
        assert_eq!(classify_check("status IN ('a', 'b')"), None);
    }

    #[test]
    fn test_check_findings_carry_line() {
        let sql = "CREATE TABLE t (\n  status TEXT CHECK (status IN ('active')),\n  age INT,\n  CHECK (age < 10 AND age > 20)\n);";
        let found: Vec<_> = detect_unnecessary_check_constraints(sql)
            .into_iter()
            .map(|d| (d.kind, d.line()))
            .collect();
        assert_eq!(
            found,
            vec![
                (DiagnosticKind::CheckSingleValueIn, Some(2)),
                (DiagnosticKind::CheckContradiction, Some(4)),
            ]
        );
    }

    #[test]
    fn test_conflicting_foreign_keys() {
        let sql = "CREATE TABLE t (\n  a_id INT,\n  FOREIGN KEY (a_id) REFERENCES a(id),\n  FOREIGN KEY (a_id) REFERENCES b(id),\n  FOREIGN KEY (a_id) REFERENCES a(id)\n);";
        let diags = detect_conflicting_foreign_keys(sql);
        // 1-2 and 2-3 conflict, 1-3 are the same reference
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].columns, vec!["A_ID"]);
        assert_eq!(diags[0].labels[1].span.line, 4);
    }

    #[test]
    fn test_omitted_target_columns_mean_same_names() {
        let sql = "CREATE TABLE t (\n  id INT,\n  FOREIGN KEY (id) REFERENCES a,\n  FOREIGN KEY (id) REFERENCES a(id)\n);";
        assert!(detect_conflicting_foreign_keys(sql).is_empty());

        let sql = "CREATE TABLE t (\n  a_id INT,\n  FOREIGN KEY (a_id) REFERENCES a,\n  FOREIGN KEY (a_id) REFERENCES a(id)\n);";
        assert_eq!(detect_conflicting_foreign_keys(sql).len(), 1);
    }
}
