//! Relation-modeling detectors

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::scan::grammar::{self, name_key};
use crate::scan::{table_items, ScopeEvent, ScopeMode, SourceText, TableScanner};

struct ColumnUse {
    table: String,
    table_key: String,
    line: usize,
    span: Span,
}

/// A foreign key edge between (table, column) pairs, all uppercased
type FkEnd = (String, String);

/// Record the column pairs of a foreign key. A missing target column list
/// is taken to reference columns of the same name.
fn record_edges(
    children: &mut HashSet<FkEnd>,
    parents: &mut HashSet<FkEnd>,
    child_table: &str,
    columns: &[String],
    parent_table: &str,
    targets: &[String],
) {
    for (i, column) in columns.iter().enumerate() {
        let target = targets.get(i).unwrap_or(column);
        children.insert((name_key(child_table), column.clone()));
        parents.insert((name_key(parent_table), target.clone()));
    }
}

/// Report columns that appear with the same name and type in several
/// tables without a foreign key between them.
///
/// Definitions that mention a constraint keyword are not grouped. A group is
/// skipped when every occurrence is a primary key column, or when a foreign
/// key on that column links any two of its tables.
pub fn detect_undefined_relations(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    // (column key, type key) -> (column name, type name, occurrences)
    let mut groups: IndexMap<(String, String), (String, String, Vec<ColumnUse>)> =
        IndexMap::new();
    let mut primary_keys: HashSet<FkEnd> = HashSet::new();
    let mut children: HashSet<FkEnd> = HashSet::new();
    let mut parents: HashSet<FkEnd> = HashSet::new();

    for (table, item) in table_items(&source) {
        if let Some(column) = grammar::column_definition(item.text) {
            if column.is_primary_key() {
                primary_keys.insert((table.key(), column.key()));
            }
            if let Some(reference) = column.reference() {
                record_edges(
                    &mut children,
                    &mut parents,
                    table.name,
                    &reference.columns,
                    reference.table,
                    &reference.target_columns,
                );
            }
            if grammar::mentions_constraint(item.text) {
                continue;
            }
            groups
                .entry((column.key(), column.data_type.key()))
                .or_insert_with(|| {
                    (
                        column.key(),
                        column.data_type.display_name().to_lowercase(),
                        Vec::new(),
                    )
                })
                .2
                .push(ColumnUse {
                    table: table.name.to_string(),
                    table_key: table.key(),
                    line: item.number,
                    span: source.span_of(&item),
                });
            continue;
        }

        if let Some(columns) = grammar::primary_key_columns(item.text) {
            for column in columns {
                primary_keys.insert((table.key(), column));
            }
        }
        for fk in grammar::foreign_keys(item.text) {
            record_edges(
                &mut children,
                &mut parents,
                table.name,
                &fk.columns,
                fk.table,
                &fk.target_columns,
            );
        }
    }
    for alter in grammar::alter_foreign_keys(&source) {
        let fk = &alter.foreign_key;
        record_edges(
            &mut children,
            &mut parents,
            alter.table,
            &fk.columns,
            fk.table,
            &fk.target_columns,
        );
    }

    let mut diagnostics = Vec::new();
    for (column, type_name, uses) in groups.values() {
        let tables: BTreeSet<&str> = uses.iter().map(|u| u.table_key.as_str()).collect();
        if tables.len() < 2 {
            continue;
        }

        let is_pk = |table: &str| primary_keys.contains(&(table.to_string(), column.clone()));
        if tables.iter().all(|&t| is_pk(t)) {
            continue;
        }

        let related = tables.iter().any(|t1| {
            tables.iter().any(|t2| {
                children.contains(&(t1.to_string(), column.clone()))
                    && parents.contains(&(t2.to_string(), column.clone()))
            })
        });
        if related {
            continue;
        }

        let names: BTreeSet<&str> = uses.iter().map(|u| u.table.as_str()).collect();
        let mut diag = Diagnostic::info(
            DiagnosticKind::UndefinedRelation,
            format!(
                "Column '{}' (type {}) appears in tables {} without a declared relation",
                column,
                type_name,
                names.into_iter().collect::<Vec<_>>().join(", ")
            ),
        )
        .with_span(uses[0].span)
        .with_column(column.as_str());
        for usage in uses {
            let flag = if is_pk(usage.table_key.as_str()) { " (PK)" } else { "" };
            diag = diag.with_label(
                format!("table '{}', line {}{}", usage.table, usage.line, flag),
                usage.span,
            );
        }
        diagnostics.push(diag.with_help(
            "Check the business rules and, if needed, connect the tables with a FOREIGN KEY",
        ));
    }

    diagnostics
}

struct Relation {
    from_table: String,
    from_column: String,
    to_table: String,
    to_column: String,
    span: Span,
}

/// Report pairs of tables that reference each other (A -> B and B -> A).
/// Such tables cannot be filled without breaking referential integrity.
pub fn detect_overlapping_relations(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut relations = Vec::new();

    for event in TableScanner::new(&source)
        .with_mode(ScopeMode::Nested)
        .events()
    {
        let ScopeEvent::Item { table, item } = event else {
            continue;
        };
        for fk in grammar::foreign_keys(item.text) {
            let ([from_column], [to_column]) = (fk.columns.as_slice(), fk.target_columns.as_slice())
            else {
                continue;
            };
            relations.push(Relation {
                from_table: table.name.to_string(),
                from_column: from_column.clone(),
                to_table: fk.table.to_string(),
                to_column: to_column.clone(),
                span: source.span_at(item.offset + fk.offset, 0),
            });
        }
    }

    // Unordered table pair -> relations between them
    let mut pairs: IndexMap<(String, String), Vec<&Relation>> = IndexMap::new();
    for relation in &relations {
        let a = name_key(&relation.from_table);
        let b = name_key(&relation.to_table);
        let pair = if a <= b { (a, b) } else { (b, a) };
        pairs.entry(pair).or_default().push(relation);
    }

    let mut diagnostics = Vec::new();
    for rels in pairs.values() {
        let [first, second] = rels.as_slice() else {
            continue;
        };
        if name_key(&first.from_table) == name_key(&second.from_table) {
            continue;
        }

        let mut diag = Diagnostic::error(
            DiagnosticKind::OverlappingRelations,
            format!(
                "Tables '{}' and '{}' reference each other",
                first.from_table, second.from_table
            ),
        )
        .with_span(first.span);
        for rel in [first, second] {
            diag = diag.with_label(
                format!(
                    "{}.{} -> {}.{}",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column
                ),
                rel.span,
            );
        }
        diagnostics.push(
            diag.with_columns([first.from_column.as_str(), second.from_column.as_str()])
                .with_help(
                    "Avoid two-way dependencies: use one-directional relations or deferred constraints",
                ),
        );
    }

    diagnostics
}

/// Report self-referencing foreign keys on NOT NULL columns.
///
/// A hierarchy needs a root row whose parent is NULL.
pub fn detect_incorrect_recursive_relations(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    // (table key, column key) -> NOT NULL
    let mut not_null: IndexMap<(String, String), bool> = IndexMap::new();
    let mut self_refs = Vec::new();

    for (table, item) in table_items(&source) {
        let mut fks = grammar::foreign_keys(item.text);
        if let Some(column) = grammar::column_definition(item.text) {
            let key = (table.key(), column.key());
            if column.is_not_null() {
                not_null.insert(key, true);
            } else {
                not_null.entry(key).or_insert(false);
            }
            fks.extend(column.reference());
        }

        for fk in fks {
            if fk.table_key() != table.key() {
                continue;
            }
            for column in fk.columns {
                self_refs.push((table, column, source.span_at(item.offset + fk.offset, 0)));
            }
        }
    }

    self_refs
        .into_iter()
        .filter(|(table, column, _)| {
            not_null
                .get(&(table.key(), column.clone()))
                .copied()
                .unwrap_or(false)
        })
        .map(|(table, column, span)| {
            Diagnostic::error(
                DiagnosticKind::NonNullableSelfReference,
                format!(
                    "Table '{}' references itself through column '{}', which is declared NOT NULL",
                    table.name, column
                ),
            )
            .with_span(span)
            .with_label("a root row of the hierarchy can never be inserted", span)
            .with_table(table.name)
            .with_column(column.as_str())
            .with_help(format!("Allow NULL in column '{}'", column))
        })
        .collect()
}

/// Directed graph of ON DELETE CASCADE foreign keys
#[derive(Debug, Default)]
struct CascadeGraph {
    /// Node key -> name as first written, in first-appearance order
    names: IndexMap<String, String>,
    /// Node key -> (target key, offset of the REFERENCES clause)
    edges: IndexMap<String, Vec<(String, usize)>>,
}

impl CascadeGraph {
    fn add_node(&mut self, name: &str) -> String {
        let key = name_key(name);
        self.names
            .entry(key.clone())
            .or_insert_with(|| name.to_string());
        key
    }

    fn add_edge(&mut self, from: &str, to: &str, offset: usize) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.edges.entry(from).or_default().push((to, offset));
    }

    fn neighbors(&self, node: &str) -> &[(String, usize)] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// First cycle reachable from `node`, as the path slice from the repeated
    /// node onward. `path` and `visited` are copied per branch.
    fn find_cycle(
        &self,
        node: &str,
        mut path: Vec<String>,
        mut visited: HashSet<String>,
    ) -> Option<Vec<String>> {
        path.push(node.to_string());
        visited.insert(node.to_string());

        for (next, _) in self.neighbors(node) {
            if let Some(idx) = path.iter().position(|p| p == next) {
                return Some(path[idx..].to_vec());
            }
            if !visited.contains(next) {
                if let Some(cycle) = self.find_cycle(next, path.clone(), visited.clone()) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// First cycle found, starting from nodes in first-appearance order
    fn first_cycle(&self) -> Option<Vec<String>> {
        self.names
            .keys()
            .find_map(|start| self.find_cycle(start, Vec::new(), HashSet::new()))
    }

    fn edge_offset(&self, from: &str, to: &str) -> Option<usize> {
        self.neighbors(from)
            .iter()
            .find(|(target, _)| target == to)
            .map(|&(_, offset)| offset)
    }
}

/// Report a cycle of ON DELETE CASCADE foreign keys.
///
/// Only the first cycle is reported. Start nodes are tried in the order the
/// tables first appear in cascade foreign keys, so the result is stable.
pub fn detect_infinite_delete_cascade(sql: &str) -> Vec<Diagnostic> {
    let source = SourceText::new(sql);
    let mut graph = CascadeGraph::default();

    for stmt in source.statements() {
        let Some(table) = grammar::create_table(stmt.text)
            .map(|header| header.name)
            .or_else(|| grammar::alter_table(stmt.text))
        else {
            continue;
        };
        for reference in grammar::references(stmt.text) {
            if reference.on_delete_cascade {
                trace!(from = table, to = reference.table, "cascade edge");
                graph.add_edge(table, reference.table, stmt.offset + reference.offset);
            }
        }
    }

    let Some(cycle) = graph.first_cycle() else {
        return Vec::new();
    };

    let name_of = |key: &str| graph.names.get(key).map_or(key.to_string(), Clone::clone);
    let closed: Vec<&String> = cycle.iter().chain(cycle.first()).collect();
    let path = closed
        .iter()
        .map(|key| name_of(key.as_str()))
        .collect::<Vec<_>>()
        .join(" -> ");

    let mut diag = Diagnostic::error(
        DiagnosticKind::CascadeDeleteCycle,
        format!("Cycle of cascading deletes between tables: {}", path),
    );
    for pair in closed.windows(2) {
        if let Some(offset) = graph.edge_offset(pair[0], pair[1]) {
            let span = source.span_at(offset, "REFERENCES".len());
            if diag.span.is_none() {
                diag = diag.with_span(span);
            }
            diag = diag.with_label(
                format!(
                    "{} -> {} (line {})",
                    name_of(pair[0].as_str()),
                    name_of(pair[1].as_str()),
                    span.line
                ),
                span,
            );
        }
    }

    vec![diag.with_help("Remove at least one ON DELETE CASCADE dependency from the cycle")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_relation_between_tables() {
        let sql = "CREATE TABLE orders (\n  id INT PRIMARY KEY,\n  customer_id INT\n);\nCREATE TABLE invoices (\n  id INT PRIMARY KEY,\n  customer_id INT\n);";
        let diags = detect_undefined_relations(sql);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].columns, vec!["CUSTOMER_ID"]);
        assert_eq!(diags[0].labels.len(), 2);
    }

    #[test]
    fn test_declared_relation_is_not_reported() {
        let sql = "CREATE TABLE customers (\n  customer_id INT,\n  PRIMARY KEY (customer_id)\n);\nCREATE TABLE orders (\n  customer_id INT,\n  FOREIGN KEY (customer_id) REFERENCES customers(customer_id)\n);";
        assert!(detect_undefined_relations(sql).is_empty());
    }

    #[test]
    fn test_all_primary_keys_are_skipped() {
        let sql = "CREATE TABLE a (\n  code INT,\n  PRIMARY KEY (code)\n);\nCREATE TABLE b (\n  code INT,\n  PRIMARY KEY (code)\n);";
        assert!(detect_undefined_relations(sql).is_empty());
    }

    #[test]
    fn test_overlapping_relations() {
        let sql = "CREATE TABLE a (\n  id INT,\n  b_id INT,\n  FOREIGN KEY (b_id) REFERENCES b(id)\n);\nCREATE TABLE b (\n  id INT,\n  a_id INT,\n  FOREIGN KEY (a_id) REFERENCES a(id)\n);";
        let diags = detect_overlapping_relations(sql);
        assert_eq!(diags.len(), 1);
        let labels: Vec<_> = diags[0].labels.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(labels, vec!["a.B_ID -> b.ID", "b.A_ID -> a.ID"]);
    }

    #[test]
    fn test_one_way_relation_is_fine() {
        let sql = "CREATE TABLE a (id INT);\nCREATE TABLE b (a_id INT, FOREIGN KEY (a_id) REFERENCES a(id));";
        assert!(detect_overlapping_relations(sql).is_empty());
    }

    #[test]
    fn test_not_null_self_reference() {
        let sql = "CREATE TABLE node (\n  id INT PRIMARY KEY,\n  parent_id INT NOT NULL,\n  FOREIGN KEY (parent_id) REFERENCES node(id)\n);\nCREATE TABLE tree (\n  id INT,\n  up_id INT NOT NULL REFERENCES tree(id)\n);\nCREATE TABLE ok (\n  id INT,\n  parent_id INT REFERENCES ok(id)\n);";
        let tables: Vec<_> = detect_incorrect_recursive_relations(sql)
            .into_iter()
            .filter_map(|d| d.table)
            .collect();
        assert_eq!(tables, vec!["node", "tree"]);
    }

    #[test]
    fn test_cascade_cycle_closes_on_start() {
        let sql = "CREATE TABLE A (\n  id INT,\n  b_id INT,\n  FOREIGN KEY (b_id) REFERENCES B(id) ON DELETE CASCADE\n);\nCREATE TABLE B (\n  id INT,\n  a_id INT,\n  FOREIGN KEY (a_id) REFERENCES A(id) ON DELETE CASCADE\n);";
        let diags = detect_infinite_delete_cascade(sql);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.ends_with("A -> B -> A"));
        assert_eq!(diags[0].line(), Some(4));
    }

    #[test]
    fn test_cascade_through_alter_and_inline_references() {
        let sql = "CREATE TABLE a (id INT, c_id INT REFERENCES c(id) ON UPDATE CASCADE ON DELETE CASCADE);\nCREATE TABLE b (id INT);\nCREATE TABLE c (id INT);\nALTER TABLE b ADD FOREIGN KEY (id) REFERENCES a(id) ON DELETE CASCADE;\nALTER TABLE c ADD CONSTRAINT fk FOREIGN KEY (id) REFERENCES b(id) ON DELETE CASCADE;";
        let diags = detect_infinite_delete_cascade(sql);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.ends_with("a -> c -> b -> a"));
    }

    #[test]
    fn test_cascade_without_cycle() {
        let sql = "CREATE TABLE a (id INT);\nCREATE TABLE b (a_id INT REFERENCES a(id) ON DELETE CASCADE);";
        assert!(detect_infinite_delete_cascade(sql).is_empty());
    }
}
