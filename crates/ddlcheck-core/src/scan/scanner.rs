//! Table-scope scanner
//!
//! Walks the script once and reports which table body each piece of text
//! belongs to. A `CREATE TABLE` header opens a scope; the scope closes on the
//! parenthesis matching the body's opening one, or at the end of the
//! statement. Body text is cut at top-level commas into items, so a column
//! definition or a table constraint arrives as one item even when it is
//! split across lines or shares a line with others.

use tracing::trace;

use crate::scan::grammar::{self, name_key, TableHeader};
use crate::scan::source::{SourceLine, SourceText};

/// A table declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDecl<'s> {
    /// Unquoted table name as written
    pub name: &'s str,
    /// Line of the `CREATE TABLE` header
    pub line: usize,
    pub offset: usize,
}

impl TableDecl<'_> {
    /// Case-insensitive comparison key
    pub fn key(&self) -> String {
        name_key(self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEvent<'s> {
    /// A table scope opened
    Enter(TableDecl<'s>),
    /// A comma-separated item of the table body
    Item {
        table: TableDecl<'s>,
        item: SourceLine<'s>,
    },
    /// A table scope closed on `line`
    Exit { table: TableDecl<'s>, line: usize },
}

/// What happens to an open scope when another `CREATE TABLE` shows up inside it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopeMode {
    /// The new table replaces the active one
    #[default]
    Replace,
    /// The new table is pushed; closing it returns to the enclosing table
    Nested,
}

#[derive(Debug)]
struct OpenScope<'s> {
    table: TableDecl<'s>,
    depth: usize,
    item_start: Option<usize>,
}

pub struct TableScanner<'s> {
    source: &'s SourceText,
    mode: ScopeMode,
}

impl<'s> TableScanner<'s> {
    pub fn new(source: &'s SourceText) -> Self {
        Self {
            source,
            mode: ScopeMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ScopeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Scan the whole script
    pub fn events(&self) -> Vec<ScopeEvent<'s>> {
        let text = self.source.text();
        let bytes = text.as_bytes();
        let mut events = Vec::new();
        let mut stack: Vec<OpenScope<'s>> = Vec::new();
        let mut quote: Option<u8> = None;
        let mut next_header = grammar::create_table_at(text, 0);
        let mut i = 0;

        while i < bytes.len() {
            if next_header.is_some_and(|h| h.start < i) {
                next_header = grammar::create_table_at(text, i);
            }

            if quote.is_none() {
                if let Some(header) = next_header.filter(|h| h.start == i) {
                    self.open(&mut events, &mut stack, header, i);
                    i = header.end;
                    next_header = grammar::create_table_at(text, i);
                    continue;
                }
            }

            let Some(scope) = stack.last_mut() else {
                // Nothing to track between tables
                i = next_header.map_or(bytes.len(), |h| h.start);
                continue;
            };

            let b = bytes[i];
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                i += 1;
                continue;
            }

            match b {
                b'\'' | b'"' | b'`' if scope.depth > 0 => quote = Some(b),
                b'(' => {
                    scope.depth += 1;
                    if scope.depth == 1 {
                        scope.item_start = Some(i + 1);
                    }
                }
                b')' if scope.depth > 0 => {
                    scope.depth -= 1;
                    if scope.depth == 0 {
                        self.flush_item(&mut events, scope, i);
                        let table = scope.table;
                        stack.pop();
                        events.push(ScopeEvent::Exit {
                            table,
                            line: self.source.line_of(i),
                        });
                        if let Some(outer) = stack.last_mut() {
                            if outer.depth > 0 {
                                outer.item_start = Some(i + 1);
                            }
                        }
                    }
                }
                b',' if scope.depth == 1 => {
                    self.flush_item(&mut events, scope, i);
                    scope.item_start = Some(i + 1);
                }
                b';' => {
                    self.close_all(&mut events, &mut stack, i);
                }
                _ => {}
            }
            i += 1;
        }

        self.close_all(&mut events, &mut stack, bytes.len());
        events
    }

    fn open(
        &self,
        events: &mut Vec<ScopeEvent<'s>>,
        stack: &mut Vec<OpenScope<'s>>,
        header: TableHeader<'s>,
        at: usize,
    ) {
        match self.mode {
            ScopeMode::Replace => self.close_all(events, stack, at),
            ScopeMode::Nested => {
                if let Some(outer) = stack.last_mut() {
                    self.flush_item(events, outer, at);
                    outer.item_start = None;
                }
            }
        }

        let table = TableDecl {
            name: header.name,
            line: self.source.line_of(header.start),
            offset: header.start,
        };
        trace!(table = table.name, line = table.line, "entering table scope");
        events.push(ScopeEvent::Enter(table));
        stack.push(OpenScope {
            table,
            depth: 0,
            item_start: None,
        });
    }

    /// Close every open scope, innermost first
    fn close_all(&self, events: &mut Vec<ScopeEvent<'s>>, stack: &mut Vec<OpenScope<'s>>, at: usize) {
        while let Some(mut scope) = stack.pop() {
            self.flush_item(events, &mut scope, at);
            events.push(ScopeEvent::Exit {
                table: scope.table,
                line: self.source.line_of(at.min(self.source.text().len().saturating_sub(1))),
            });
        }
    }

    /// Emit the item running from the scope's item start up to `end`
    fn flush_item(&self, events: &mut Vec<ScopeEvent<'s>>, scope: &mut OpenScope<'s>, end: usize) {
        let Some(start) = scope.item_start.take() else {
            return;
        };
        let text = self.source.text();
        let raw = &text[start..end.max(start)];
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let offset = start + (raw.len() - raw.trim_start().len());
        events.push(ScopeEvent::Item {
            table: scope.table,
            item: SourceLine {
                number: self.source.line_of(offset),
                offset,
                text: trimmed,
            },
        });
    }
}

/// Items of every table body, in script order
pub fn table_items(source: &SourceText) -> Vec<(TableDecl<'_>, SourceLine<'_>)> {
    TableScanner::new(source)
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ScopeEvent::Item { table, item } => Some((table, item)),
            _ => None,
        })
        .collect()
}

/// Every declared table, in script order
pub fn tables(source: &SourceText) -> Vec<TableDecl<'_>> {
    TableScanner::new(source)
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ScopeEvent::Enter(table) => Some(table),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(sql: &str) -> Vec<(String, usize, String)> {
        let source = SourceText::new(sql);
        table_items(&source)
            .into_iter()
            .map(|(t, l)| (t.name.to_string(), l.number, l.text.to_string()))
            .collect()
    }

    #[test]
    fn test_multiline_table() {
        let sql = "CREATE TABLE users (\n  id INT PRIMARY KEY,\n  name VARCHAR(10) NOT NULL\n);";
        assert_eq!(
            items(sql),
            vec![
                ("users".to_string(), 2, "id INT PRIMARY KEY".to_string()),
                ("users".to_string(), 3, "name VARCHAR(10) NOT NULL".to_string()),
            ]
        );
    }

    #[test]
    fn test_single_line_table() {
        let found = items("CREATE TABLE t (id INT PRIMARY KEY, price DECIMAL(10, 2))");
        let texts: Vec<_> = found.iter().map(|(_, _, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["id INT PRIMARY KEY", "price DECIMAL(10, 2)"]);
    }

    #[test]
    fn test_item_spanning_lines_keeps_first_line() {
        let sql = "CREATE TABLE a (\n  b_id INT,\n  FOREIGN KEY (b_id)\n    REFERENCES b(id)\n)";
        let found = items(sql);
        assert_eq!(found[1].1, 3);
        assert!(found[1].2.ends_with("REFERENCES b(id)"));
    }

    #[test]
    fn test_scope_events_and_lines() {
        let source = SourceText::new("CREATE TABLE a (\n  id INT\n);\nCREATE TABLE b (id INT);");
        let events = TableScanner::new(&source).events();
        let summary: Vec<String> = events
            .iter()
            .map(|e| match e {
                ScopeEvent::Enter(t) => format!("enter {} {}", t.name, t.line),
                ScopeEvent::Item { item, .. } => format!("item {}", item.number),
                ScopeEvent::Exit { table, line } => format!("exit {} {}", table.name, line),
            })
            .collect();
        assert_eq!(
            summary,
            vec!["enter a 1", "item 2", "exit a 3", "enter b 4", "item 4", "exit b 4"]
        );
    }

    #[test]
    fn test_commas_inside_strings_and_parens() {
        let found = items("CREATE TABLE t (s VARCHAR(5) DEFAULT 'a,b', CHECK (x IN (1, 2)))");
        let texts: Vec<_> = found.iter().map(|(_, _, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["s VARCHAR(5) DEFAULT 'a,b'", "CHECK (x IN (1, 2))"]);
    }

    #[test]
    fn test_semicolon_closes_unbalanced_scope() {
        let found = items("CREATE TABLE a (id INT;\nCREATE TABLE b (code TEXT);");
        let tables: Vec<_> = found.iter().map(|(t, _, _)| t.as_str()).collect();
        assert_eq!(tables, vec!["a", "b"]);
    }

    #[test]
    fn test_replace_mode_drops_active_table() {
        let source = SourceText::new("CREATE TABLE a (\n  id INT,\nCREATE TABLE b (\n  code INT\n)");
        let found = tables(&source);
        assert_eq!(found.len(), 2);
        let owners: Vec<_> = table_items(&source).into_iter().map(|(t, _)| t.name).collect();
        assert_eq!(owners, vec!["a", "b"]);
    }

    #[test]
    fn test_nested_mode_returns_to_outer_table() {
        let source =
            SourceText::new("CREATE TABLE a (\n  x INT,\n  CREATE TABLE b (y INT),\n  z INT\n)");
        let owners: Vec<(String, String)> = TableScanner::new(&source)
            .with_mode(ScopeMode::Nested)
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ScopeEvent::Item { table, item } => {
                    Some((table.name.to_string(), item.text.to_string()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            owners,
            vec![
                ("a".to_string(), "x INT".to_string()),
                ("b".to_string(), "y INT".to_string()),
                ("a".to_string(), "z INT".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_inside_comment_is_ignored() {
        let found = items("-- CREATE TABLE ghost (\nCREATE TABLE real (id INT)");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "real");
    }
}
