//! Schema builder - collects scanner facts into a Catalog

use tracing::trace;

use crate::scan::grammar::{self, ColumnSyntax};
use crate::scan::{ScopeEvent, SourceLine, SourceText, TableDecl, TableScanner};
use crate::schema::{
    Catalog, CheckConstraintDef, ColumnDef, DefaultValue, ForeignKeyDef, ForeignKeySource,
    IndexDef, TableDef, UniqueConstraintDef,
};

/// Builder for constructing a Catalog from DDL scripts
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    catalog: Catalog,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a DDL script and add what it declares to the catalog.
    ///
    /// Unrecognized text is skipped; scanning never fails.
    pub fn parse(&mut self, sql: &str) -> &mut Self {
        let source = SourceText::new(sql);

        for event in TableScanner::new(&source).events() {
            match event {
                ScopeEvent::Enter(table) => {
                    self.catalog.add_table(TableDef::new(table.name, table.line));
                }
                ScopeEvent::Item { table, item } => self.process_item(&source, table, item),
                ScopeEvent::Exit { .. } => {}
            }
        }

        for index in grammar::indexes(&source) {
            self.catalog.indexes.push(IndexDef {
                name: index.name.to_string(),
                table: index.table.to_string(),
                unique: index.unique,
                columns: index.columns,
                line: index.line,
            });
        }

        for alter in grammar::alter_foreign_keys(&source) {
            let Some(table) = self.catalog.get_table_mut(alter.table) else {
                trace!(table = alter.table, "foreign key on undeclared table skipped");
                continue;
            };
            let fk = alter.foreign_key;
            table.foreign_keys.push(ForeignKeyDef {
                name: None,
                columns: fk.columns,
                references_table: fk.table.to_string(),
                references_columns: fk.target_columns,
                on_delete_cascade: fk.on_delete_cascade,
                source: ForeignKeySource::AlterTable,
                line: alter.line,
            });
        }

        self
    }

    /// Process one item of a table body
    fn process_item(&mut self, source: &SourceText, decl: TableDecl<'_>, item: SourceLine<'_>) {
        let Some(table) = self.catalog.get_table_mut(decl.name) else {
            return;
        };
        let line_at = |offset: usize| source.line_of(item.offset + offset);

        for check in grammar::check_expressions(item.text) {
            table.check_constraints.push(CheckConstraintDef {
                name: grammar::constraint_name(item.text).map(str::to_string),
                expression: check.expression.to_string(),
                line: line_at(check.offset),
            });
        }

        if let Some(column) = grammar::column_definition(item.text) {
            process_column(table, &column, item.number, &line_at);
            return;
        }

        let name = grammar::constraint_name(item.text).map(str::to_string);
        if let Some(columns) = grammar::primary_key_columns(item.text) {
            table.add_primary_key_columns(name.clone(), columns, item.number);
        }
        for columns in grammar::unique_columns(item.text) {
            table.unique_constraints.push(UniqueConstraintDef {
                name: name.clone(),
                columns,
                line: item.number,
            });
        }
        for fk in grammar::foreign_keys(item.text) {
            table.foreign_keys.push(ForeignKeyDef {
                name: name.clone(),
                columns: fk.columns,
                references_table: fk.table.to_string(),
                references_columns: fk.target_columns,
                on_delete_cascade: fk.on_delete_cascade,
                source: ForeignKeySource::Table,
                line: line_at(fk.offset),
            });
        }
    }

    /// Finish building and return the catalog
    pub fn build(self) -> Catalog {
        self.catalog
    }
}

fn process_column(
    table: &mut TableDef,
    column: &ColumnSyntax<'_>,
    line: usize,
    line_at: &dyn Fn(usize) -> usize,
) {
    let mut def = ColumnDef::new(column.name, column.data_type.clone(), line);
    if column.is_not_null() {
        def = def.not_null();
    }
    if let Some(raw) = column.default_value() {
        def = def.with_default(DefaultValue::from_raw(raw));
    }
    if column.is_unique() {
        def = def.unique();
        table.unique_constraints.push(UniqueConstraintDef {
            name: None,
            columns: vec![column.key()],
            line,
        });
    }
    if column.is_primary_key() {
        def = def.primary_key();
        table.add_primary_key_columns(None, vec![column.key()], line);
    }
    if let Some(fk) = column.reference() {
        table.foreign_keys.push(ForeignKeyDef {
            name: None,
            columns: fk.columns,
            references_table: fk.table.to_string(),
            references_columns: fk.target_columns,
            on_delete_cascade: fk.on_delete_cascade,
            source: ForeignKeySource::Inline,
            line: line_at(fk.offset),
        });
    }
    table.add_column(def);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(sql: &str) -> Catalog {
        let mut builder = SchemaBuilder::new();
        builder.parse(sql);
        builder.build()
    }

    #[test]
    fn test_columns_and_keys() {
        let catalog = build(
            "CREATE TABLE users (\n  id INT NOT NULL PRIMARY KEY,\n  email VARCHAR(100) UNIQUE,\n  status TEXT DEFAULT 'new' CHECK (status IN ('new', 'old'))\n);",
        );
        let users = catalog.get_table("USERS").unwrap();
        assert_eq!(users.column_names(), vec!["id", "email", "status"]);

        let id = users.get_column("ID").unwrap();
        assert!(!id.nullable);
        assert!(id.is_primary_key);
        assert_eq!(users.primary_key.as_ref().unwrap().columns, vec!["ID"]);

        assert!(users.get_column("email").unwrap().is_unique);
        assert_eq!(
            users.get_column("status").unwrap().default,
            Some(DefaultValue::Literal("new".to_string()))
        );
        assert_eq!(users.check_constraints[0].line, 4);
    }

    #[test]
    fn test_table_constraints() {
        let catalog = build(
            "CREATE TABLE orders (\n  id INT,\n  user_id INT,\n  CONSTRAINT pk_orders PRIMARY KEY (id),\n  CONSTRAINT fk_user FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE\n);",
        );
        let orders = catalog.get_table("orders").unwrap();
        let pk = orders.primary_key.as_ref().unwrap();
        assert_eq!(pk.name.as_deref(), Some("pk_orders"));
        assert_eq!(pk.line, 4);

        let fk = &orders.foreign_keys[0];
        assert_eq!(fk.name.as_deref(), Some("fk_user"));
        assert_eq!(fk.references_table, "users");
        assert!(fk.on_delete_cascade);
        assert_eq!(fk.source, ForeignKeySource::Table);
        assert_eq!(fk.line, 5);
    }

    #[test]
    fn test_indexes_and_alter_table() {
        let catalog = build(
            "CREATE TABLE a (id INT, b_id INT);\nCREATE UNIQUE INDEX ux_a ON a (b_id);\nALTER TABLE a ADD FOREIGN KEY (b_id) REFERENCES b(id);\nALTER TABLE ghost ADD FOREIGN KEY (x) REFERENCES a(id);",
        );
        assert_eq!(catalog.indexes_on("A").count(), 1);
        let a = catalog.get_table("a").unwrap();
        assert_eq!(a.foreign_keys.len(), 1);
        assert_eq!(a.foreign_keys[0].source, ForeignKeySource::AlterTable);
        assert_eq!(a.foreign_keys[0].line, 3);
        assert_eq!(catalog.foreign_keys().count(), 1);
    }
}
