//! Schema catalog - stores the facts the scanner recognized

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::scan::grammar::name_key;
use crate::types::DeclaredType;

/// Schema catalog - tables and indexes found in a script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Uppercased table name -> table, in declaration order
    pub tables: IndexMap<String, TableDef>,
    pub indexes: Vec<IndexDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; a table declared again keeps its first definition
    pub fn add_table(&mut self, table: TableDef) {
        self.tables.entry(name_key(&table.name)).or_insert(table);
    }

    /// Look up a table by name (case-insensitive)
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(&name_key(name))
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableDef> {
        self.tables.get_mut(&name_key(name))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Table names as written
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.values().map(|t| t.name.as_str()).collect()
    }

    /// Indexes declared on a table
    pub fn indexes_on<'a>(&'a self, table: &str) -> impl Iterator<Item = &'a IndexDef> + 'a {
        let key = name_key(table);
        self.indexes
            .iter()
            .filter(move |index| name_key(&index.table) == key)
    }

    /// Every foreign key edge, as (child table, foreign key)
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&TableDef, &ForeignKeyDef)> {
        self.tables
            .values()
            .flat_map(|table| table.foreign_keys.iter().map(move |fk| (table, fk)))
    }
}

/// Table definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    /// Line of the `CREATE TABLE` header
    pub line: usize,
    pub columns: IndexMap<String, ColumnDef>,
    pub primary_key: Option<PrimaryKeyDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub unique_constraints: Vec<UniqueConstraintDef>,
    pub check_constraints: Vec<CheckConstraintDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            columns: IndexMap::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            unique_constraints: Vec::new(),
            check_constraints: Vec::new(),
        }
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        // Case-insensitive lookup
        self.columns.get(&name_key(name))
    }

    pub fn column_exists(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.values().map(|c| c.name.as_str()).collect()
    }

    /// Add a column; a later definition of the same name replaces the earlier one
    pub fn add_column(&mut self, column: ColumnDef) {
        self.columns.insert(name_key(&column.name), column);
    }

    /// Extend the primary key, creating it on first use
    pub fn add_primary_key_columns(&mut self, name: Option<String>, columns: Vec<String>, line: usize) {
        let pk = self.primary_key.get_or_insert_with(|| PrimaryKeyDef {
            name: None,
            columns: Vec::new(),
            line,
        });
        if pk.name.is_none() {
            pk.name = name;
        }
        for column in columns {
            if !pk.columns.contains(&column) {
                pk.columns.push(column);
            }
        }
    }
}

/// Column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DeclaredType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub line: usize,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DeclaredType, line: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            is_primary_key: false,
            is_unique: false,
            line,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark as primary key. Nullability stays as declared.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }
}

/// Default value for a column, as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Quoted string, without the quotes
    Literal(String),
    Number(String),
    Null,
    /// Any other bare word, such as `CURRENT_TIMESTAMP`
    Expression(String),
}

impl DefaultValue {
    /// Classify a raw `DEFAULT` token
    pub fn from_raw(raw: &str) -> Self {
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            DefaultValue::Literal(raw[1..raw.len() - 1].replace("''", "'"))
        } else if raw.eq_ignore_ascii_case("NULL") {
            DefaultValue::Null
        } else if raw.parse::<f64>().is_ok() {
            DefaultValue::Number(raw.to_string())
        } else {
            DefaultValue::Expression(raw.to_string())
        }
    }
}

/// Primary key constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub line: usize,
}

/// Where a foreign key was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeySource {
    /// `col type REFERENCES t(c)`
    Inline,
    /// `FOREIGN KEY (...) REFERENCES ...` inside the table body
    Table,
    /// `ALTER TABLE ... ADD ... FOREIGN KEY`
    AlterTable,
}

/// Foreign key constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub references_table: String,
    pub references_columns: Vec<String>,
    pub on_delete_cascade: bool,
    pub source: ForeignKeySource,
    pub line: usize,
}

/// Unique constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueConstraintDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub line: usize,
}

/// CHECK constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConstraintDef {
    pub name: Option<String>,
    pub expression: String,
    pub line: usize,
}

/// Standalone `CREATE [UNIQUE] INDEX`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub unique: bool,
    pub columns: Vec<String>,
    pub line: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_add_table_is_case_insensitive() {
        let mut catalog = Catalog::new();
        catalog.add_table(TableDef::new("Users", 1));
        catalog.add_table(TableDef::new("USERS", 9));

        assert!(catalog.table_exists("users"));
        assert_eq!(catalog.tables.len(), 1);
        assert_eq!(catalog.get_table("users").map(|t| t.line), Some(1));
    }

    #[test]
    fn test_primary_key_columns_merge() {
        let mut table = TableDef::new("t", 1);
        table.add_primary_key_columns(None, vec!["A".to_string()], 2);
        table.add_primary_key_columns(Some("pk".to_string()), vec!["A".to_string(), "B".to_string()], 4);
        let pk = table.primary_key.unwrap();
        assert_eq!(pk.columns, vec!["A", "B"]);
        assert_eq!(pk.name.as_deref(), Some("pk"));
        assert_eq!(pk.line, 2);
    }

    #[test]
    fn test_default_value_from_raw() {
        assert_eq!(DefaultValue::from_raw("'it''s'"), DefaultValue::Literal("it's".to_string()));
        assert_eq!(DefaultValue::from_raw("null"), DefaultValue::Null);
        assert_eq!(DefaultValue::from_raw("-1.5"), DefaultValue::Number("-1.5".to_string()));
        assert_eq!(
            DefaultValue::from_raw("CURRENT_TIMESTAMP"),
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string())
        );
    }
}
