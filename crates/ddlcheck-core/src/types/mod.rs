//! Declared column types

use std::fmt;

use serde::{Deserialize, Serialize};

/// A column type as written in the script, with its parenthesized size
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclaredType {
    /// Type name as written (e.g., "VARCHAR")
    pub name: String,
    /// Size parameters (e.g., `[10, 2]` for `DECIMAL(10, 2)`)
    pub params: Vec<u64>,
}

/// Coarse type classification used for default-value checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFamily {
    Text,
    Numeric,
    Other,
}

impl DeclaredType {
    pub fn new(name: impl Into<String>, params: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Comparison key: lowercase, no whitespace.
    ///
    /// The size is part of the key, so `varchar(10)` and `varchar(20)` differ.
    pub fn key(&self) -> String {
        self.render(self.name.to_lowercase())
    }

    /// Type as written, with normalized size spacing
    pub fn display_name(&self) -> String {
        self.render(self.name.clone())
    }

    fn render(&self, name: String) -> String {
        if self.params.is_empty() {
            return name;
        }
        let params: Vec<String> = self.params.iter().map(u64::to_string).collect();
        format!("{}({})", name, params.join(","))
    }

    /// Classify the type name
    pub fn family(&self) -> TypeFamily {
        match self.name.to_lowercase().as_str() {
            "char" | "character" | "nchar" | "varchar" | "varchar2" | "nvarchar" | "nvarchar2" => {
                TypeFamily::Text
            }
            "int" | "integer" | "smallint" | "bigint" | "tinyint" | "mediumint" | "int2"
            | "int4" | "int8" | "number" | "numeric" | "decimal" | "dec" | "real" | "float"
            | "double" => TypeFamily::Numeric,
            _ => TypeFamily::Other,
        }
    }

    /// Declared maximum length (first size parameter)
    pub fn length(&self) -> Option<u64> {
        self.params.first().copied()
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_size() {
        let a = DeclaredType::new("VARCHAR", vec![10]);
        let b = DeclaredType::new("varchar", vec![20]);
        assert_eq!(a.key(), "varchar(10)");
        assert_ne!(a.key(), b.key());
        assert_eq!(DeclaredType::new("Decimal", vec![10, 2]).display_name(), "Decimal(10,2)");
    }

    #[test]
    fn test_family() {
        assert_eq!(DeclaredType::new("VARCHAR2", vec![5]).family(), TypeFamily::Text);
        assert_eq!(DeclaredType::new("Integer", vec![]).family(), TypeFamily::Numeric);
        assert_eq!(DeclaredType::new("text", vec![]).family(), TypeFamily::Other);
        assert_eq!(DeclaredType::new("char", vec![3]).length(), Some(3));
    }
}
