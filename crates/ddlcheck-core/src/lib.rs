//! ddlcheck-core: schema-design analysis for SQL DDL scripts
//!
//! This library scans `CREATE TABLE`, `CREATE INDEX` and `ALTER TABLE`
//! statements with lightweight patterns and reports modeling anti-patterns
//! without requiring a database connection or a full SQL parser.

pub mod analyzer;
pub mod error;
pub mod scan;
pub mod schema;
pub mod types;

pub use analyzer::{Analyzer, DetectorGroup, DetectorId};
pub use error::{DetectorError, Diagnostic, DiagnosticKind, Severity, Span};
pub use scan::SourceText;
pub use schema::{Catalog, SchemaBuilder};
pub use types::DeclaredType;
