//! Tolerant DDL scanning
//!
//! [`SourceText`] prepares the script, [`TableScanner`] tracks table scopes and
//! [`grammar`] recognizes the constructs detectors care about. Unrecognized
//! text is skipped without complaint.

pub mod grammar;
mod scanner;
mod source;

pub use scanner::{table_items, tables, ScopeEvent, ScopeMode, TableDecl, TableScanner};
pub use source::{SourceLine, SourceText, Statement};
