//! Recognized schema facts
//!
//! A single scan that gathers everything the pattern scanner understood. The
//! detectors do not use it; it exists so reviewers can see what was picked up.

mod builder;
mod catalog;

pub use builder::SchemaBuilder;
pub use catalog::{
    Catalog, CheckConstraintDef, ColumnDef, DefaultValue, ForeignKeyDef, ForeignKeySource,
    IndexDef, PrimaryKeyDef, TableDef, UniqueConstraintDef,
};
