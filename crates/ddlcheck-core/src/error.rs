//! Error and diagnostic types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analyzer::DetectorId;

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from start of source
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl Span {
    /// Create a span with byte offset only
    pub fn new(offset: usize, length: usize) -> Self {
        Self {
            offset,
            length,
            line: 0,
            column: 0,
        }
    }

    /// Create a span with line and column information
    pub fn with_location(line: usize, column: usize, length: usize) -> Self {
        Self {
            offset: 0,
            length,
            line,
            column,
        }
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A schema-design finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    /// Remediation suggestion
    pub help: Option<String>,
    pub labels: Vec<Label>,
    /// Table the finding is about, as written in the script
    pub table: Option<String>,
    /// Columns involved, uppercased
    pub columns: Vec<String>,
    /// Index the finding is about, if any
    pub index: Option<String>,
}

/// Label for source annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    fn with_severity(kind: DiagnosticKind, severity: Severity, message: String) -> Self {
        Self {
            kind,
            severity,
            message,
            span: None,
            help: None,
            labels: Vec::new(),
            table: None,
            columns: Vec::new(),
            index: None,
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Error, message.into())
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Warning, message.into())
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::with_severity(kind, Severity::Info, message.into())
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_label(mut self, message: impl Into<String>, span: Span) -> Self {
        self.labels.push(Label {
            message: message.into(),
            span,
        });
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Get the diagnostic code string (e.g., "K001")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Line of the primary span, if known
    pub fn line(&self) -> Option<usize> {
        self.span.map(|s| s.line)
    }

    /// Render the finding as the text shown to a reviewer.
    ///
    /// Two findings with the same rendering are considered duplicates.
    pub fn render(&self) -> String {
        let mut out = format!("[{}] {}", self.code(), self.message);
        for label in &self.labels {
            out.push_str("\n - ");
            out.push_str(&label.message);
        }
        if let Some(help) = &self.help {
            out.push_str("\nRecommendation: ");
            out.push_str(help);
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Types of diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// C001: Same column name declared with different types
    ConflictingColumnTypes,
    /// C002: Text column default without quotes
    UnquotedTextDefault,
    /// C003: Text column default longer than the declared size
    TextDefaultTooLong,
    /// C004: Numeric column default that is not a number
    NonNumericDefault,
    /// C005: Column named with an ANSI SQL reserved word
    ReservedWordColumn,
    /// K001: PRIMARY KEY column without NOT NULL
    NullablePrimaryKey,
    /// K002: Index is a strict superset of the primary key
    IndexCoversPrimaryKey,
    /// K003: Non-unique index is a strict superset of a UNIQUE constraint
    IndexCoversUniqueKey,
    /// K004: UNIQUE INDEX duplicates the primary key
    RedundantUniqueIndex,
    /// K005: Table takes part in no foreign key
    TableWithoutRelations,
    /// K006: Table has no PRIMARY KEY, UNIQUE constraint or UNIQUE INDEX
    MissingPotentialKey,
    /// K007: Index on a column pinned to one value by CHECK
    IndexOnConstantColumn,
    /// K008: Index is a strict superset of the primary key or a unique index
    IndexSupersetOfKey,
    /// K009: Surrogate primary key without an alternate key
    MissingAlternateKey,
    /// K010: CHECK with a single-value IN list
    CheckSingleValueIn,
    /// K011: CHECK of the form `col >= 0`
    CheckNonRestrictive,
    /// K012: CHECK that is always true
    CheckTautology,
    /// K013: CHECK that is always false
    CheckContradiction,
    /// K014: Foreign keys sharing columns but pointing at different targets
    ConflictingForeignKeys,
    /// R001: Same column in several tables without a declared relation
    UndefinedRelation,
    /// R002: Two tables referencing each other
    OverlappingRelations,
    /// R003: Self-referencing column declared NOT NULL
    NonNullableSelfReference,
    /// R004: Cycle of ON DELETE CASCADE foreign keys
    CascadeDeleteCycle,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::ConflictingColumnTypes => "C001",
            DiagnosticKind::UnquotedTextDefault => "C002",
            DiagnosticKind::TextDefaultTooLong => "C003",
            DiagnosticKind::NonNumericDefault => "C004",
            DiagnosticKind::ReservedWordColumn => "C005",
            DiagnosticKind::NullablePrimaryKey => "K001",
            DiagnosticKind::IndexCoversPrimaryKey => "K002",
            DiagnosticKind::IndexCoversUniqueKey => "K003",
            DiagnosticKind::RedundantUniqueIndex => "K004",
            DiagnosticKind::TableWithoutRelations => "K005",
            DiagnosticKind::MissingPotentialKey => "K006",
            DiagnosticKind::IndexOnConstantColumn => "K007",
            DiagnosticKind::IndexSupersetOfKey => "K008",
            DiagnosticKind::MissingAlternateKey => "K009",
            DiagnosticKind::CheckSingleValueIn => "K010",
            DiagnosticKind::CheckNonRestrictive => "K011",
            DiagnosticKind::CheckTautology => "K012",
            DiagnosticKind::CheckContradiction => "K013",
            DiagnosticKind::ConflictingForeignKeys => "K014",
            DiagnosticKind::UndefinedRelation => "R001",
            DiagnosticKind::OverlappingRelations => "R002",
            DiagnosticKind::NonNullableSelfReference => "R003",
            DiagnosticKind::CascadeDeleteCycle => "R004",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::ConflictingColumnTypes => "conflicting-column-types",
            DiagnosticKind::UnquotedTextDefault => "unquoted-text-default",
            DiagnosticKind::TextDefaultTooLong => "text-default-too-long",
            DiagnosticKind::NonNumericDefault => "non-numeric-default",
            DiagnosticKind::ReservedWordColumn => "reserved-word-column",
            DiagnosticKind::NullablePrimaryKey => "nullable-primary-key",
            DiagnosticKind::IndexCoversPrimaryKey => "index-covers-primary-key",
            DiagnosticKind::IndexCoversUniqueKey => "index-covers-unique-key",
            DiagnosticKind::RedundantUniqueIndex => "redundant-unique-index",
            DiagnosticKind::TableWithoutRelations => "table-without-relations",
            DiagnosticKind::MissingPotentialKey => "missing-potential-key",
            DiagnosticKind::IndexOnConstantColumn => "index-on-constant-column",
            DiagnosticKind::IndexSupersetOfKey => "index-superset-of-key",
            DiagnosticKind::MissingAlternateKey => "missing-alternate-key",
            DiagnosticKind::CheckSingleValueIn => "check-single-value-in",
            DiagnosticKind::CheckNonRestrictive => "check-non-restrictive",
            DiagnosticKind::CheckTautology => "check-tautology",
            DiagnosticKind::CheckContradiction => "check-contradiction",
            DiagnosticKind::ConflictingForeignKeys => "conflicting-foreign-keys",
            DiagnosticKind::UndefinedRelation => "undefined-relation",
            DiagnosticKind::OverlappingRelations => "overlapping-relations",
            DiagnosticKind::NonNullableSelfReference => "non-nullable-self-reference",
            DiagnosticKind::CascadeDeleteCycle => "cascade-delete-cycle",
        }
    }

    /// The detector that reports this kind of finding
    pub fn detector(&self) -> DetectorId {
        match self {
            DiagnosticKind::ConflictingColumnTypes => DetectorId::ConflictingTypes,
            DiagnosticKind::UnquotedTextDefault
            | DiagnosticKind::TextDefaultTooLong
            | DiagnosticKind::NonNumericDefault => DetectorId::DefaultValueConflict,
            DiagnosticKind::ReservedWordColumn => DetectorId::ReservedWords,
            DiagnosticKind::NullablePrimaryKey => DetectorId::NullPrimaryKey,
            DiagnosticKind::IndexCoversPrimaryKey | DiagnosticKind::IndexCoversUniqueKey => {
                DetectorId::IndexAnomalies
            }
            DiagnosticKind::RedundantUniqueIndex => DetectorId::RedundantUniqueIndex,
            DiagnosticKind::TableWithoutRelations => DetectorId::TablesWithoutRelations,
            DiagnosticKind::MissingPotentialKey => DetectorId::MissingPotentialKeys,
            DiagnosticKind::IndexOnConstantColumn | DiagnosticKind::IndexSupersetOfKey => {
                DetectorId::UnnecessaryIndexes
            }
            DiagnosticKind::MissingAlternateKey => DetectorId::WrongAlternateKey,
            DiagnosticKind::CheckSingleValueIn
            | DiagnosticKind::CheckNonRestrictive
            | DiagnosticKind::CheckTautology
            | DiagnosticKind::CheckContradiction => DetectorId::UnnecessaryCheckConstraints,
            DiagnosticKind::ConflictingForeignKeys => DetectorId::UnnecessaryForeignKeys,
            DiagnosticKind::UndefinedRelation => DetectorId::UndefinedRelations,
            DiagnosticKind::OverlappingRelations => DetectorId::OverlappingRelations,
            DiagnosticKind::NonNullableSelfReference => DetectorId::IncorrectRecursiveRelation,
            DiagnosticKind::CascadeDeleteCycle => DetectorId::InfiniteDeleteCascade,
        }
    }
}

/// Errors raised while selecting detectors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectorError {
    #[error("unknown detector '{0}'. Run `ddlcheck list` to see the available detectors")]
    UnknownDetector(String),
    #[error("unknown detector group '{0}'. Expected one of: columns, keys, relations")]
    UnknownGroup(String),
}
