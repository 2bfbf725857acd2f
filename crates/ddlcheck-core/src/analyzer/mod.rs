//! Schema-design analyzer
//!
//! Every detector is an independent function from DDL text to diagnostics.
//! [`DetectorId`] names them; [`Analyzer`] runs a selection and merges the
//! results.

mod columns;
mod constraints;
mod indexes;
mod keys;
mod relations;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DetectorError, Diagnostic};

pub use columns::{
    detect_conflicting_types, detect_default_value_conflicts, detect_reserved_words,
    is_reserved_word, RESERVED_WORDS,
};
pub use constraints::{
    classify_check, detect_conflicting_foreign_keys, detect_unnecessary_check_constraints,
    CheckClass,
};
pub use indexes::{
    detect_index_anomalies, detect_redundant_unique_indexes, detect_unnecessary_indexes,
};
pub use keys::{
    detect_missing_potential_keys, detect_null_primary_keys, detect_tables_without_relations,
    detect_wrong_alternate_keys, is_surrogate_key,
};
pub use relations::{
    detect_incorrect_recursive_relations, detect_infinite_delete_cascade,
    detect_overlapping_relations, detect_undefined_relations,
};

/// Collapse whitespace runs, so multi-line clauses quote on one line
pub(crate) fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Detector groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorGroup {
    ColumnModeling,
    IndexesAndConstraints,
    RelationModeling,
}

impl DetectorGroup {
    pub const ALL: [DetectorGroup; 3] = [
        DetectorGroup::ColumnModeling,
        DetectorGroup::IndexesAndConstraints,
        DetectorGroup::RelationModeling,
    ];

    /// Short name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            DetectorGroup::ColumnModeling => "columns",
            DetectorGroup::IndexesAndConstraints => "keys",
            DetectorGroup::RelationModeling => "relations",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DetectorGroup::ColumnModeling => "Column modeling",
            DetectorGroup::IndexesAndConstraints => "Indexes and constraints",
            DetectorGroup::RelationModeling => "Relation modeling",
        }
    }

    /// Detectors of this group, in catalog order
    pub fn detectors(&self) -> Vec<DetectorId> {
        DetectorId::ALL
            .into_iter()
            .filter(|id| id.group() == *self)
            .collect()
    }
}

impl fmt::Display for DetectorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorGroup {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_id(s);
        DetectorGroup::ALL
            .into_iter()
            .find(|group| {
                group.name() == wanted || normalize_id(&format!("{:?}", group)) == wanted
            })
            .ok_or_else(|| DetectorError::UnknownGroup(s.to_string()))
    }
}

/// The fixed catalog of detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorId {
    ConflictingTypes,
    DefaultValueConflict,
    ReservedWords,
    NullPrimaryKey,
    IndexAnomalies,
    RedundantUniqueIndex,
    TablesWithoutRelations,
    MissingPotentialKeys,
    UnnecessaryIndexes,
    WrongAlternateKey,
    UnnecessaryCheckConstraints,
    UnnecessaryForeignKeys,
    UndefinedRelations,
    OverlappingRelations,
    IncorrectRecursiveRelation,
    InfiniteDeleteCascade,
}

impl DetectorId {
    pub const ALL: [DetectorId; 16] = [
        DetectorId::ConflictingTypes,
        DetectorId::DefaultValueConflict,
        DetectorId::ReservedWords,
        DetectorId::NullPrimaryKey,
        DetectorId::IndexAnomalies,
        DetectorId::RedundantUniqueIndex,
        DetectorId::TablesWithoutRelations,
        DetectorId::MissingPotentialKeys,
        DetectorId::UnnecessaryIndexes,
        DetectorId::WrongAlternateKey,
        DetectorId::UnnecessaryCheckConstraints,
        DetectorId::UnnecessaryForeignKeys,
        DetectorId::UndefinedRelations,
        DetectorId::OverlappingRelations,
        DetectorId::IncorrectRecursiveRelation,
        DetectorId::InfiniteDeleteCascade,
    ];

    /// Stable identifier (snake_case)
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorId::ConflictingTypes => "conflicting_types",
            DetectorId::DefaultValueConflict => "default_value_conflict",
            DetectorId::ReservedWords => "reserved_words",
            DetectorId::NullPrimaryKey => "null_primary_key",
            DetectorId::IndexAnomalies => "index_anomalies",
            DetectorId::RedundantUniqueIndex => "redundant_unique_index",
            DetectorId::TablesWithoutRelations => "tables_without_relations",
            DetectorId::MissingPotentialKeys => "missing_potential_keys",
            DetectorId::UnnecessaryIndexes => "unnecessary_indexes",
            DetectorId::WrongAlternateKey => "wrong_alternate_key",
            DetectorId::UnnecessaryCheckConstraints => "unnecessary_check_constraints",
            DetectorId::UnnecessaryForeignKeys => "unnecessary_foreign_keys",
            DetectorId::UndefinedRelations => "undefined_relations",
            DetectorId::OverlappingRelations => "overlapping_relations",
            DetectorId::IncorrectRecursiveRelation => "incorrect_recursive_relation",
            DetectorId::InfiniteDeleteCascade => "infinite_delete_cascade",
        }
    }

    pub fn group(&self) -> DetectorGroup {
        match self {
            DetectorId::ConflictingTypes
            | DetectorId::DefaultValueConflict
            | DetectorId::ReservedWords => DetectorGroup::ColumnModeling,
            DetectorId::UndefinedRelations
            | DetectorId::OverlappingRelations
            | DetectorId::IncorrectRecursiveRelation
            | DetectorId::InfiniteDeleteCascade => DetectorGroup::RelationModeling,
            _ => DetectorGroup::IndexesAndConstraints,
        }
    }

    /// One-line description for `ddlcheck list`
    pub fn description(&self) -> &'static str {
        match self {
            DetectorId::ConflictingTypes => "Same column name declared with different types",
            DetectorId::DefaultValueConflict => "DEFAULT value that does not fit the column type",
            DetectorId::ReservedWords => "Column named with an ANSI SQL reserved word",
            DetectorId::NullPrimaryKey => "PRIMARY KEY column that allows NULL",
            DetectorId::IndexAnomalies => "Index containing the primary key or a unique key plus more",
            DetectorId::RedundantUniqueIndex => "UNIQUE INDEX duplicating the primary key",
            DetectorId::TablesWithoutRelations => "Table taking part in no foreign key",
            DetectorId::MissingPotentialKeys => "Table without PRIMARY KEY, UNIQUE or UNIQUE INDEX",
            DetectorId::UnnecessaryIndexes => "Index on a constant column or covering a key",
            DetectorId::WrongAlternateKey => "Surrogate primary key without an alternate key",
            DetectorId::UnnecessaryCheckConstraints => "CHECK that is useless, trivial or contradictory",
            DetectorId::UnnecessaryForeignKeys => "Foreign keys sharing columns with different targets",
            DetectorId::UndefinedRelations => "Same column in several tables without a foreign key",
            DetectorId::OverlappingRelations => "Two tables referencing each other",
            DetectorId::IncorrectRecursiveRelation => "Self-reference through a NOT NULL column",
            DetectorId::InfiniteDeleteCascade => "Cycle of ON DELETE CASCADE foreign keys",
        }
    }

    /// Run this detector over `sql`
    pub fn run(&self, sql: &str) -> Vec<Diagnostic> {
        let diagnostics = match self {
            DetectorId::ConflictingTypes => detect_conflicting_types(sql),
            DetectorId::DefaultValueConflict => detect_default_value_conflicts(sql),
            DetectorId::ReservedWords => detect_reserved_words(sql),
            DetectorId::NullPrimaryKey => detect_null_primary_keys(sql),
            DetectorId::IndexAnomalies => detect_index_anomalies(sql),
            DetectorId::RedundantUniqueIndex => detect_redundant_unique_indexes(sql),
            DetectorId::TablesWithoutRelations => detect_tables_without_relations(sql),
            DetectorId::MissingPotentialKeys => detect_missing_potential_keys(sql),
            DetectorId::UnnecessaryIndexes => detect_unnecessary_indexes(sql),
            DetectorId::WrongAlternateKey => detect_wrong_alternate_keys(sql),
            DetectorId::UnnecessaryCheckConstraints => detect_unnecessary_check_constraints(sql),
            DetectorId::UnnecessaryForeignKeys => detect_conflicting_foreign_keys(sql),
            DetectorId::UndefinedRelations => detect_undefined_relations(sql),
            DetectorId::OverlappingRelations => detect_overlapping_relations(sql),
            DetectorId::IncorrectRecursiveRelation => detect_incorrect_recursive_relations(sql),
            DetectorId::InfiniteDeleteCascade => detect_infinite_delete_cascade(sql),
        };
        debug!(
            detector = self.as_str(),
            findings = diagnostics.len(),
            "detector finished"
        );
        diagnostics
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorId {
    type Err = DetectorError;

    /// Accepts `null_primary_key`, `null-primary-key` or `NULL_PRIMARY_KEY`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_id(s);
        DetectorId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| DetectorError::UnknownDetector(s.to_string()))
    }
}

/// Lowercase snake_case form of an identifier: `Null-Primary-Key` and
/// `NullPrimaryKey` both become `null_primary_key`
fn normalize_id(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for ch in s.trim().chars() {
        if ch == '-' || ch == '_' || ch == ' ' {
            out.push('_');
            prev_lower = false;
        } else if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Runs a selection of detectors and merges their findings
#[derive(Debug, Clone)]
pub struct Analyzer {
    detectors: Vec<DetectorId>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Analyzer running every detector
    pub fn new() -> Self {
        Self {
            detectors: DetectorId::ALL.to_vec(),
        }
    }

    /// Analyzer running the given detectors, in the given order; repeats are dropped
    pub fn with_detectors(ids: impl IntoIterator<Item = DetectorId>) -> Self {
        let mut detectors = Vec::new();
        for id in ids {
            if !detectors.contains(&id) {
                detectors.push(id);
            }
        }
        Self { detectors }
    }

    pub fn detectors(&self) -> &[DetectorId] {
        &self.detectors
    }

    /// Run the selected detectors and return their findings.
    ///
    /// Findings with the same rendered text are reported once, at the
    /// position of their first occurrence.
    pub fn analyze(&self, sql: &str) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        let mut diagnostics = Vec::new();

        for id in &self.detectors {
            for diagnostic in id.run(sql) {
                if seen.insert(diagnostic.render()) {
                    diagnostics.push(diagnostic);
                }
            }
        }

        debug!(
            detectors = self.detectors.len(),
            findings = diagnostics.len(),
            "analysis finished"
        );
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;

    #[test]
    fn test_detector_id_parsing() {
        assert_eq!(
            "null_primary_key".parse::<DetectorId>(),
            Ok(DetectorId::NullPrimaryKey)
        );
        assert_eq!(
            "Infinite-Delete-Cascade".parse::<DetectorId>(),
            Ok(DetectorId::InfiniteDeleteCascade)
        );
        assert_eq!(
            "nope".parse::<DetectorId>(),
            Err(DetectorError::UnknownDetector("nope".to_string()))
        );
    }

    #[test]
    fn test_every_id_round_trips_through_its_name() {
        for id in DetectorId::ALL {
            assert_eq!(id.as_str().parse::<DetectorId>(), Ok(id));
        }
    }

    #[test]
    fn test_groups_partition_the_catalog() {
        let sizes: Vec<_> = DetectorGroup::ALL
            .iter()
            .map(|g| g.detectors().len())
            .collect();
        assert_eq!(sizes, vec![3, 9, 4]);
        assert_eq!("keys".parse::<DetectorGroup>(), Ok(DetectorGroup::IndexesAndConstraints));
        assert_eq!(
            "relation-modeling".parse::<DetectorGroup>(),
            Ok(DetectorGroup::RelationModeling)
        );
    }

    const MIXED_SCHEMA: &str = "CREATE TABLE a (\n  id INT PRIMARY KEY,\n  \"order\" INT,\n  select INT,\n  name VARCHAR(3) DEFAULT 'toolong',\n  qty INT DEFAULT abc CHECK (qty >= 0),\n  kind TEXT CHECK (kind = 'A'),\n  b_id INT NOT NULL,\n  parent_id INT NOT NULL,\n  FOREIGN KEY (b_id) REFERENCES b(id) ON DELETE CASCADE,\n  FOREIGN KEY (b_id) REFERENCES c(id),\n  FOREIGN KEY (parent_id) REFERENCES a(id),\n  CHECK (1=1)\n);\nCREATE TABLE b (\n  id INT NOT NULL,\n  name TEXT,\n  a_id INT,\n  PRIMARY KEY (id),\n  FOREIGN KEY (a_id) REFERENCES a(id) ON DELETE CASCADE\n);\nCREATE TABLE c (\n  code INT,\n  qty INT\n);\nCREATE INDEX ix_kind ON a (kind);\nCREATE INDEX ix_wide ON a (id, kind);\nCREATE UNIQUE INDEX ux_b ON b (id);";

    #[test]
    fn test_every_kind_belongs_to_the_group_of_its_detector() {
        let mut seen = 0;
        for id in DetectorId::ALL {
            for diagnostic in id.run(MIXED_SCHEMA) {
                assert_eq!(diagnostic.kind.detector(), id, "{}", diagnostic.render());
                assert_eq!(diagnostic.kind.detector().group(), id.group());
                seen += 1;
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn test_with_detectors_dedupes_selection() {
        let analyzer = Analyzer::with_detectors([
            DetectorId::ReservedWords,
            DetectorId::NullPrimaryKey,
            DetectorId::ReservedWords,
        ]);
        assert_eq!(
            analyzer.detectors(),
            &[DetectorId::ReservedWords, DetectorId::NullPrimaryKey]
        );
    }

    #[test]
    fn test_analyze_merges_identical_findings_at_first_position() {
        // Two identical CHECKs on one line pin the same column twice
        let sql = "CREATE TABLE t (\n  id INT NOT NULL PRIMARY KEY,\n  kind TEXT CHECK (kind = 'A') CHECK (kind = 'A')\n);\nCREATE INDEX ix_kind ON t (kind);";
        let raw = DetectorId::UnnecessaryIndexes.run(sql);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].render(), raw[1].render());

        let analyzer = Analyzer::with_detectors([
            DetectorId::UnnecessaryIndexes,
            DetectorId::TablesWithoutRelations,
        ]);
        let diagnostics = analyzer.analyze(sql);
        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::IndexOnConstantColumn,
                DiagnosticKind::TableWithoutRelations,
            ]
        );
        assert_eq!(diagnostics[0].render(), raw[0].render());
    }

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("FOREIGN KEY (a)\n    REFERENCES b(id)"), "FOREIGN KEY (a) REFERENCES b(id)");
    }
}
