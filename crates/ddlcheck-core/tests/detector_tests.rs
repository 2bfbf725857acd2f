// Integration tests for the schema-design detectors
use ddlcheck_core::analyzer::{self, Analyzer, DetectorGroup, DetectorId};
use ddlcheck_core::error::{DiagnosticKind, Severity};
use ddlcheck_core::schema::SchemaBuilder;
use pretty_assertions::assert_eq;

const SHOP_SCHEMA: &str = r#"
CREATE TABLE customers (
    id INT NOT NULL PRIMARY KEY,
    email VARCHAR(100) NOT NULL,
    age INT,
    UNIQUE (email)
);

CREATE TABLE orders (
    id INT NOT NULL,
    customer_id INT NOT NULL,
    status VARCHAR(10) DEFAULT 'new',
    PRIMARY KEY (id),
    FOREIGN KEY (customer_id) REFERENCES customers(id)
);
"#;

fn kinds(sql: &str) -> Vec<DiagnosticKind> {
    Analyzer::new().analyze(sql).into_iter().map(|d| d.kind).collect()
}

#[test]
fn test_clean_schema_has_no_errors() {
    let diagnostics = Analyzer::new().analyze(SHOP_SCHEMA);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert!(errors.is_empty(), "Expected no errors: {:?}", errors);
}

#[test]
fn test_every_detector_is_pure() {
    for id in DetectorId::ALL {
        let first = id.run(SHOP_SCHEMA);
        let second = id.run(SHOP_SCHEMA);
        assert_eq!(first, second, "detector {} is not idempotent", id);
    }
}

#[test]
fn test_empty_and_garbage_input() {
    for id in DetectorId::ALL {
        assert!(id.run("").is_empty(), "detector {} reported on empty input", id);
        assert!(
            id.run("this is ( not ; sql at all )))").is_empty(),
            "detector {} reported on garbage",
            id
        );
    }
}

#[test]
fn test_conflicting_column_types() {
    let sql = "CREATE TABLE a (\n  age int\n);\nCREATE TABLE b (\n  age varchar(10)\n);";
    let diagnostics = analyzer::detect_conflicting_types(sql);

    assert_eq!(diagnostics.len(), 1);
    let diag = &diagnostics[0];
    assert_eq!(diag.kind, DiagnosticKind::ConflictingColumnTypes);
    assert_eq!(diag.columns, vec!["AGE"]);
    assert_eq!(diag.labels.len(), 2);
    assert!(diag.labels[0].message.contains("'a'"));
    assert!(diag.labels[0].message.contains("line 2"));
    assert!(diag.labels[0].message.contains("int"));
    assert!(diag.labels[1].message.contains("'b'"));
    assert!(diag.labels[1].message.contains("line 5"));
    assert!(diag.labels[1].message.contains("varchar(10)"));
}

#[test]
fn test_null_primary_key() {
    let diagnostics = analyzer::detect_null_primary_keys("CREATE TABLE t (id INT PRIMARY KEY)");

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::NullablePrimaryKey);
    assert_eq!(diagnostics[0].table.as_deref(), Some("t"));
    assert_eq!(diagnostics[0].columns, vec!["ID"]);
    assert_eq!(diagnostics[0].line(), Some(1));
}

#[test]
fn test_redundant_unique_index() {
    let sql = "CREATE TABLE t (id INT NOT NULL PRIMARY KEY);\nCREATE UNIQUE INDEX ix ON t (id);";
    let diagnostics = analyzer::detect_redundant_unique_indexes(sql);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::RedundantUniqueIndex);
    assert_eq!(diagnostics[0].index.as_deref(), Some("ix"));
    assert_eq!(diagnostics[0].columns, vec!["ID"]);
}

#[test]
fn test_infinite_delete_cascade() {
    let sql = r#"
CREATE TABLE A (
    id INT NOT NULL PRIMARY KEY,
    b_id INT,
    FOREIGN KEY (b_id) REFERENCES B(id) ON DELETE CASCADE
);
CREATE TABLE B (
    id INT NOT NULL PRIMARY KEY,
    a_id INT,
    FOREIGN KEY (a_id) REFERENCES A(id) ON DELETE CASCADE
);
"#;
    let diagnostics = analyzer::detect_infinite_delete_cascade(sql);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::CascadeDeleteCycle);
    assert!(diagnostics[0].message.ends_with("A -> B -> A"));
    assert_eq!(diagnostics[0].labels.len(), 2);
}

#[test]
fn test_cascade_without_cycle() {
    let sql = "CREATE TABLE a (id INT);\nCREATE TABLE b (a_id INT REFERENCES a(id) ON DELETE CASCADE);";
    assert!(analyzer::detect_infinite_delete_cascade(sql).is_empty());
}

#[test]
fn test_unnecessary_check_constraints() {
    let single = analyzer::detect_unnecessary_check_constraints(
        "CREATE TABLE t (status VARCHAR(10) CHECK (status IN ('active')))",
    );
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].kind, DiagnosticKind::CheckSingleValueIn);

    let contradiction = analyzer::detect_unnecessary_check_constraints(
        "CREATE TABLE t (age INT CHECK (age < 10 AND age > 20))",
    );
    assert_eq!(contradiction.len(), 1);
    assert_eq!(contradiction[0].kind, DiagnosticKind::CheckContradiction);
    assert_eq!(contradiction[0].severity, Severity::Error);
}

#[test]
fn test_keywords_and_names_are_case_insensitive() {
    let upper = "CREATE TABLE t (ID INT PRIMARY KEY);\nCREATE UNIQUE INDEX ix ON t (ID);";
    let lower = "create table t (id int primary key);\ncreate unique index ix on t (id);";

    assert_eq!(kinds(upper), kinds(lower));
    assert!(kinds(lower).contains(&DiagnosticKind::NullablePrimaryKey));
    assert!(kinds(lower).contains(&DiagnosticKind::RedundantUniqueIndex));
}

#[test]
fn test_analyzer_deduplicates_and_keeps_order() {
    let sql = "CREATE TABLE t (\n  id INT PRIMARY KEY,\n  kind TEXT CHECK (kind = 'A') CHECK (kind = 'A')\n);\nCREATE INDEX ix_kind ON t (kind);";
    let analyzer = Analyzer::with_detectors([
        DetectorId::NullPrimaryKey,
        DetectorId::UnnecessaryIndexes,
        DetectorId::NullPrimaryKey,
    ]);
    assert_eq!(
        analyzer.detectors(),
        &[DetectorId::NullPrimaryKey, DetectorId::UnnecessaryIndexes]
    );

    // The constant column is reported once per CHECK; both render the same
    assert_eq!(analyzer::detect_unnecessary_indexes(sql).len(), 2);

    let kinds: Vec<_> = analyzer.analyze(sql).into_iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::NullablePrimaryKey,
            DiagnosticKind::IndexOnConstantColumn,
        ]
    );
}

#[test]
fn test_group_selection() {
    let sql = "CREATE TABLE a (\n  age int\n);\nCREATE TABLE b (\n  age varchar(10)\n);";
    let analyzer = Analyzer::with_detectors(DetectorGroup::RelationModeling.detectors());
    assert!(analyzer
        .analyze(sql)
        .iter()
        .all(|d| d.kind.detector().group() == DetectorGroup::RelationModeling));
}

#[test]
fn test_detector_ids_parse() {
    assert_eq!(
        "infinite-delete-cascade".parse::<DetectorId>(),
        Ok(DetectorId::InfiniteDeleteCascade)
    );
    assert_eq!("NULL_PRIMARY_KEY".parse::<DetectorId>(), Ok(DetectorId::NullPrimaryKey));
    assert!("no_such_detector".parse::<DetectorId>().is_err());
    assert_eq!(DetectorId::ALL.len(), 16);
}

#[test]
fn test_schema_builder_sees_detector_facts() {
    let mut builder = SchemaBuilder::new();
    builder.parse(SHOP_SCHEMA);
    let catalog = builder.build();

    assert_eq!(catalog.table_names(), vec!["customers", "orders"]);
    let orders = catalog.get_table("ORDERS").unwrap();
    assert_eq!(orders.primary_key.as_ref().unwrap().columns, vec!["ID"]);
    assert_eq!(orders.foreign_keys[0].references_table, "customers");
    assert_eq!(catalog.get_table("customers").unwrap().unique_constraints.len(), 1);
}
