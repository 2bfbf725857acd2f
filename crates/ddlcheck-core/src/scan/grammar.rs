//! Recognizers for the subset of DDL the detectors understand.
//!
//! Nothing here validates SQL. Each recognizer looks for one construct in a
//! piece of text and returns `None` (or nothing) when it is not there.

use regex::Captures;

use crate::scan::source::SourceText;
use crate::types::DeclaredType;

/// Optionally quoted identifier, one capture group
const NAME: &str = r#"[`"\[]?(\w+)[`"\]]?"#;
/// Optionally schema-qualified, optionally quoted identifier, one capture group
const QUALIFIED: &str = r#"(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?(\w+)[`"\]]?"#;
/// Same as `NAME` without a capture group
const NAME_NC: &str = r#"[`"\[]?\w+[`"\]]?"#;

/// Words that start a constraint clause rather than a column definition
const CONSTRAINT_STARTERS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "FOREIGN",
    "UNIQUE",
    "CHECK",
    "KEY",
    "INDEX",
    "EXCLUDE",
    "FULLTEXT",
    "SPATIAL",
];

/// Declare a function returning a lazily compiled static regex
macro_rules! pattern {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static RE: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            RE.get_or_init(|| ::regex::Regex::new(&$re).expect("valid regex literal"))
        }
    };
}
pub(crate) use pattern;

pattern!(
    create_table_re,
    format!(
        r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?(?:(?:GLOBAL|LOCAL)\s+)?(?:(?:TEMP|TEMPORARY|UNLOGGED)\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{QUALIFIED}"
    )
);
pattern!(
    alter_table_re,
    format!(r"(?i)\bALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?{QUALIFIED}")
);
pattern!(
    column_re,
    r#"^\s*([`"\[]?)(\w+)[`"\]]?\s+(\w+)(?:\s*\(\s*(\d+)(?:\s*,\s*(\d+))?\s*\))?"#
);
pattern!(not_null_re, r"(?i)\bNOT\s+NULL\b");
pattern!(primary_key_re, r"(?i)\bPRIMARY\s+KEY\b");
pattern!(unique_re, r"(?i)\bUNIQUE\b");
pattern!(
    default_re,
    r"(?i)\bDEFAULT\s+('(?:[^']|'')*'|[-+]?\d+(?:\.\d+)?|\w+)"
);
pattern!(
    references_re,
    format!(r"(?i)\bREFERENCES\s+{QUALIFIED}\s*(?:\(([^)]*)\))?")
);
pattern!(
    cascade_re,
    r"(?i)^\s*(?:ON\s+UPDATE\s+(?:CASCADE|RESTRICT|NO\s+ACTION|SET\s+NULL|SET\s+DEFAULT)\s+)?ON\s+DELETE\s+CASCADE\b"
);
pattern!(table_primary_key_re, r"(?i)\bPRIMARY\s+KEY\s*\(([^)]*)\)");
pattern!(
    table_unique_re,
    format!(r"(?i)\bUNIQUE\s*(?:(?:KEY|INDEX)\s*(?:{NAME_NC}\s*)?)?\(([^)]*)\)")
);
pattern!(
    foreign_key_re,
    format!(
        r"(?i)\bFOREIGN\s+KEY\s*(?:{NAME_NC}\s*)?\(([^)]*)\)\s*REFERENCES\s+{QUALIFIED}\s*(?:\(([^)]*)\))?"
    )
);
pattern!(check_re, r"(?i)\bCHECK\s*\(");
pattern!(constraint_name_re, format!(r"(?i)^\s*CONSTRAINT\s+{NAME}"));
pattern!(
    constant_check_re,
    r#"(?i)^\s*[`"\[]?(\w+)[`"\]]?\s*=\s*(?:'(?:[^']|'')*'|[-+]?\d+(?:\.\d+)?|TRUE|FALSE)\s*$"#
);
pattern!(
    constraint_keyword_re,
    r"(?i)\b(?:CONSTRAINT|PRIMARY\s+KEY|FOREIGN\s+KEY|UNIQUE|CHECK|REFERENCES)\b"
);
pattern!(
    create_index_re,
    format!(
        r"(?i)\bCREATE\s+(UNIQUE\s+)?(?:(?:CLUSTERED|NONCLUSTERED)\s+)?INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?{QUALIFIED}\s+ON\s+(?:ONLY\s+)?{QUALIFIED}\s*(?:USING\s+\w+\s*)?\(([^)]*)\)"
    )
);

/// Normalized comparison key for a table or column name
pub fn name_key(name: &str) -> String {
    name.to_uppercase()
}

/// `CREATE TABLE <name>` header found in a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader<'s> {
    pub name: &'s str,
    /// Byte range of the whole header within the searched text
    pub start: usize,
    pub end: usize,
}

pub fn create_table(text: &str) -> Option<TableHeader<'_>> {
    create_table_at(text, 0)
}

/// First `CREATE TABLE` header starting at or after byte `from`
pub fn create_table_at(text: &str, from: usize) -> Option<TableHeader<'_>> {
    let caps = create_table_re().captures_at(text, from)?;
    let whole = caps.get(0)?;
    Some(TableHeader {
        name: caps.get(1)?.as_str(),
        start: whole.start(),
        end: whole.end(),
    })
}

/// Name of the table an `ALTER TABLE` statement changes
pub fn alter_table(text: &str) -> Option<&str> {
    alter_table_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A recognized `<name> <type> <qualifiers>` column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSyntax<'s> {
    pub name: &'s str,
    /// Name was written in quotes, backticks or brackets
    pub quoted: bool,
    pub data_type: DeclaredType,
    /// Everything after the type
    pub rest: &'s str,
    /// Byte offset of `rest` within the recognized text
    pub rest_offset: usize,
}

impl<'s> ColumnSyntax<'s> {
    pub fn key(&self) -> String {
        name_key(self.name)
    }

    pub fn is_not_null(&self) -> bool {
        not_null_re().is_match(self.rest)
    }

    pub fn is_primary_key(&self) -> bool {
        primary_key_re().is_match(self.rest)
    }

    pub fn is_unique(&self) -> bool {
        unique_re().is_match(self.rest)
    }

    /// Raw `DEFAULT` value: a quoted string, a number or a bare word
    pub fn default_value(&self) -> Option<&'s str> {
        default_re()
            .captures(self.rest)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Inline `REFERENCES table(column)`
    pub fn reference(&self) -> Option<ForeignKeySyntax<'s>> {
        let caps = references_re().captures(self.rest)?;
        let whole = caps.get(0)?;
        Some(ForeignKeySyntax {
            columns: vec![self.key()],
            table: caps.get(1)?.as_str(),
            target_columns: caps.get(2).map(|m| split_columns(m.as_str())).unwrap_or_default(),
            on_delete_cascade: cascade_re().is_match(&self.rest[whole.end()..]),
            offset: self.rest_offset + whole.start(),
        })
    }
}

/// Recognize a column definition.
///
/// Clauses such as `CONSTRAINT ...`, `PRIMARY KEY (...)` or `UNIQUE (...)`
/// are not column definitions.
pub fn column_definition(text: &str) -> Option<ColumnSyntax<'_>> {
    let caps = column_re().captures(text)?;
    let name = caps.get(2)?.as_str();
    if is_constraint_starter(name) {
        return None;
    }
    let type_name = caps.get(3)?.as_str();
    let params = [caps.get(4), caps.get(5)]
        .into_iter()
        .flatten()
        .map(|m| m.as_str().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_default();
    let end = caps.get(0)?.end();

    Some(ColumnSyntax {
        name,
        quoted: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
        data_type: DeclaredType::new(type_name, params),
        rest: &text[end..],
        rest_offset: end,
    })
}

fn is_constraint_starter(word: &str) -> bool {
    CONSTRAINT_STARTERS
        .iter()
        .any(|kw| kw.eq_ignore_ascii_case(word))
}

/// Name given by a leading `CONSTRAINT <name>`
pub fn constraint_name(text: &str) -> Option<&str> {
    constraint_name_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The text mentions a constraint keyword anywhere
pub fn mentions_constraint(text: &str) -> bool {
    constraint_keyword_re().is_match(text)
}

/// Columns of a table-level `PRIMARY KEY (...)`
pub fn primary_key_columns(text: &str) -> Option<Vec<String>> {
    table_primary_key_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| split_columns(m.as_str()))
}

/// Column sets of every table-level `UNIQUE (...)` in the text
pub fn unique_columns(text: &str) -> Vec<Vec<String>> {
    table_unique_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| split_columns(m.as_str()))
        .filter(|cols| !cols.is_empty())
        .collect()
}

/// A foreign key, table-level or inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySyntax<'s> {
    /// Referencing columns, uppercased
    pub columns: Vec<String>,
    /// Referenced table as written
    pub table: &'s str,
    /// Referenced columns, uppercased (empty when omitted)
    pub target_columns: Vec<String>,
    pub on_delete_cascade: bool,
    /// Byte offset of the clause within the searched text
    pub offset: usize,
}

impl ForeignKeySyntax<'_> {
    pub fn table_key(&self) -> String {
        name_key(self.table)
    }
}

/// Every table-level `FOREIGN KEY (...) REFERENCES t (...)` in the text
pub fn foreign_keys(text: &str) -> Vec<ForeignKeySyntax<'_>> {
    foreign_key_re()
        .captures_iter(text)
        .filter_map(|caps| foreign_key_from(text, &caps))
        .collect()
}

fn foreign_key_from<'s>(text: &'s str, caps: &Captures<'s>) -> Option<ForeignKeySyntax<'s>> {
    let whole = caps.get(0)?;
    Some(ForeignKeySyntax {
        columns: split_columns(caps.get(1)?.as_str()),
        table: caps.get(2)?.as_str(),
        target_columns: caps.get(3).map(|m| split_columns(m.as_str())).unwrap_or_default(),
        on_delete_cascade: cascade_re().is_match(&text[whole.end()..]),
        offset: whole.start(),
    })
}

/// A referenced table found through any `REFERENCES` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSyntax<'s> {
    pub table: &'s str,
    pub columns: Vec<String>,
    pub on_delete_cascade: bool,
    pub offset: usize,
}

/// Every `REFERENCES t (...)` clause in the text, inline or table-level
pub fn references(text: &str) -> Vec<ReferenceSyntax<'_>> {
    references_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ReferenceSyntax {
                table: caps.get(1)?.as_str(),
                columns: caps.get(2).map(|m| split_columns(m.as_str())).unwrap_or_default(),
                on_delete_cascade: cascade_re().is_match(&text[whole.end()..]),
                offset: whole.start(),
            })
        })
        .collect()
}

/// A `CHECK (...)` expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSyntax<'s> {
    /// Expression between the outer parentheses, trimmed
    pub expression: &'s str,
    /// Byte offset of the `CHECK` keyword within the searched text
    pub offset: usize,
}

/// Every `CHECK (...)` in the text. The closing parenthesis is found by
/// depth counting, so nested parentheses stay inside the expression.
pub fn check_expressions(text: &str) -> Vec<CheckSyntax<'_>> {
    let mut checks = Vec::new();
    let mut pos = 0;

    while let Some(m) = check_re().find_at(text, pos) {
        let open = m.end() - 1;
        let Some(close) = matching_paren(text, open) else {
            break;
        };
        checks.push(CheckSyntax {
            expression: text[open + 1..close].trim(),
            offset: m.start(),
        });
        pos = close + 1;
    }

    checks
}

/// Column of a CHECK expression that is exactly `<col> = <literal>`
pub fn constant_column(expression: &str) -> Option<&str> {
    constant_check_re()
        .captures(expression)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Index of the `)` matching the `(` at `open`, skipping quoted text
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// A standalone `CREATE [UNIQUE] INDEX` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSyntax<'s> {
    pub name: &'s str,
    pub table: &'s str,
    pub unique: bool,
    /// Indexed columns in order, uppercased
    pub columns: Vec<String>,
    pub offset: usize,
    pub line: usize,
}

impl IndexSyntax<'_> {
    pub fn table_key(&self) -> String {
        name_key(self.table)
    }
}

/// Every index statement in the script. Index statements are not bound to a
/// table scope and may span several lines.
pub fn indexes(source: &SourceText) -> Vec<IndexSyntax<'_>> {
    let text = source.text();
    create_index_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(IndexSyntax {
                unique: caps.get(1).is_some(),
                name: caps.get(2)?.as_str(),
                table: caps.get(3)?.as_str(),
                columns: split_columns(caps.get(4)?.as_str()),
                offset: whole.start(),
                line: source.line_of(whole.start()),
            })
        })
        .collect()
}

/// A foreign key added by `ALTER TABLE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterForeignKey<'s> {
    /// Altered (child) table as written
    pub table: &'s str,
    pub line: usize,
    pub foreign_key: ForeignKeySyntax<'s>,
}

/// Foreign keys declared through `ALTER TABLE ... ADD ... FOREIGN KEY`
pub fn alter_foreign_keys(source: &SourceText) -> Vec<AlterForeignKey<'_>> {
    let mut found = Vec::new();
    for stmt in source.statements() {
        let Some(table) = alter_table(stmt.text) else {
            continue;
        };
        for foreign_key in foreign_keys(stmt.text) {
            found.push(AlterForeignKey {
                table,
                line: source.line_of(stmt.offset + foreign_key.offset),
                foreign_key,
            });
        }
    }
    found
}

/// Split a parenthesized column list into uppercased names.
///
/// Sort order, collation and prefix lengths are dropped:
/// `"Name" DESC, code(10)` becomes `["NAME", "CODE"]`.
pub fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .filter_map(|part| {
            let token = part.split_whitespace().next()?;
            let name: String = token
                .trim_start_matches(['"', '`', '['])
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            (!name.is_empty()).then(|| name_key(&name))
        })
        .collect()
}
