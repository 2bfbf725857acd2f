//! Output formatting

use ddlcheck_core::{Diagnostic, Severity};
use miette::{IntoDiagnostic, Result};

use crate::args::OutputFormat;

const NO_ISSUES: &str = "No issues found.";

/// Output formatter for diagnostics
pub struct OutputFormatter {
    format: OutputFormat,
    file_name: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, file_name: String) -> Self {
        Self { format, file_name }
    }

    /// Print diagnostics in the configured format
    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic], source: &str) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if !diagnostics.is_empty() {
                    eprint!("{}", self.format_human(diagnostics, source, true));
                }
            }
            OutputFormat::Text => println!("{}", self.format_text(diagnostics)),
            OutputFormat::Json => println!("{}", self.format_json(diagnostics)?),
            OutputFormat::Sarif => println!("{}", self.format_sarif(diagnostics)?),
        }
        Ok(())
    }

    fn format_human(&self, diagnostics: &[Diagnostic], source: &str, color: bool) -> String {
        let mut out = String::new();
        for diag in diagnostics {
            let severity_str = match (diag.severity, color) {
                (Severity::Error, true) => "\x1b[31merror\x1b[0m",
                (Severity::Warning, true) => "\x1b[33mwarning\x1b[0m",
                (Severity::Info, true) => "\x1b[34minfo\x1b[0m",
                (Severity::Error, false) => "error",
                (Severity::Warning, false) => "warning",
                (Severity::Info, false) => "info",
            };

            // Main message
            out.push_str(&format!("{}[{}]: {}\n", severity_str, diag.code(), diag.message));

            // File location and source line with annotation
            if let Some(span) = &diag.span {
                out.push_str(&format!("  --> {}:{}:{}\n", self.file_name, span.line, span.column));

                if let Some(source_line) = get_source_line(source, span.line) {
                    let col = span.column.max(1);
                    let remaining = source_line.len().saturating_sub(col - 1);
                    out.push_str("   |\n");
                    out.push_str(&format!("{:>3} | {}\n", span.line, source_line));
                    out.push_str(&format!(
                        "   | {}{}\n",
                        " ".repeat(col - 1),
                        "^".repeat(span.length.min(remaining).max(1))
                    ));
                }
            }

            for label in &diag.labels {
                out.push_str(&format!("   = note: {}\n", label.message));
            }

            if let Some(help) = &diag.help {
                out.push_str(&format!("   = help: {}\n", help));
            }

            out.push('\n');
        }
        out
    }

    fn format_text(&self, diagnostics: &[Diagnostic]) -> String {
        let body = if diagnostics.is_empty() {
            NO_ISSUES.to_string()
        } else {
            diagnostics
                .iter()
                .map(Diagnostic::render)
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        format!("{}:\n{}\n", self.file_name, body)
    }

    fn format_json(&self, diagnostics: &[Diagnostic]) -> Result<String> {
        let output = serde_json::json!({
            "file": self.file_name,
            "diagnostics": diagnostics
        });
        serde_json::to_string_pretty(&output).into_diagnostic()
    }

    fn format_sarif(&self, diagnostics: &[Diagnostic]) -> Result<String> {
        let results: Vec<serde_json::Value> = diagnostics
            .iter()
            .map(|d| {
                let mut location = serde_json::json!({
                    "physicalLocation": {
                        "artifactLocation": {
                            "uri": self.file_name
                        }
                    }
                });
                if let Some(span) = &d.span {
                    location["physicalLocation"]["region"] = serde_json::json!({
                        "startLine": span.line,
                        "startColumn": span.column.max(1),
                    });
                }
                serde_json::json!({
                    "ruleId": d.code(),
                    "level": match d.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                        Severity::Info => "note",
                    },
                    "message": {
                        "text": d.render()
                    },
                    "locations": [location]
                })
            })
            .collect();

        let sarif = serde_json::json!({
            "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "ddlcheck",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                },
                "results": results
            }]
        });

        serde_json::to_string_pretty(&sarif).into_diagnostic()
    }
}

/// Get a specific line from source (1-indexed)
fn get_source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.checked_sub(1)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlcheck_core::Analyzer;

    const SQL: &str = "CREATE TABLE t (\n  id INT PRIMARY KEY\n);";

    fn findings() -> Vec<Diagnostic> {
        Analyzer::with_detectors([ddlcheck_core::DetectorId::NullPrimaryKey]).analyze(SQL)
    }

    fn formatter(format: OutputFormat) -> OutputFormatter {
        OutputFormatter::new(format, "schema.sql".to_string())
    }

    #[test]
    fn test_human_points_at_source_line() {
        let out = formatter(OutputFormat::Human).format_human(&findings(), SQL, false);
        assert!(out.starts_with("error[K001]: "));
        assert!(out.contains("  --> schema.sql:2:"));
        assert!(out.contains("  2 |   id INT PRIMARY KEY"));
        assert!(out.contains("   = help: "));
    }

    #[test]
    fn test_text_without_findings() {
        let out = formatter(OutputFormat::Text).format_text(&[]);
        assert_eq!(out, "schema.sql:\nNo issues found.\n");
    }

    #[test]
    fn test_text_uses_rendered_findings() {
        let diagnostics = findings();
        let out = formatter(OutputFormat::Text).format_text(&diagnostics);
        assert!(out.contains(&diagnostics[0].render()));
    }

    #[test]
    fn test_json_output() {
        let out = formatter(OutputFormat::Json).format_json(&findings()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["file"], "schema.sql");
        assert_eq!(value["diagnostics"][0]["kind"], "NullablePrimaryKey");
        assert_eq!(value["diagnostics"][0]["severity"], "error");
    }

    #[test]
    fn test_sarif_output() {
        let out = formatter(OutputFormat::Sarif).format_sarif(&findings()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let result = &value["runs"][0]["results"][0];
        assert_eq!(value["version"], "2.1.0");
        assert_eq!(result["ruleId"], "K001");
        assert_eq!(result["level"], "error");
        assert_eq!(
            result["locations"][0]["physicalLocation"]["region"]["startLine"],
            2
        );
    }
}
