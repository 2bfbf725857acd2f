//! ddlcheck CLI - schema-design review for SQL DDL scripts

mod args;
mod config;
mod loader;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ddlcheck_core::scan::{ScopeEvent, SourceText, TableScanner};
use ddlcheck_core::schema::SchemaBuilder;
use ddlcheck_core::{DetectorGroup, Severity};
use miette::{IntoDiagnostic, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command, OutputFormat, SchemaFormat};
use crate::config::Config;
use crate::loader::load_script;
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over -v / -q
    let level = match (args.quiet, args.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    match args.command {
        Command::Check {
            files,
            detectors,
            groups,
            disable,
            format,
            config: config_path,
        } => {
            // Load configuration
            let config = if let Some(path) = config_path {
                Config::from_file(&path)?
            } else {
                Config::find_and_load()?.unwrap_or_default()
            };

            // Merge CLI args with config (CLI takes precedence)
            let config = config.merge_with_args(&files, &detectors, &groups, &disable, format);
            let analyzer = config.analyzer().into_diagnostic()?;
            let output_format = config.format.unwrap_or_default();
            debug!(detectors = ?analyzer.detectors(), "detector selection");

            let script_files = expand_patterns(&config.files)?;
            if script_files.is_empty() {
                miette::bail!(
                    "No files specified. Pass DDL scripts as arguments or configure `files` in ddlcheck.toml"
                );
            }
            if analyzer.detectors().is_empty() {
                miette::bail!("No detectors selected. Every selected detector is disabled");
            }

            let mut total_errors = 0;
            let mut total_warnings = 0;
            let mut total_infos = 0;

            for script_file in &script_files {
                info!(file = %script_file.display(), "checking");
                let content = load_script(script_file)?;
                let diagnostics: Vec<_> = analyzer
                    .analyze(&content)
                    .into_iter()
                    .filter(|d| !config.is_disabled(d))
                    .collect();

                let formatter =
                    OutputFormatter::new(output_format, script_file.display().to_string());
                formatter.print_diagnostics(&diagnostics, &content)?;

                for diag in &diagnostics {
                    match diag.severity {
                        Severity::Error => total_errors += 1,
                        Severity::Warning => total_warnings += 1,
                        Severity::Info => total_infos += 1,
                    }
                }
            }

            // Print summary
            if !args.quiet && output_format == OutputFormat::Human {
                if total_errors + total_warnings + total_infos > 0 {
                    eprintln!(
                        "Found {} error(s), {} warning(s), {} note(s) in {} file(s)",
                        total_errors,
                        total_warnings,
                        total_infos,
                        script_files.len()
                    );
                } else {
                    eprintln!("No issues found in {} file(s)", script_files.len());
                }
            }

            Ok(total_errors > 0)
        }

        Command::List => {
            for group in DetectorGroup::ALL {
                println!("{} ({})", group.title(), group.name());
                for id in group.detectors() {
                    println!("  {:<32} {}", id.as_str(), id.description());
                }
                println!();
            }
            Ok(false)
        }

        Command::Schema { file, format } => {
            let content = load_script(&file)?;
            let mut builder = SchemaBuilder::new();
            builder.parse(&content);
            let catalog = builder.build();

            if format == SchemaFormat::Json {
                println!("{}", serde_json::to_string_pretty(&catalog).into_diagnostic()?);
                return Ok(false);
            }

            println!("Schema Information:");
            println!("==================");
            for table in catalog.tables.values() {
                println!("\nTable: {} (line {})", table.name, table.line);
                for col in table.columns.values() {
                    let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
                    let mut flags = String::new();
                    if col.is_primary_key {
                        flags.push_str(" PRIMARY KEY");
                    }
                    if col.is_unique {
                        flags.push_str(" UNIQUE");
                    }
                    println!(
                        "    - {} {} {}{}",
                        col.name,
                        col.data_type.display_name(),
                        nullable,
                        flags
                    );
                }
                if let Some(pk) = &table.primary_key {
                    println!("  Primary key: ({})", pk.columns.join(", "));
                }
                for unique in &table.unique_constraints {
                    println!("  Unique: ({})", unique.columns.join(", "));
                }
                for check in &table.check_constraints {
                    println!("  Check (line {}): {}", check.line, check.expression);
                }
                for fk in &table.foreign_keys {
                    println!(
                        "  Foreign key (line {}): ({}) -> {}({}){}",
                        fk.line,
                        fk.columns.join(", "),
                        fk.references_table,
                        fk.references_columns.join(", "),
                        if fk.on_delete_cascade { " ON DELETE CASCADE" } else { "" }
                    );
                }
            }
            if !catalog.indexes.is_empty() {
                println!("\nIndexes:");
                for index in &catalog.indexes {
                    println!(
                        "  {}{} ON {} ({}) (line {})",
                        if index.unique { "UNIQUE " } else { "" },
                        index.name,
                        index.table,
                        index.columns.join(", "),
                        index.line
                    );
                }
            }

            Ok(false)
        }

        Command::Scan { file } => {
            // Dump table scopes (for debugging)
            let content = load_script(&file)?;
            let source = SourceText::new(&content);
            for event in TableScanner::new(&source).events() {
                match event {
                    ScopeEvent::Enter(table) => {
                        println!("{:>4}: enter {}", table.line, table.name);
                    }
                    ScopeEvent::Item { item, .. } => {
                        let text = item.text.split_whitespace().collect::<Vec<_>>().join(" ");
                        println!("{:>4}:   {}", item.number, text);
                    }
                    ScopeEvent::Exit { table, line } => {
                        println!("{:>4}: exit {}", line, table.name);
                    }
                }
            }
            Ok(false)
        }
    }
}

/// Expand file arguments; entries with glob metacharacters are patterns
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            let mut matched = false;
            for path in glob::glob(pattern).into_diagnostic()?.flatten() {
                files.push(path);
                matched = true;
            }
            if !matched {
                tracing::warn!(pattern = %pattern, "pattern matched no files");
            }
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    Ok(files)
}
