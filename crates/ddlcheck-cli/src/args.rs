//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "ddlcheck")]
#[command(author, version, about = "Schema-design review for SQL DDL scripts")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Review DDL scripts for schema-design defects
    Check {
        /// DDL scripts to review (.sql or .docx, supports glob patterns)
        files: Vec<PathBuf>,

        /// Detector to run (repeatable; default: all)
        #[arg(short, long = "detector", value_name = "ID")]
        detectors: Vec<String>,

        /// Run every detector of a group: columns, keys or relations
        #[arg(short, long = "group", value_name = "GROUP")]
        groups: Vec<String>,

        /// Detector id or diagnostic code to skip (e.g., reserved_words, K005)
        #[arg(long, value_name = "ID|CODE")]
        disable: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Configuration file (default: ddlcheck.toml in this or a parent directory)
        #[arg(short, long, value_name = "FILE", env = "DDLCHECK_CONFIG")]
        config: Option<PathBuf>,
    },

    /// List the available detectors
    List,

    /// Display what the scanner recognized in a script
    Schema {
        /// DDL script
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "human", value_enum)]
        format: SchemaFormat,
    },

    /// Dump table scopes and items (for debugging)
    Scan {
        /// DDL script
        file: PathBuf,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// Plain rendered text, one block per finding
    Text,
    /// JSON output
    Json,
    /// SARIF output (for GitHub Code Scanning)
    Sarif,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum SchemaFormat {
    #[default]
    Human,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_arguments() {
        let args = Args::parse_from([
            "ddlcheck",
            "check",
            "schema.sql",
            "-d",
            "null_primary_key",
            "--group",
            "relations",
            "--disable",
            "K005",
            "-f",
            "json",
            "-vv",
        ]);
        assert_eq!(args.verbose, 2);
        let Command::Check {
            files,
            detectors,
            groups,
            disable,
            format,
            config,
        } = args.command
        else {
            panic!("expected check command");
        };
        assert_eq!(files, vec![PathBuf::from("schema.sql")]);
        assert_eq!(detectors, vec!["null_primary_key"]);
        assert_eq!(groups, vec!["relations"]);
        assert_eq!(disable, vec!["K005"]);
        assert_eq!(format, Some(OutputFormat::Json));
        assert!(config.is_none());
    }
}
