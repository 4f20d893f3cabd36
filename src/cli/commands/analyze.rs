//! Analyze Command
//!
//! Runs the five-pass pipeline over one file and prints the report.
//!
//! Usage:
//!   codeheal analyze <file|-> [--language tsx] [--multi-file] [--format json] [--write]

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::{OutputFormat, read_source, write_source};
use crate::pipeline::{AnalyzeOptions, QualityPipeline};
use crate::repair::language_for_path;
use crate::types::{Language, Result};

pub struct AnalyzeArgs<'a> {
    pub file: &'a str,
    pub language: Option<&'a str>,
    pub multi_file: bool,
    pub format: &'a str,
    pub write: bool,
}

pub fn run(args: AnalyzeArgs<'_>) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let code = read_source(args.file)?;

    // Explicit flag wins over the file extension
    let language = match args.language {
        Some(name) => Some(name.parse::<Language>()?),
        None => language_for_path(args.file),
    };
    let options = AnalyzeOptions {
        language,
        is_multi_file: args.multi_file,
    };

    let report = QualityPipeline::new().analyze(&code, &options);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => Output::new().report(&report),
    }

    if args.write && report.has_changes() {
        write_source(args.file, &report.fixed_code)?;
        if format == OutputFormat::Text {
            Output::new().success(&format!(
                "Wrote {} fixes to {}",
                report.total_issues_fixed,
                Path::new(args.file).display()
            ));
        }
    }

    Ok(())
}
