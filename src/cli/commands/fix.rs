//! Fix Command
//!
//! Drives the repair loop over one file with local strategies only.
//!
//! Usage:
//!   codeheal fix <file|-> [--model gpt-4o] [--max-retries 5] [--format json] [--write]

use std::sync::Arc;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, STDIN_ARG, read_source, write_source};
use crate::config::ConfigUpdate;
use crate::repair::{NoopModel, RepairEngine};
use crate::types::Result;

pub struct FixArgs<'a> {
    pub file: &'a str,
    /// Only used for guidance lookup; no model is called
    pub model: Option<&'a str>,
    pub max_retries: Option<u32>,
    pub format: &'a str,
    pub write: bool,
}

pub async fn run(ctx: &CommandContext, args: FixArgs<'_>) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let code = read_source(args.file)?;

    let engine = RepairEngine::new(ctx.config.clone())?.with_model(Arc::new(NoopModel));
    if let Some(max_retries) = args.max_retries {
        engine.configure(ConfigUpdate::default().max_retries(max_retries))?;
    }

    let file_path = (args.file != STDIN_ARG).then_some(args.file);
    let result = engine.validate_and_fix(&code, file_path, args.model).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let out = Output::new();
            out.header(&format!("Repair session {}", result.session_id));
            println!(
                "Errors found: {}, remaining: {}",
                result.errors_found,
                result.remaining_errors.len()
            );
            if !result.attempts.is_empty() {
                out.section("Attempts");
                for attempt in &result.attempts {
                    out.attempt(attempt);
                }
            }
            if result.is_resolved() {
                out.success(&format!("Resolved in {} ms", result.duration_ms));
            } else {
                out.warning(&format!(
                    "Exhausted after {} attempts",
                    result.total_attempts
                ));
                for error in &result.remaining_errors {
                    println!("  {}", error.describe());
                }
            }
            out.statistics(&engine.get_statistics());
        }
    }

    if args.write && result.final_code != code {
        write_source(args.file, &result.final_code)?;
        if format == OutputFormat::Text {
            Output::new().success(&format!("Wrote repaired code to {}", args.file));
        }
    }

    Ok(())
}
