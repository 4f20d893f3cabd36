//! Enhance Command
//!
//! Prints a generation prompt with prevention rules appended.
//!
//! Usage:
//!   codeheal enhance <prompt|-> --task build [--file src/App.tsx ...] [--model claude]

use crate::cli::util::{CommandContext, OutputFormat, STDIN_ARG, read_source};
use crate::repair::{RepairEngine, TaskType};
use crate::types::Result;

pub struct EnhanceArgs<'a> {
    /// Prompt text, or `-` for stdin
    pub prompt: &'a str,
    pub task: &'a str,
    pub files: &'a [String],
    pub model: Option<&'a str>,
    pub format: &'a str,
}

pub fn run(ctx: &CommandContext, args: EnhanceArgs<'_>) -> Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let task: TaskType = args.task.parse()?;
    let prompt = if args.prompt == STDIN_ARG {
        read_source(args.prompt)?
    } else {
        args.prompt.to_string()
    };

    let engine = RepairEngine::new(ctx.config.clone())?;
    let enhanced = engine.enhance_pre_generation(&prompt, args.model, task, args.files);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&enhanced)?),
        OutputFormat::Text => println!("{}", enhanced.enhanced_prompt),
    }
    Ok(())
}
