use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codeheal::cli::CommandContext;
use codeheal::cli::commands::{analyze, config, enhance, fix};

#[derive(Parser)]
#[command(name = "codeheal")]
#[command(
    version,
    about = "Quality analysis and self-repair for model-generated code"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, help = "Config file (default: ~/.config/codeheal/config.toml)")]
    config: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the five-pass pipeline over a file
    Analyze {
        #[arg(help = "Source file, or - for stdin")]
        file: String,
        #[arg(long, short, help = "Language: javascript, typescript, jsx, tsx")]
        language: Option<String>,
        #[arg(long, help = "File is one of several generated together")]
        multi_file: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
        #[arg(long, short, help = "Write the fixed code back to the file")]
        write: bool,
    },

    /// Repair a file with the local strategies
    Fix {
        #[arg(help = "Source file, or - for stdin")]
        file: String,
        #[arg(long, short, help = "Model name recorded in the result")]
        model: Option<String>,
        #[arg(long, help = "Retry budget override (0-20)")]
        max_retries: Option<u32>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
        #[arg(long, short, help = "Write the repaired code back to the file")]
        write: bool,
    },

    /// Append prevention rules to a generation prompt
    Enhance {
        #[arg(help = "Prompt text, or - for stdin")]
        prompt: String,
        #[arg(long, short, help = "Task type: build, refine, plan, debug, other")]
        task: String,
        #[arg(long = "file", help = "Target file (repeatable)")]
        files: Vec<String>,
        #[arg(long, short, help = "Target model identifier")]
        model: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mcodeheal encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = CommandContext::load(cli.config)?;

    match cli.command {
        Commands::Analyze {
            file,
            language,
            multi_file,
            format,
            write,
        } => {
            analyze::run(analyze::AnalyzeArgs {
                file: &file,
                language: language.as_deref(),
                multi_file,
                format: &format,
                write,
            })?;
        }
        Commands::Fix {
            file,
            model,
            max_retries,
            format,
            write,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(fix::run(
                &ctx,
                fix::FixArgs {
                    file: &file,
                    model: model.as_deref(),
                    max_retries,
                    format: &format,
                    write,
                },
            ))?;
        }
        Commands::Enhance {
            prompt,
            task,
            files,
            model,
            format,
        } => {
            enhance::run(
                &ctx,
                enhance::EnhanceArgs {
                    prompt: &prompt,
                    task: &task,
                    files: &files,
                    model: model.as_deref(),
                    format: &format,
                },
            )?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => config::show(&ctx, &format)?,
            ConfigAction::Path => config::path(&ctx),
        },
    }

    Ok(())
}
