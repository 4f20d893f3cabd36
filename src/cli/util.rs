//! CLI Common Utilities
//!
//! Shared input/output and context handling for command handlers.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{ConfigLoader, HealConfig};
use crate::types::{HealError, Result};

/// Argument meaning "read from stdin"
pub const STDIN_ARG: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = HealError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(HealError::invalid_input(format!(
                "Invalid format '{}'. Valid values: text, json",
                other
            ))),
        }
    }
}

/// Command execution context
///
/// Resolved once in `main` and handed to every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Effective configuration (defaults, file, environment)
    pub config: HealConfig,
    /// Explicit `--config` path, if any
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self {
            config,
            config_path,
        })
    }
}

/// Read a source file, or stdin for `-`
pub fn read_source(arg: &str) -> Result<String> {
    if arg == STDIN_ARG {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    let path = Path::new(arg);
    if !path.is_file() {
        return Err(HealError::invalid_input(format!(
            "File not found: {}",
            path.display()
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Overwrite `arg` with `content`; refuses stdin input
pub fn write_source(arg: &str, content: &str) -> Result<()> {
    if arg == STDIN_ARG {
        return Err(HealError::invalid_input(
            "--write needs a file argument, not stdin",
        ));
    }
    std::fs::write(arg, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_read_and_write_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.js");
        let arg = path.to_string_lossy().to_string();

        assert!(read_source(&arg).is_err());
        write_source(&arg, "let a = 1;").unwrap();
        assert_eq!(read_source(&arg).unwrap(), "let a = 1;");
        assert!(write_source(STDIN_ARG, "x").is_err());
    }
}
