//! Command-line interface definition and argument parsing
//!
//! This module uses clap to define and parse command-line arguments.

use crate::llm::ModelVariant;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// Command-line arguments for deskchat
#[derive(Parser, Debug)]
#[command(
    name = "deskchat",
    about = "Terminal chat client for the DeepSeek API",
    version,
    long_about = "deskchat keeps every conversation in an append-only log, replays a bounded \
window of prior turns as context, and tracks token usage and estimated cost."
)]
pub struct Cli {
    /// Send a single prompt and exit instead of starting the interactive loop
    pub prompt: Option<String>,

    /// Path to the settings file (default: ./config.json, else the platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the conversation logs
    #[arg(long, default_value = "log")]
    pub log_dir: PathBuf,

    /// Model variant to use (chat, reasoner)
    #[arg(long, value_parser = parse_model_variant)]
    pub model: Option<ModelVariant>,
}

/// Parse a model variant argument
fn parse_model_variant(s: &str) -> Result<ModelVariant, String> {
    ModelVariant::from_str(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_flag_parsing() {
        let cli = Cli::parse_from(["deskchat", "--model", "reasoner"]);
        assert_eq!(cli.model, Some(ModelVariant::Reasoner));

        let cli = Cli::parse_from(["deskchat", "hello there"]);
        assert_eq!(cli.prompt.as_deref(), Some("hello there"));
        assert_eq!(cli.log_dir, PathBuf::from("log"));
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        assert!(Cli::try_parse_from(["deskchat", "--model", "gpt-4o"]).is_err());
    }
}
