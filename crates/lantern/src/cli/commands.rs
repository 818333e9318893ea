//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use lantern::{JobPriority, TaskCategory};
use std::path::PathBuf;

/// Lantern - talk to self-hosted inference servers and run jobs against them
#[derive(Parser, Debug)]
#[command(name = "lantern")]
#[command(about = "Talk to self-hosted inference servers and run jobs against them", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to layered lookup)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named server configuration (defaults to `default_server`)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe every active server
    Health,

    /// List models
    Models {
        /// Show registered logical models instead of what the server has loaded
        #[arg(long)]
        registered: bool,
    },

    /// Pull a model onto the server
    Pull {
        /// Model identifier or registered name
        model: String,

        /// Skip the pull when the model is already loaded
        #[arg(long)]
        if_missing: bool,
    },

    /// Generate text from a prompt
    Generate {
        /// Prompt text
        prompt: String,

        /// Model identifier or registered name (selected automatically if omitted)
        #[arg(long)]
        model: Option<String>,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// Print tokens as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Send one chat turn
    Chat {
        /// User message
        message: String,

        /// Model identifier or registered name (selected automatically if omitted)
        #[arg(long)]
        model: Option<String>,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// Print tokens as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Embed text
    Embed {
        /// Text to embed
        text: String,

        /// Model identifier or registered name (selected automatically if omitted)
        #[arg(long)]
        model: Option<String>,
    },

    /// Run a job through the queue and wait for it
    Submit {
        /// Prompt text
        prompt: String,

        /// Task category routing the job
        #[arg(long, value_parser = parse_category)]
        task: TaskCategory,

        /// Draining priority
        #[arg(long, value_enum, default_value = "normal")]
        priority: PriorityArg,

        /// System prompt overriding the model default
        #[arg(long)]
        system: Option<String>,

        /// Job name
        #[arg(long)]
        name: Option<String>,

        /// Submitter identity recorded in usage
        #[arg(long, default_value = "cli")]
        submitted_by: String,
    },
}

/// Job priority as a CLI value.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PriorityArg {
    /// Drained last
    Low,
    /// Default
    Normal,
    /// Ahead of normal work
    High,
    /// Drained first
    Urgent,
}

impl From<PriorityArg> for JobPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => JobPriority::Low,
            PriorityArg::Normal => JobPriority::Normal,
            PriorityArg::High => JobPriority::High,
            PriorityArg::Urgent => JobPriority::Urgent,
        }
    }
}

fn parse_category(value: &str) -> Result<TaskCategory, String> {
    value.parse().map_err(|_| {
        format!(
            "unknown task category '{}' (expected one of: text-generation, chat, embedding, \
             summarization, classification, translation, extraction)",
            value
        )
    })
}
