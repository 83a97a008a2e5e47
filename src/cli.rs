//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::models::Resource;

/// BrainQuiz API client
#[derive(Parser, Debug)]
#[command(name = "brainquiz")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "BRAINQUIZ_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, env = "BRAINQUIZ_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer token (overrides config; supports `env:VAR`)
    #[arg(long, env = "BRAINQUIZ_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "BRAINQUIZ_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "BRAINQUIZ_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub output: OutputFormat,

    /// Print dispatcher and cache statistics to stderr when done
    #[arg(long, global = true)]
    pub stats: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Commands that talk to the backend
    #[command(flatten)]
    Api(ApiCommand),

    /// Print the effective configuration
    Config,
}

/// Subcommands that need an API client
#[derive(Subcommand, Debug)]
pub enum ApiCommand {
    /// List every record of a resource
    List {
        /// Resource to list
        #[arg(value_enum)]
        resource: Resource,
    },

    /// Show one class
    Class {
        /// Class id
        id: u64,
    },

    /// List the quizzes of a class
    ClassQuizzes {
        /// Class id
        class_id: u64,
    },

    /// List the questions of a quiz
    QuizQuestions {
        /// Quiz id
        quiz_id: u64,
    },

    /// Delete a record
    Delete {
        /// Resource the record belongs to
        #[arg(value_enum)]
        resource: Resource,
        /// Record id
        id: u64,
    },

    /// Classes the current user has joined
    Joined,

    /// Join a class with its code
    Join {
        /// Join code handed out by the teacher
        code: String,
    },

    /// Leave a class
    Leave {
        /// Class id
        class_id: u64,
    },

    /// Quiz results of the current user
    Results,

    /// Browse audit logs
    Audit {
        /// Page number (1-based)
        #[arg(long)]
        page: Option<u32>,
        /// Page size
        #[arg(long)]
        limit: Option<u32>,
        /// Filter by username
        #[arg(long)]
        username: Option<String>,
        /// Filter by action
        #[arg(long)]
        action: Option<String>,
        /// Lower date bound (YYYY-MM-DD)
        #[arg(long)]
        date_from: Option<String>,
        /// Upper date bound (YYYY-MM-DD)
        #[arg(long)]
        date_to: Option<String>,
        /// Filter by client IP
        #[arg(long)]
        ip: Option<String>,
        /// Write the page as CSV to this file instead of printing it
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}
