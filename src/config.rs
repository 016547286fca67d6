use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::{Confirm, Input};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use crate::bench::config::{
    RunConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_ENDPOINT_URL, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, DEFAULT_TIMEOUT_SECS,
};

/// Moth-Bench - end-to-end latency benchmark for chat-completion endpoints
#[derive(Parser, Debug)]
#[command(name = "moth-bench", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the benchmark against an OpenAI-compatible endpoint
    Run {
        /// Base URL of the API, e.g. http://127.0.0.1:8081/v1
        #[arg(short = 'u', long, env = "ENDPOINT_URL")]
        endpoint_url: Option<String>,

        #[command(flatten)]
        request: RequestArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Start the built-in mock endpoint and benchmark it
    Standalone {
        /// Mock processing time per request in milliseconds
        #[arg(long, default_value = "250")]
        latency_ms: u64,

        /// Random extra latency per request in milliseconds
        #[arg(long, default_value = "250")]
        jitter_ms: u64,

        /// Mock error rate (0.0 to 1.0)
        #[arg(long, default_value = "0.0")]
        error_rate: f64,

        #[command(flatten)]
        request: RequestArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Re-render a scorecard from a saved run summary
    Export {
        /// Summary JSON written by `--save-summary`
        #[arg(short = 's', long)]
        summary: PathBuf,

        /// Reference benchmarks file
        #[arg(short = 'r', long, env = "REFERENCE_FILE")]
        references: Option<String>,

        /// Scorecard output path
        #[arg(short = 'o', long, default_value = "moth-bench-scorecard.html")]
        output: PathBuf,
    },
}

/// Request settings shared by `run` and `standalone`
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Model name sent with each request
    #[arg(short = 'm', long, env = "MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Completion token budget per request
    #[arg(long, env = "MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// System prompt (empty to send none)
    #[arg(long, env = "SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Per-request timeout in seconds
    #[arg(short = 't', long, env = "REQUEST_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, env = "CONNECT_TIMEOUT", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,
}

impl RequestArgs {
    /// Snapshot these settings into a run configuration for `endpoint_url`
    pub fn to_run_config(&self, endpoint_url: &str) -> RunConfig {
        RunConfig {
            endpoint_url: endpoint_url.to_string(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt.clone(),
            timeout_secs: self.timeout,
            connect_timeout_secs: self.connect_timeout,
        }
    }
}

/// Where results go once a run ends
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Reference benchmarks file (defaults to benchmarks.json lookup)
    #[arg(short = 'r', long, env = "REFERENCE_FILE")]
    pub references: Option<String>,

    /// Scorecard output path
    #[arg(short = 'o', long, default_value = "moth-bench-scorecard.html")]
    pub output: PathBuf,

    /// Skip writing the HTML scorecard
    #[arg(long)]
    pub no_export: bool,

    /// Also save the run summary as JSON for later re-export
    #[arg(long)]
    pub save_summary: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl CliArgs {
    /// Load configuration from all sources with priority: CLI > ENV > .env > defaults
    pub fn load() -> Self {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        CliArgs::parse()
    }
}

// === Interactive Setup ===

/// Interactive setup is needed when no endpoint was given and a person is at the terminal
pub fn needs_interactive_setup(endpoint_url: Option<&str>) -> bool {
    endpoint_url.map_or(true, |url| url.trim().is_empty()) && std::io::stdin().is_terminal()
}

/// Ask for the endpoint URL, optionally persisting it to `.env`
pub fn run_interactive_setup() -> Result<String> {
    println!();
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║              Moth-Bench - First Time Setup                ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("No endpoint configured. Let's point the benchmark at one.");
    println!();

    let endpoint_url: String = Input::new()
        .with_prompt("Chat-completion API base URL (ENDPOINT_URL)")
        .default(DEFAULT_ENDPOINT_URL.to_string())
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            RunConfig::for_endpoint(input.as_str())
                .validate()
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .context("Failed to read ENDPOINT_URL")?;

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save endpoint to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&endpoint_url)?;
        println!();
        println!("✅ Configuration saved to .env file");
    }
    println!();

    Ok(endpoint_url)
}

fn env_file_content(endpoint_url: &str) -> String {
    format!(
        r#"# Moth-Bench Configuration
# Generated by interactive setup

# Base URL of the OpenAI-compatible API (required)
ENDPOINT_URL={}

# Request settings
MAX_TOKENS={}
REQUEST_TIMEOUT={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        endpoint_url, DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT_SECS,
    )
}

/// Save configuration to .env file
fn save_env_file(endpoint_url: &str) -> Result<()> {
    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_file_content(endpoint_url).as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
