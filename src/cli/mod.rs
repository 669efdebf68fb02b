//! CLI module for keyrouterd
//!
//! Command-line interface definitions and handlers for the LLM provider
//! key-routing core.
//!
//! # Commands
//!
//! - `serve` - Start the router server
//! - `key` - Manage provider API keys (register, list, rotate, revoke)
//! - `policy` - Manage routing policies (create, list, delete)
//! - `budget` - Manage spend budgets (create, list, delete)
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start server with default config
//! keyrouterd serve
//!
//! # List registered keys
//! keyrouterd key list --provider-id openai
//!
//! # Generate shell completions
//! keyrouterd completions bash > ~/.bash_completion.d/keyrouterd
//! ```

pub mod budget;
pub mod completions;
pub mod config;
pub mod key;
pub mod output;
pub mod policy;
pub mod serve;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// keyrouterd - LLM provider key-routing core
#[derive(Parser, Debug)]
#[command(
    name = "keyrouterd",
    version,
    about = "Routes LLM provider requests across API keys by cost, quota, and policy"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the router server
    Serve(ServeArgs),
    /// Manage provider API keys
    #[command(subcommand)]
    Key(KeyCommands),
    /// Manage routing policies
    #[command(subcommand)]
    Policy(PolicyCommands),
    /// Manage spend budgets
    #[command(subcommand)]
    Budget(BudgetCommands),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "KEYROUTER_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "KEYROUTER_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "KEYROUTER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Register a new provider key
    Register(KeyRegisterArgs),
    /// List registered keys
    List(KeyListArgs),
    /// Rotate a key's material
    Rotate(KeyRotateArgs),
    /// Revoke a key
    Revoke(KeyRevokeArgs),
}

#[derive(Args, Debug)]
pub struct KeyRegisterArgs {
    /// Raw key material (never logged, encrypted at rest)
    pub material: String,

    /// Provider this key authenticates against
    #[arg(short, long)]
    pub provider_id: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct KeyListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Filter by provider id
    #[arg(short, long)]
    pub provider_id: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct KeyRotateArgs {
    /// Key id to rotate
    pub id: String,

    /// New key material
    pub material: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct KeyRevokeArgs {
    /// Key id to revoke
    pub id: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommands {
    /// Create a policy
    Create(PolicyCreateArgs),
    /// List policies
    List(PolicyListArgs),
    /// Delete a policy
    Delete(PolicyDeleteArgs),
}

#[derive(Args, Debug)]
pub struct PolicyCreateArgs {
    /// Policy name
    pub name: String,

    /// Policy type (routing, key_selection, cost_control)
    #[arg(short = 't', long)]
    pub policy_type: String,

    /// Policy scope (global, provider, team)
    #[arg(short, long, default_value = "global")]
    pub scope: String,

    /// Scope id, required unless scope is global
    #[arg(long)]
    pub scope_id: Option<String>,

    /// Evaluation priority (higher wins ties first)
    #[arg(long, default_value = "0")]
    pub priority: i32,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct PolicyListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct PolicyDeleteArgs {
    /// Policy id to delete
    pub id: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum BudgetCommands {
    /// Create a budget
    Create(BudgetCreateArgs),
    /// List budgets
    List(BudgetListArgs),
    /// Delete a budget
    Delete(BudgetDeleteArgs),
}

#[derive(Args, Debug)]
pub struct BudgetCreateArgs {
    /// Spend limit
    pub limit: String,

    /// Budget scope (global, per_provider, per_key, per_team)
    #[arg(short, long, default_value = "global")]
    pub scope: String,

    /// Scope id, required unless scope is global
    #[arg(long)]
    pub scope_id: Option<String>,

    /// Period (hourly, daily, monthly, custom)
    #[arg(long, default_value = "monthly")]
    pub period: String,

    /// Enforcement mode (hard, soft, advisory)
    #[arg(long, default_value = "hard")]
    pub enforcement_mode: String,

    /// Currency code
    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct BudgetListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct BudgetDeleteArgs {
    /// Budget id to delete
    pub id: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "keyrouter.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
