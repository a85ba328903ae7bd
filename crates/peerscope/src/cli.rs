//! Clap derive structures for the `peerscope` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// peerscope -- query routers the way a looking glass does
#[derive(Debug, Parser)]
#[command(
    name = "peerscope",
    version,
    about = "Run BGP, ping and traceroute queries against network devices",
    long_about = "A looking-glass gateway for the command line.\n\n\
        Queries are checked against each directive's permit/deny rules,\n\
        turned into vendor commands, run over SSH or signed HTTP, and\n\
        returned as raw text or as normalized route and hop tables.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PEERSCOPE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PEERSCOPE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a query against a device
    #[command(alias = "q")]
    Query(QueryArgs),

    /// Check a query and print the commands it would send, without connecting
    #[command(alias = "plan")]
    Validate(QueryArgs),

    /// Inspect the device inventory
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Inspect available directives
    Directives(DirectivesArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Store or remove secrets in the system keyring
    Credentials(CredentialsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Query ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Device name from the inventory
    pub device: String,

    /// Directive id or query type (bgp_route, bgp_aspath, bgp_community, ping, traceroute)
    pub directive: String,

    /// One or more targets (prefix, address, AS path regex, community)
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,

    /// Routing instance
    #[arg(long)]
    pub vrf: Option<String>,

    /// Return the device's text output instead of a parsed table
    #[arg(long)]
    pub raw: bool,
}

// ── Inventory ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List configured devices
    #[command(alias = "ls")]
    List,

    /// Show one device and what it can run
    Get {
        /// Device name
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct DirectivesArgs {
    #[command(subcommand)]
    pub command: DirectivesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DirectivesCommand {
    /// List directives, optionally only those a device can run
    #[command(alias = "ls")]
    List {
        /// Only directives available on this device
        #[arg(long, short = 'd')]
        device: Option<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the loaded configuration with secrets redacted
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load the config and resolve every credential
    Check,
}

// ── Credentials ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub command: CredentialsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    /// Store a secret in the system keyring
    Set {
        /// Credential name, or device name with --signing
        name: String,

        /// Store a device's signing secret instead of a credential password
        #[arg(long)]
        signing: bool,
    },

    /// Remove a secret from the system keyring
    Delete {
        /// Credential name, or device name with --signing
        name: String,

        /// Remove a device's signing secret instead of a credential password
        #[arg(long)]
        signing: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
