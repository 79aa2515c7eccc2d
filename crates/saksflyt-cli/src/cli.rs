//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};

/// Saksflyt CLI - Work case tasks and their question graphs.
#[derive(Debug, Parser)]
#[command(name = "saksflyt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SAKSFLYT_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the configuration file and database schema
    Init,

    /// Create the example case (eligible -> age -> income) as a new oppgave
    Demo(DemoArgs),

    /// List all oppgaver
    List,

    /// Show an oppgave with its steps
    Show(OppgaveArgs),

    /// Answer a step by its key
    Answer(AnswerArgs),

    /// Assign the oppgave to a case worker
    Assign(ActorArgs),

    /// Send the finished proposal to control
    SendToControl(OppgaveArgs),

    /// Assign the oppgave to a controller
    AssignControl(ActorArgs),

    /// Approve the proposal; closes the case
    Approve(OppgaveArgs),

    /// Send the proposal back for rework
    SendBack(OppgaveArgs),

    /// Withdraw the current assignment
    Withdraw(OppgaveArgs),

    /// Cancel the oppgave
    Cancel(CancelArgs),

    /// Show the transition log
    Log(OppgaveArgs),

    /// Add or remove a label
    Label(LabelArgs),
}

/// Arguments for the demo command.
#[derive(Debug, Parser)]
pub struct DemoArgs {
    /// Person the case concerns
    #[arg(short, long, default_value = "12345678901")]
    pub person: String,
}

/// Arguments naming a single oppgave.
#[derive(Debug, Parser)]
pub struct OppgaveArgs {
    /// Oppgave ID
    pub oppgave: String,
}

/// Arguments for the answer command.
#[derive(Debug, Parser)]
pub struct AnswerArgs {
    /// Oppgave ID
    pub oppgave: String,

    /// Logical step key
    pub key: String,

    /// Value (true/false/ja/nei, integer, decimal, YYYY-MM-DD or text)
    pub value: String,

    /// Actor recorded in the provenance
    #[arg(short, long, env = "SAKSFLYT_ACTOR")]
    pub actor: String,

    /// Justification recorded in the provenance
    #[arg(short, long)]
    pub reason: String,
}

/// Arguments for assignment commands.
#[derive(Debug, Parser)]
pub struct ActorArgs {
    /// Oppgave ID
    pub oppgave: String,

    /// Actor taking the oppgave
    #[arg(short, long, env = "SAKSFLYT_ACTOR")]
    pub actor: String,
}

/// Arguments for the cancel command.
#[derive(Debug, Parser)]
pub struct CancelArgs {
    /// Oppgave ID
    pub oppgave: String,

    /// Reason code
    #[arg(short, long)]
    pub reason: String,
}

/// Arguments for the label command.
#[derive(Debug, Parser)]
pub struct LabelArgs {
    /// Oppgave ID
    pub oppgave: String,

    /// Label name
    pub label: String,

    /// Remove instead of add
    #[arg(long)]
    pub remove: bool,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}
