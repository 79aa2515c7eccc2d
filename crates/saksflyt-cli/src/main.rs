//! Saksflyt CLI - Command-line interface for case tasks and their question graphs.

use clap::Parser;
use saksflyt_cli::commands;
use saksflyt_cli::{Cli, Command, Config, Formatter};
use saksflyt_domain::{Aktor, OppgaveKommando};
use saksflyt_store::SqliteStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> saksflyt_cli::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => PathBuf::from(path),
        None => Config::path()?,
    };
    let config = Config::load_from(&config_path)?;

    // Log to stderr so command output stays machine-readable
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| saksflyt_cli::CliError::Config(format!("Invalid log_filter: {}", e)))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    if let Command::Init = cli.command {
        return commands::execute_init(&config, &config_path, &formatter);
    }

    let mut store = SqliteStore::new(config.database_file(&config_path))?;
    let tilgang = &config.tilgang;

    match cli.command {
        Command::Init => unreachable!("handled above"),
        Command::Demo(args) => commands::execute_demo(args, &mut store, &formatter)?,
        Command::List => commands::execute_list(&store, &formatter)?,
        Command::Show(args) => commands::execute_show(args, &store, &formatter)?,
        Command::Answer(args) => commands::execute_answer(args, &mut store, &formatter)?,
        Command::Log(args) => commands::execute_log(args, &store, &formatter)?,
        Command::Label(args) => commands::execute_label(args, &mut store, &formatter)?,
        Command::Assign(args) => commands::execute_transition(
            &args.oppgave,
            OppgaveKommando::Tildel {
                saksbehandler: Aktor::new(args.actor),
            },
            &mut store,
            tilgang,
            &formatter,
        )?,
        Command::SendToControl(args) => commands::execute_transition(
            &args.oppgave,
            OppgaveKommando::SendTilKontroll,
            &mut store,
            tilgang,
            &formatter,
        )?,
        Command::AssignControl(args) => commands::execute_transition(
            &args.oppgave,
            OppgaveKommando::TildelKontroll {
                beslutter: Aktor::new(args.actor),
            },
            &mut store,
            tilgang,
            &formatter,
        )?,
        Command::Approve(args) => commands::execute_transition(
            &args.oppgave,
            OppgaveKommando::Godkjenn,
            &mut store,
            tilgang,
            &formatter,
        )?,
        Command::SendBack(args) => commands::execute_transition(
            &args.oppgave,
            OppgaveKommando::SendTilbake,
            &mut store,
            tilgang,
            &formatter,
        )?,
        Command::Withdraw(args) => commands::execute_transition(
            &args.oppgave,
            OppgaveKommando::LeggTilbake,
            &mut store,
            tilgang,
            &formatter,
        )?,
        Command::Cancel(args) => commands::execute_transition(
            &args.oppgave,
            OppgaveKommando::Avbryt {
                aarsak: args.reason,
            },
            &mut store,
            tilgang,
            &formatter,
        )?,
    }

    Ok(())
}
