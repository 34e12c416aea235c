use anyhow::Context;
use clap::Parser;
use nodestats::cli::{Cli, Command, ViewArgs};
use nodestats::error::exit_code;
use nodestats::logging::{self, LogTarget};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(err) = e.downcast_ref::<nodestats::Error>() {
                ExitCode::from(err.exit_code() as u8)
            } else {
                ExitCode::from(exit_code::GENERAL_ERROR as u8)
            }
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Validate CLI arguments
    cli.validate()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Invalid arguments")?;

    // The dashboard owns the terminal, so it only logs to a file
    let interactive = matches!(cli.command, None | Some(Command::View(_)));
    let target = match (&cli.log_file, interactive) {
        (Some(path), _) => LogTarget::File(path.as_path()),
        (None, true) => LogTarget::Disabled,
        (None, false) => LogTarget::Stderr,
    };
    logging::init(&cli.log_level, target)?;

    match cli.command {
        Some(Command::View(args)) => {
            nodestats::commands::view::run(&args)?;
        }
        Some(Command::Snapshot {
            file,
            length,
            start,
            sort,
            desc,
            filter,
            json,
            csv,
        }) => {
            nodestats::commands::snapshot::run(&file, length, start, &sort, desc, filter, json, csv)?;
        }
        Some(Command::Simulate {
            file,
            nodes,
            interval,
            duration,
            backfill,
        }) => {
            nodestats::commands::simulate::run(&file, nodes, interval, duration, backfill)?;
        }
        Some(Command::Completions { shell }) => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "nodestats", &mut std::io::stdout());
        }
        None => {
            nodestats::commands::view::run(&ViewArgs::default())?;
        }
    }

    Ok(())
}
