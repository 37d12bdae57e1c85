pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "lashbook",
    about = "Lashbook operator CLI",
    long_about = "Apply migrations, manage bookable slots, and inspect the studio schedule.",
    after_help = "Examples:\n  lashbook migrate\n  lashbook slots add --date 2026-03-05 \
                  --times 10:00,12:30\n  lashbook day --date 2026-03-05"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Manage the bookable slots of one day")]
    Slots {
        #[command(subcommand)]
        action: SlotsAction,
    },
    #[command(about = "Show the active appointments of one day with client contact details")]
    Day {
        #[arg(long, help = "Day to show, as YYYY-MM-DD")]
        date: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

#[derive(Debug, Subcommand)]
enum SlotsAction {
    #[command(about = "Create slots; existing ones are left untouched")]
    Add {
        #[arg(long, help = "Day of the slots, as YYYY-MM-DD")]
        date: String,
        #[arg(long, help = "Comma-separated start times, e.g. 10:00,12:30")]
        times: String,
    },
    #[command(about = "List the slots of one day and whether each is open")]
    List {
        #[arg(long, help = "Day to list, as YYYY-MM-DD")]
        date: String,
    },
    #[command(about = "Delete a slot that no appointment has ever referenced")]
    Remove {
        #[arg(long, help = "Day of the slot, as YYYY-MM-DD")]
        date: String,
        #[arg(long, help = "Start time of the slot, as HH:MM")]
        time: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Slots { action } => match action {
            SlotsAction::Add { date, times } => commands::slots::add(&date, &times),
            SlotsAction::List { date } => commands::slots::list(&date),
            SlotsAction::Remove { date, time } => commands::slots::remove(&date, &time),
        },
        Command::Day { date } => commands::day::run(&date),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
