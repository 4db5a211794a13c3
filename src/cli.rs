use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "patro",
    version,
    about = "Sync the Bikram Sambat calendar and look up BS/AD dates"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch missing BS years (or all of them with --force) and rebuild the index.
    Sync(SyncArgs),
    /// Show the day record for today in Nepal.
    Today {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// List every day of one BS month.
    Month {
        #[arg(long)]
        year: i32,
        /// Month name, spelling variant or 1-12.
        #[arg(long)]
        month: String,
    },
    /// Convert a date between AD and BS.
    Convert {
        #[arg(long, value_name = "YYYY-MM-DD", conflicts_with = "bs", required_unless_present = "bs")]
        ad: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD")]
        bs: Option<String>,
    },
    /// Next days that carry events.
    Upcoming {
        #[arg(long, value_name = "YYYY-MM-DD")]
        from: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Paths, configuration and per-year storage health.
    Status,
}

#[derive(Debug, Args)]
struct SyncArgs {
    #[arg(long)]
    start_year: Option<i32>,
    #[arg(long)]
    end_year: Option<i32>,
    /// Re-fetch years that already have a file.
    #[arg(long)]
    force: bool,
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let status = if report.ok { "ok" } else { "issues" };
    println!("{}: {status}", report.command);
    for line in &report.details {
        println!("  {line}");
    }
    if !report.issues.is_empty() {
        println!("issues:");
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }
    Ok(())
}

/// Returns whether the command finished without issues.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let report = match cli.command {
        Command::Sync(args) => commands::sync::run(&commands::sync::SyncOptions {
            start_year: args.start_year,
            end_year: args.end_year,
            force: args.force,
            live: !cli.json,
        })?,
        Command::Today { date } => commands::today::run(&commands::today::TodayOptions { date })?,
        Command::Month { year, month } => {
            commands::month::run(&commands::month::MonthOptions { year, month })?
        }
        Command::Convert { ad, bs } => {
            commands::convert::run(&commands::convert::ConvertOptions { ad, bs })?
        }
        Command::Upcoming { from, limit } => {
            commands::upcoming::run(&commands::upcoming::UpcomingOptions { from, limit })?
        }
        Command::Status => commands::status::run()?,
    };

    render(&report, cli.json)?;
    Ok(report.ok)
}
