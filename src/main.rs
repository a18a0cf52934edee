use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use gcal_extractor::cli::{self, OutputFormat};
use gcal_extractor::models::AppPaths;
use gcal_extractor::{DEFAULT_PORT, DEFAULT_REPORTS_DIR};

#[derive(Parser)]
#[command(name = "gcal-extractor")]
#[command(about = "Monthly consultation reports from Google Calendar", version)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a Google account
    Login,
    /// Remove stored tokens and the calendar selection
    Logout,
    /// Show connection state and selected calendars
    Status,
    /// Choose which calendars go into reports
    Calendars {
        #[command(subcommand)]
        action: CalendarsAction,
    },
    /// Generate the spreadsheet for one month
    Report {
        /// Month number (1-12)
        #[arg(long)]
        month: u32,
        /// Four digit year
        #[arg(long)]
        year: i32,
        /// Directory the .xlsx file is written to
        #[arg(long, default_value = DEFAULT_REPORTS_DIR)]
        out_dir: PathBuf,
    },
    /// Run the local HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Directory generated reports are written to
        #[arg(long, default_value = DEFAULT_REPORTS_DIR)]
        reports_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum CalendarsAction {
    /// List calendars on the account
    List,
    /// Replace the selection with these calendar ids
    Select {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show the saved selection
    Show,
    /// Clear the saved selection
    Clear,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gcal_extractor=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        match e.downcast_ref::<gcal_extractor::Error>() {
            Some(err) => eprintln!("Error: {}", err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let paths = AppPaths::from_env();

    match cli.command {
        Commands::Login => {
            cli::run_login(&paths, format).await?;
        }
        Commands::Logout => {
            cli::run_logout(&paths, format)?;
        }
        Commands::Status => {
            cli::run_status(&paths, format).await?;
        }
        Commands::Calendars { action } => match action {
            CalendarsAction::List => {
                cli::run_calendars_list(&paths, format).await?;
            }
            CalendarsAction::Select { ids } => {
                cli::run_calendars_select(&paths, &ids, format).await?;
            }
            CalendarsAction::Show => {
                cli::run_calendars_show(&paths, format)?;
            }
            CalendarsAction::Clear => {
                cli::run_calendars_clear(&paths, format)?;
            }
        },
        Commands::Report {
            month,
            year,
            out_dir,
        } => {
            cli::run_report(&paths, year, month, &out_dir, format).await?;
        }
        Commands::Serve { port, reports_dir } => {
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            gcal_extractor::server::run_server(addr, paths, reports_dir).await?;
        }
    }

    Ok(())
}
