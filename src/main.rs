mod acquisition;
mod config;
mod driver;
mod error;
mod export;
mod extract;
mod locator;
mod matcher;
mod model;
mod oracle;
mod page;
mod server;
mod store;
mod webdriver;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DEFAULT_PAGES, Settings, clamp_pages};
use crate::matcher::{KeywordQuery, MatchMode, match_records};
use crate::store::read_store;

#[derive(Parser)]
#[command(name = "gem-bids", about = "GeM bid listing acquisition and keyword search")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Address the HTTP API listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000", global = true)]
    bind: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Walk the listing once and replace the stored tenders
    Fetch {
        #[arg(long, default_value_t = DEFAULT_PAGES as i64)]
        pages: i64,
        #[arg(long, default_value = "")]
        keyword: String,
    },
    /// Match stored tenders against keywords and write matches.csv
    Search {
        #[arg(long)]
        include: String,
        #[arg(long, default_value = "")]
        exclude: String,
        /// ANY or ALL
        #[arg(long, default_value = "ANY")]
        mode: String,
    },
    /// Write every stored tender to all.csv
    Export,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            server::serve(settings, &cli.bind)
                .await
                .with_context(|| format!("serving on {}", cli.bind))?;
        }
        Command::Fetch { pages, keyword } => {
            let count =
                acquisition::run_acquisition(&settings, clamp_pages(Some(pages)), &keyword, None)
                    .await
                    .context("acquisition failed")?;
            println!("{count} tenders saved to {}", settings.store_path().display());
        }
        Command::Search { include, exclude, mode } => {
            let mode: MatchMode = mode.parse().unwrap_or_default();
            let query = KeywordQuery::new(&include, &exclude, mode)?;
            let records = read_store(&settings.store_path());
            let matches = match_records(&records, &query);
            let path = settings.matches_csv_path();
            export::export_matches(&path, &matches)?;
            for m in &matches {
                println!("{:>3}  {}  {}  {}", m.score, m.record.bid_number, m.record.title, m.url);
            }
            println!("{} of {} tenders matched; wrote {}", matches.len(), records.len(), path.display());
        }
        Command::Export => {
            let records = read_store(&settings.store_path());
            let path = settings.all_csv_path();
            export::export_records(&path, &records)?;
            println!("{} tenders written to {}", records.len(), path.display());
        }
    }
    Ok(())
}
