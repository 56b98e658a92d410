use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use url::Url;

use crate::error::ScrapeError;

pub const DEFAULT_LISTING_URL: &str = "https://bidplus.gem.gov.in/all-bids";

/// Budget for every DOM/element wait.
pub const ELEMENT_TIMEOUT: Duration = Duration::from_millis(60_000);
/// Extra pause after the listing reports an update, so the re-render can finish.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const TYPING_DELAY: Duration = Duration::from_millis(25);

pub const MIN_PAGES: u32 = 1;
pub const MAX_PAGES: u32 = 50;
pub const DEFAULT_PAGES: u32 = 5;

pub const STORE_FILE: &str = "tenders.json";
pub const MATCHES_CSV: &str = "matches.csv";
pub const ALL_CSV: &str = "all.csv";

/// Settings shared by every subcommand; each flag can also come from the environment.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// WebDriver endpoint (chromedriver) used for the browser session
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:4444", global = true)]
    pub webdriver_url: String,

    /// Bid listing page to acquire from
    #[arg(long, env = "GEM_LISTING_URL", default_value = DEFAULT_LISTING_URL, global = true)]
    pub listing_url: String,

    /// Directory holding the persisted tenders.json
    #[arg(long, env = "GEM_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Directory CSV exports are written to
    #[arg(long, env = "GEM_EXPORT_DIR", default_value = "exports", global = true)]
    pub export_dir: PathBuf,

    /// Run the browser without a window
    #[arg(long, env = "GEM_HEADLESS", default_value_t = true, action = clap::ArgAction::Set, global = true)]
    pub headless: bool,

    /// Check robots.txt before opening the listing
    #[arg(long, env = "GEM_RESPECT_ROBOTS", default_value_t = false, action = clap::ArgAction::Set, global = true)]
    pub respect_robots: bool,
}

impl Settings {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn matches_csv_path(&self) -> PathBuf {
        self.export_dir.join(MATCHES_CSV)
    }

    pub fn all_csv_path(&self) -> PathBuf {
        self.export_dir.join(ALL_CSV)
    }

    /// `scheme://host[:port]` of the listing page; relative card links are resolved against it.
    pub fn site_origin(&self) -> Result<String, ScrapeError> {
        site_origin(&self.listing_url)
    }
}

pub fn site_origin(listing_url: &str) -> Result<String, ScrapeError> {
    let url = Url::parse(listing_url)?;
    let origin = url.origin().ascii_serialization();
    if origin == "null" {
        return Err(ScrapeError::Other(format!("{listing_url} has no origin")));
    }
    Ok(origin)
}

/// Clamp a requested page count into the accepted range; absent means the default.
pub fn clamp_pages(requested: Option<i64>) -> u32 {
    match requested {
        Some(n) => n.clamp(MIN_PAGES as i64, MAX_PAGES as i64) as u32,
        None => DEFAULT_PAGES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path() {
        assert_eq!(
            site_origin(DEFAULT_LISTING_URL).unwrap(),
            "https://bidplus.gem.gov.in"
        );
        assert_eq!(
            site_origin("http://localhost:8080/all-bids#page-2").unwrap(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn origin_rejects_garbage() {
        assert!(site_origin("not a url").is_err());
    }

    #[test]
    fn pages_are_clamped() {
        assert_eq!(clamp_pages(None), 5);
        assert_eq!(clamp_pages(Some(0)), 1);
        assert_eq!(clamp_pages(Some(-3)), 1);
        assert_eq!(clamp_pages(Some(12)), 12);
        assert_eq!(clamp_pages(Some(500)), 50);
    }
}
