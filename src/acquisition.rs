//! One complete acquisition: open a session, walk the listing, persist on success.

use std::path::Path;

use robotstxt::DefaultMatcher;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::config::{Settings, clamp_pages};
use crate::driver::{ListingDriver, Progress, RunOptions};
use crate::error::ScrapeError;
use crate::page::ListingPage;
use crate::store::write_store;
use crate::webdriver::BrowserPage;

const ROBOTS_AGENT: &str = "Mozilla";

/// Run the listing against a fresh browser session and replace the store with the result.
///
/// Returns the number of records now stored. On failure the previous store is left alone.
pub async fn run_acquisition(
    settings: &Settings,
    pages: u32,
    keyword: &str,
    progress: Option<mpsc::Sender<Progress>>,
) -> Result<usize, ScrapeError> {
    let origin = settings.site_origin()?;
    if settings.respect_robots {
        ensure_robots_allow(&settings.listing_url).await?;
    }

    let opts = RunOptions {
        page_limit: clamp_pages(Some(pages as i64)),
        keyword: keyword.trim().to_string(),
    };
    let page = BrowserPage::connect(&settings.webdriver_url, settings.headless).await?;
    acquire(page, &origin, &settings.listing_url, &opts, &settings.store_path(), progress).await
}

pub async fn acquire<P: ListingPage>(
    page: P,
    origin: &str,
    listing_url: &str,
    opts: &RunOptions,
    store: &Path,
    progress: Option<mpsc::Sender<Progress>>,
) -> Result<usize, ScrapeError> {
    let mut driver = ListingDriver::new(page, origin).with_progress(progress);
    let outcome = driver.run(listing_url, opts).await;
    info!(state = ?driver.state(), records = driver.records().len(), "listing session finished");

    let (page, records) = driver.into_parts();
    if let Err(e) = page.close().await {
        warn!("closing browser session failed: {e}");
    }

    outcome?;
    write_store(store, &records)?;
    info!("saved {} tenders to {}", records.len(), store.display());
    Ok(records.len())
}

async fn ensure_robots_allow(listing_url: &str) -> Result<(), ScrapeError> {
    let url = Url::parse(listing_url)?;
    let robots_url = url.join("/robots.txt")?;
    // Unreachable robots.txt counts as "no rules".
    let robots_txt = match reqwest::get(robots_url.as_str()).await {
        Ok(rsp) => rsp.text().await.unwrap_or_default(),
        Err(e) => {
            warn!("robots.txt fetch failed: {e}");
            String::new()
        }
    };
    if robots_allow(&robots_txt, listing_url) {
        Ok(())
    } else {
        Err(ScrapeError::RobotsDisallowed(listing_url.to_string()))
    }
}

fn robots_allow(robots_txt: &str, url: &str) -> bool {
    let mut matcher = DefaultMatcher::default();
    matcher.one_agent_allowed_by_robots(robots_txt, ROBOTS_AGENT, url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::InputCandidate;
    use crate::page::fake::{FakeControl, FakePage, NextStyle, Screen, card};
    use crate::store::read_store;
    use crate::model::TenderRecord;

    const ORIGIN: &str = "https://bidplus.gem.gov.in";

    fn opts(keyword: &str) -> RunOptions {
        RunOptions { page_limit: 5, keyword: keyword.into() }
    }

    fn seeded_store(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("tenders.json");
        let old = TenderRecord { bid_number: "OLD".into(), ..Default::default() };
        write_store(&path, &[old]).unwrap();
        path
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_replaces_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = seeded_store(&tmp);
        let page = FakePage::new(vec![Screen::new(
            "",
            vec![card("GEM/2025/B/1\nA", ""), card("GEM/2025/B/2\nB", "")],
            NextStyle::None,
        )]);

        let count = acquire(page, ORIGIN, "u", &opts(""), &store, None).await.unwrap();
        assert_eq!(count, 2);
        let stored: Vec<_> = read_store(&store).into_iter().map(|r| r.bid_number).collect();
        assert_eq!(stored, vec!["GEM/2025/B/1", "GEM/2025/B/2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_result_filter_persists_empty_array() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = seeded_store(&tmp);
        let mut page = FakePage::new(vec![
            Screen::new("", vec![card("GEM/2025/B/1", "")], NextStyle::None),
            Screen::new("", vec![], NextStyle::None),
        ]);
        page.inputs = vec![InputCandidate { control: FakeControl::Input(0), id: String::new(), visible: true, y: Some(1.0) }];
        page.search_screen = 1;

        let count = acquire(page, ORIGIN, "u", &opts("no such thing"), &store, None).await.unwrap();
        assert_eq!(count, 0);
        assert_eq!(std::fs::read_to_string(&store).unwrap().trim(), "[]");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_leaves_store_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = seeded_store(&tmp);
        let page = FakePage::new(vec![Screen::new("", vec![], NextStyle::None)]);

        let err = acquire(page, ORIGIN, "u", &opts(""), &store, None).await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert_eq!(read_store(&store)[0].bid_number, "OLD");
    }

    #[tokio::test(start_paused = true)]
    async fn browser_lost_after_search_keeps_previous_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = seeded_store(&tmp);
        let mut page = FakePage::new(vec![
            Screen::new("", vec![card("GEM/2025/B/1", "")], NextStyle::None),
            Screen::new("", vec![card("GEM/2025/B/2", "")], NextStyle::None),
        ]);
        page.inputs = vec![InputCandidate { control: FakeControl::Input(0), id: String::new(), visible: true, y: Some(1.0) }];
        page.search_screen = 1;
        // initial load, before-search, and the poll that sees the results succeed
        page.snapshots_fail_after = Some(3);

        let err = acquire(page, ORIGIN, "u", &opts("road"), &store, None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout { .. }));
        assert_eq!(read_store(&store)[0].bid_number, "OLD");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_keyword_input_fails_the_run() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = seeded_store(&tmp);
        let page = FakePage::new(vec![Screen::new("", vec![card("x", "")], NextStyle::None)]);

        let err = acquire(page, ORIGIN, "u", &opts("road"), &store, None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::KeywordInputNotFound));
        assert_eq!(read_store(&store).len(), 1);
    }

    #[test]
    fn robots_rules() {
        let rules = "User-agent: *\nDisallow: /private/\n";
        assert!(robots_allow(rules, "https://bidplus.gem.gov.in/all-bids"));
        assert!(!robots_allow(rules, "https://bidplus.gem.gov.in/private/x"));
        assert!(robots_allow("", "https://bidplus.gem.gov.in/all-bids"));
    }
}
