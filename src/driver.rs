//! Page-by-page acquisition over one listing session.
//!
//! `Init -> Loaded -> [FilterApplied] -> ParsingPage(1) -> Advancing(1) -> ParsingPage(2) ... -> Done`

use std::collections::HashSet;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::extract::parse_card;
use crate::locator::{apply_keyword_filter, find_next_page};
use crate::model::TenderRecord;
use crate::oracle::{WaitPolicy, wait_for_cards, wait_for_listing_update};
use crate::page::ListingPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoNextPage,
    PageLimit,
    EmptyFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Loaded,
    FilterApplied,
    ParsingPage(u32),
    Advancing(u32),
    Done(StopReason),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub page_limit: u32,
    pub keyword: String,
}

/// Run progress, as pushed to an optional observer.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Progress {
    Started { page_limit: u32, keyword: String },
    PageRead { page: u32, cards: usize, admitted: usize, total: usize },
    Done { pages: u32, total: usize, reason: StopReason },
}

impl Progress {
    pub fn event(&self) -> &'static str {
        match self {
            Progress::Started { .. } => "start",
            Progress::PageRead { .. } => "page",
            Progress::Done { .. } => "done",
        }
    }
}

/// Keys of records already admitted in this run.
#[derive(Debug, Default)]
pub struct SeenKeys(HashSet<String>);

impl SeenKeys {
    /// True the first time a record's key is offered.
    pub fn admit(&mut self, record: &TenderRecord) -> bool {
        self.0.insert(record.dedup_key())
    }
}

pub struct ListingDriver<P: ListingPage> {
    page: P,
    origin: String,
    policy: WaitPolicy,
    seen: SeenKeys,
    records: Vec<TenderRecord>,
    state: State,
    pages_read: u32,
    progress: Option<mpsc::Sender<Progress>>,
}

impl<P: ListingPage> ListingDriver<P> {
    pub fn new(page: P, origin: impl Into<String>) -> Self {
        Self {
            page,
            origin: origin.into(),
            policy: WaitPolicy::default(),
            seen: SeenKeys::default(),
            records: Vec::new(),
            state: State::Init,
            pages_read: 0,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<mpsc::Sender<Progress>>) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn records(&self) -> &[TenderRecord] {
        &self.records
    }

    /// Hand back the session and everything admitted so far.
    pub fn into_parts(self) -> (P, Vec<TenderRecord>) {
        (self.page, self.records)
    }

    #[cfg(test)]
    pub fn page(&self) -> &P {
        &self.page
    }

    pub async fn run(&mut self, listing_url: &str, opts: &RunOptions) -> Result<StopReason, ScrapeError> {
        let page_limit = opts.page_limit.max(1);
        let keyword = opts.keyword.trim();
        self.report(Progress::Started { page_limit, keyword: keyword.to_string() }).await;

        info!("opening {listing_url}");
        self.page.open(listing_url).await?;
        wait_for_cards(&mut self.page, &self.policy).await?;
        self.state = State::Loaded;

        if !keyword.is_empty() {
            info!("applying listing search keyword {keyword:?}");
            let count = apply_keyword_filter(&mut self.page, keyword, &self.policy).await?;
            self.state = State::FilterApplied;
            if count == 0 {
                info!("no results (0 cards) after searching {keyword:?}");
                return Ok(self.finish(StopReason::EmptyFilter).await);
            }
        }

        let mut n = 1;
        loop {
            self.state = State::ParsingPage(n);
            info!("reading page {n}");
            wait_for_cards(&mut self.page, &self.policy).await?;
            let (cards, admitted) = self.read_page().await?;
            self.pages_read = n;
            self.report(Progress::PageRead { page: n, cards, admitted, total: self.records.len() })
                .await;

            if n >= page_limit {
                return Ok(self.finish(StopReason::PageLimit).await);
            }

            let Some(next) = find_next_page(&mut self.page).await? else {
                info!("no next page link found, stopping");
                return Ok(self.finish(StopReason::NoNextPage).await);
            };

            self.state = State::Advancing(n);
            let before = self.page.snapshot().await.unwrap_or_default();
            self.page.click(&next).await?;
            wait_for_listing_update(&mut self.page, &before, &self.policy).await?;
            n += 1;
        }
    }

    /// Parse every card on the current page; returns (cards seen, records admitted).
    async fn read_page(&mut self) -> Result<(usize, usize), ScrapeError> {
        let cards = self.page.cards().await?;
        let mut admitted = 0;
        for (i, card) in cards.iter().enumerate() {
            let raw = match self.page.read_card(card).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(card = i, "card parse failed: {e}");
                    continue;
                }
            };
            let record = parse_card(&self.origin, &raw);
            if !self.seen.admit(&record) {
                debug!(card = i, key = %record.dedup_key(), "duplicate card skipped");
                continue;
            }
            self.records.push(record);
            admitted += 1;
        }
        Ok((cards.len(), admitted))
    }

    async fn finish(&mut self, reason: StopReason) -> StopReason {
        self.state = State::Done(reason);
        info!(?reason, pages = self.pages_read, records = self.records.len(), "listing run done");
        self.report(Progress::Done { pages: self.pages_read, total: self.records.len(), reason })
            .await;
        reason
    }

    async fn report(&self, event: Progress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event).await;
        }
    }
}
