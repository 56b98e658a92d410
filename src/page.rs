//! What the locator, oracle and driver need from a rendered listing page.
//!
//! The real implementation talks to a browser over WebDriver
//! ([`crate::webdriver::BrowserPage`]); tests use a scripted in-memory page.

use crate::error::ScrapeError;
use crate::extract::RawCard;

/// Listing state captured before an action, compared against later to see whether the cards refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub first_card_text: String,
    pub card_count: usize,
    /// Part of the address after `#`, including the `#` (`"#page-2"`), or empty.
    pub fragment: String,
}

/// A visible-ish input that looks like a keyword search box.
#[derive(Debug, Clone)]
pub struct InputCandidate<C> {
    pub control: C,
    pub id: String,
    pub visible: bool,
    /// Top edge in page coordinates; `None` if the browser would not say.
    pub y: Option<f64>,
}

#[allow(async_fn_in_trait)]
pub trait ListingPage {
    /// Handle to an interactive element (input, button, link).
    type Control: Clone;
    /// Handle to one listing card.
    type Card;

    async fn open(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Current first card text, card count and fragment.
    async fn snapshot(&mut self) -> Result<Snapshot, ScrapeError>;

    async fn cards(&mut self) -> Result<Vec<Self::Card>, ScrapeError>;
    async fn read_card(&mut self, card: &Self::Card) -> Result<RawCard, ScrapeError>;

    /// Inputs whose placeholder reads like "Enter Keyword(s)", in document order.
    async fn keyword_inputs(&mut self) -> Result<Vec<InputCandidate<Self::Control>>, ScrapeError>;
    /// Replace the input's value with `text`, typed key by key.
    async fn type_into(&mut self, input: &Self::Control, text: &str) -> Result<(), ScrapeError>;
    /// The search button grouped with `input`, if there is one.
    async fn search_trigger(&mut self, input: &Self::Control) -> Result<Option<Self::Control>, ScrapeError>;
    async fn press_enter(&mut self, input: &Self::Control) -> Result<(), ScrapeError>;

    /// `<a>` labelled "Next" pointing at `#page-N`, matched in one selector.
    async fn next_link_strict(&mut self) -> Result<Option<Self::Control>, ScrapeError>;
    /// Same target, matched target-first then label.
    async fn next_link_loose(&mut self) -> Result<Option<Self::Control>, ScrapeError>;

    async fn is_visible(&mut self, control: &Self::Control) -> bool;
    async fn click(&mut self, control: &Self::Control) -> Result<(), ScrapeError>;

    /// Best-effort wait for the document to settle after an action. Never fails.
    async fn wait_ready(&mut self);

    async fn close(self) -> Result<(), ScrapeError>;
}
