//! Deciding when an in-place listing refresh is finished.
//!
//! The listing re-renders through AJAX after a search and through `#page-N`
//! fragments when paginating, so there is no navigation event to wait on.
//! Instead the page is polled until one of several signals changes.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::config::{ELEMENT_TIMEOUT, POLL_INTERVAL, SETTLE_DELAY};
use crate::error::ScrapeError;
use crate::page::{ListingPage, Snapshot};

#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub settle: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: ELEMENT_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            settle: SETTLE_DELAY,
        }
    }
}

/// Which observation told us the listing refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Fragment,
    CardCount,
    FirstCard,
    CardsPresent,
}

impl Snapshot {
    /// Any one signal is enough. A prior value that is empty or zero never fires its signal.
    pub fn updated_since(&self, prior: &Snapshot) -> Option<Signal> {
        if !prior.fragment.is_empty() && !self.fragment.is_empty() && self.fragment != prior.fragment {
            return Some(Signal::Fragment);
        }
        if prior.card_count != 0 && self.card_count != prior.card_count {
            return Some(Signal::CardCount);
        }
        if !prior.first_card_text.is_empty()
            && !self.first_card_text.is_empty()
            && self.first_card_text != prior.first_card_text
        {
            return Some(Signal::FirstCard);
        }
        (self.card_count > 0).then_some(Signal::CardsPresent)
    }
}

/// Poll `page` until `ready` accepts a snapshot, or fail with a timeout after `policy.timeout`.
pub async fn wait_until<P, F>(
    page: &mut P,
    policy: &WaitPolicy,
    what: &'static str,
    mut ready: F,
) -> Result<Snapshot, ScrapeError>
where
    P: ListingPage,
    F: FnMut(&Snapshot) -> bool,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        match page.snapshot().await {
            Ok(snap) if ready(&snap) => return Ok(snap),
            Ok(_) => {}
            // The page may be mid-render; a failed read is just "not yet".
            Err(e) => trace!("snapshot failed while waiting for {what}: {e}"),
        }
        if Instant::now() >= deadline {
            return Err(ScrapeError::timeout(what, policy.timeout));
        }
        sleep(policy.poll_interval).await;
    }
}

pub async fn wait_for_cards<P: ListingPage>(page: &mut P, policy: &WaitPolicy) -> Result<usize, ScrapeError> {
    let snap = wait_until(page, policy, "listing cards", |s| s.card_count > 0).await?;
    Ok(snap.card_count)
}

/// Block until the listing differs from `prior` (or simply has cards), then let it settle.
///
/// Returns the signal that fired and the snapshot it fired on.
pub async fn wait_for_listing_update<P: ListingPage>(
    page: &mut P,
    prior: &Snapshot,
    policy: &WaitPolicy,
) -> Result<(Signal, Snapshot), ScrapeError> {
    let snap = wait_until(page, policy, "listing update", |s| s.updated_since(prior).is_some()).await?;
    let signal = snap.updated_since(prior).unwrap_or(Signal::CardsPresent);
    debug!(?signal, cards = snap.card_count, fragment = %snap.fragment, "listing updated");
    sleep(policy.settle).await;
    Ok((signal, snap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::fake::{FakePage, NextStyle, Screen, card};

    fn snap(first: &str, count: usize, fragment: &str) -> Snapshot {
        Snapshot {
            first_card_text: first.into(),
            card_count: count,
            fragment: fragment.into(),
        }
    }

    #[test]
    fn signals_in_priority_order() {
        let prior = snap("A", 5, "#page-1");
        assert_eq!(snap("B", 4, "#page-2").updated_since(&prior), Some(Signal::Fragment));
        assert_eq!(snap("B", 4, "#page-1").updated_since(&prior), Some(Signal::CardCount));
        assert_eq!(snap("B", 5, "#page-1").updated_since(&prior), Some(Signal::FirstCard));
        assert_eq!(snap("A", 5, "#page-1").updated_since(&prior), Some(Signal::CardsPresent));
        assert_eq!(snap("", 0, "#page-1").updated_since(&Snapshot::default()), None);
    }

    #[test]
    fn empty_prior_values_never_fire() {
        let prior = snap("", 0, "");
        assert_eq!(snap("A", 0, "#page-2").updated_since(&prior), None);
        assert_eq!(snap("A", 3, "#page-2").updated_since(&prior), Some(Signal::CardsPresent));
    }

    #[test]
    fn emptied_fragment_or_first_card_does_not_fire() {
        let prior = snap("A", 5, "#page-1");
        assert_eq!(snap("", 0, "").updated_since(&prior), Some(Signal::CardCount));
        let prior = snap("A", 0, "#page-1");
        assert_eq!(snap("", 0, "").updated_since(&prior), None);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_cards_to_render() {
        let mut page = FakePage::new(vec![
            Screen::new("", vec![], NextStyle::None),
            Screen::new("", vec![card("first", "")], NextStyle::None),
        ]);
        page.delay_polls = 7;
        page.go_to(1);

        let (signal, snap) = wait_for_listing_update(&mut page, &Snapshot::default(), &WaitPolicy::default())
            .await
            .unwrap();
        assert_eq!(signal, Signal::CardsPresent);
        assert_eq!(snap.first_card_text, "first");
        assert_eq!(page.polls, 8);
        assert_eq!(page.current, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn same_count_different_first_card_fires() {
        let cards = |prefix: &str| (0..5).map(|i| card(&format!("{prefix}{i}"), "")).collect();
        let mut page = FakePage::new(vec![Screen::new("", cards("new"), NextStyle::None)]);
        let prior = snap("old0", 5, "");

        let (signal, snap) = wait_for_listing_update(&mut page, &prior, &WaitPolicy::default()).await.unwrap();
        assert_eq!(snap.card_count, 5);
        assert_eq!(signal, Signal::FirstCard);
        assert_eq!(page.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_nothing_renders() {
        let mut page = FakePage::new(vec![Screen::new("", vec![], NextStyle::None)]);
        let started = Instant::now();

        let err = wait_for_cards(&mut page, &WaitPolicy::default()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout { what: "listing cards", .. }));
        assert!(err.to_string().contains("timeout"));
        assert!(started.elapsed() >= ELEMENT_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn settles_after_update() {
        let mut page = FakePage::new(vec![Screen::new("#page-2", vec![card("x", "")], NextStyle::None)]);
        let started = Instant::now();
        wait_for_listing_update(&mut page, &snap("x", 1, "#page-1"), &WaitPolicy::default())
            .await
            .unwrap();
        assert!(started.elapsed() >= SETTLE_DELAY);
    }
}
