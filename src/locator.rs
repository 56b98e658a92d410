//! Picking the right control when the page has several that look alike.
//!
//! The listing page carries two "Enter Keyword" boxes: the navbar one
//! (`id="search"`) and the bid listing one further down. Pagination has a
//! "Next" anchor targeting `#page-N`.

use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::oracle::{WaitPolicy, wait_for_listing_update};
use crate::page::{InputCandidate, ListingPage};

/// Element id of the site-wide navbar search box.
const NAVBAR_SEARCH_ID: &str = "search";

/// Keep visible, non-navbar candidates, lowest on the page first.
pub fn rank_keyword_inputs<C>(candidates: Vec<InputCandidate<C>>) -> Vec<InputCandidate<C>> {
    let mut ranked: Vec<_> = candidates
        .into_iter()
        .filter(|c| c.visible && !c.id.eq_ignore_ascii_case(NAVBAR_SEARCH_ID))
        .collect();
    // Stable: among equal heights the first in document order wins.
    ranked.sort_by(|a, b| {
        let (ay, by) = (a.y.unwrap_or(0.0), b.y.unwrap_or(0.0));
        by.total_cmp(&ay)
    });
    ranked
}

pub async fn find_keyword_input<P: ListingPage>(page: &mut P) -> Result<Option<P::Control>, ScrapeError> {
    let candidates = page.keyword_inputs().await?;
    let total = candidates.len();
    let ranked = rank_keyword_inputs(candidates);
    debug!(total, eligible = ranked.len(), "keyword input candidates");
    Ok(ranked.into_iter().next().map(|c| c.control))
}

/// Type `keyword` into the listing search box and submit it.
///
/// Returns the number of cards visible afterwards; zero means the search had no results.
pub async fn apply_keyword_filter<P: ListingPage>(
    page: &mut P,
    keyword: &str,
    policy: &WaitPolicy,
) -> Result<usize, ScrapeError> {
    let input = find_keyword_input(page)
        .await?
        .ok_or(ScrapeError::KeywordInputNotFound)?;

    let before = page.snapshot().await.unwrap_or_default();

    page.type_into(&input, keyword).await?;

    let trigger = match page.search_trigger(&input).await {
        Ok(Some(button)) if page.is_visible(&button).await => Some(button),
        _ => None,
    };
    match trigger {
        Some(button) => {
            if let Err(e) = page.click(&button).await {
                warn!("search button click failed ({e}), submitting with Enter");
                page.press_enter(&input).await?;
            }
        }
        _ => page.press_enter(&input).await?,
    }

    page.wait_ready().await;
    let (_, after) = wait_for_listing_update(page, &before, policy).await?;

    let count = after.card_count;
    info!(keyword, count, "keyword filter applied");
    Ok(count)
}

/// The listing's "Next" link, or `None` when there is no further page.
///
/// Each lookup only counts if the link it finds is displayed.
pub async fn find_next_page<P: ListingPage>(page: &mut P) -> Result<Option<P::Control>, ScrapeError> {
    if let Some(link) = page.next_link_strict().await? {
        if page.is_visible(&link).await {
            return Ok(Some(link));
        }
        debug!("strict next link hidden, trying loose match");
    }
    if let Some(link) = page.next_link_loose().await? {
        if page.is_visible(&link).await {
            return Ok(Some(link));
        }
        debug!("next link present but hidden");
    }
    Ok(None)
}
