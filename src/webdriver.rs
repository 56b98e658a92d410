//! [`ListingPage`] over a real Chrome session driven through WebDriver.

use fantoccini::elements::Element;
use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use rand::{Rng, rng};
use serde::Deserialize;
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::config::{ELEMENT_TIMEOUT, POLL_INTERVAL, TYPING_DELAY};
use crate::error::ScrapeError;
use crate::extract::RawCard;
use crate::page::{InputCandidate, ListingPage, Snapshot};

const CARD_SELECTOR: &str = ".card";
const KEYWORD_INPUT_SELECTOR: &str = r#"input[placeholder*="Enter Keyword" i]"#;
const SEARCH_TRIGGER_XPATH: &str =
    "./ancestor::div[contains(@class,'input-group')][1]//button | ./following-sibling::*[1]//button";
const NEXT_LINK_STRICT_XPATH: &str = "//a[contains(translate(normalize-space(.),'NEXT','next'),'next') and starts-with(@href,'#page-')]";
const NEXT_LINK_LOOSE_SELECTOR: &str = r##"a[href^="#page-"]"##;

const SNAPSHOT_JS: &str = r#"
    const cards = document.querySelectorAll('.card');
    const first = cards.length ? (cards[0].innerText || cards[0].textContent || '') : '';
    return { first: first, count: cards.length, hash: location.hash || '' };
"#;
const READY_JS: &str = r#"
    return document.readyState === 'complete' && (!window.jQuery || window.jQuery.active === 0);
"#;
const SCROLL_JS: &str = "arguments[0].scrollIntoView({block: 'center'});";

#[derive(Deserialize)]
struct RawSnapshot {
    first: String,
    count: usize,
    hash: String,
}

pub struct BrowserPage {
    client: Client,
}

impl BrowserPage {
    /// Open a new Chrome session at `webdriver_url` with a random desktop user agent.
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, ScrapeError> {
        let mut args = vec![
            format!("--user-agent={}", random_desktop_ua()),
            "--window-size=1366,900".to_string(),
            "--disable-gpu".to_string(),
        ];
        if headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = serde_json::Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        info!("connecting to webdriver at {webdriver_url}");
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await?;
        Ok(Self { client })
    }

    /// First of `links` the browser reports as displayed.
    async fn first_displayed(links: Vec<Element>) -> Option<Element> {
        for link in links {
            if link.is_displayed().await.unwrap_or(false) {
                return Some(link);
            }
        }
        None
    }

    async fn scroll_into_view(&self, el: &Element) {
        let Ok(arg) = serde_json::to_value(el) else {
            return;
        };
        if let Err(e) = self.client.execute(SCROLL_JS, vec![arg]).await {
            debug!("scrollIntoView failed: {e}");
        }
    }
}

impl ListingPage for BrowserPage {
    type Control = Element;
    type Card = Element;

    async fn open(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.client.goto(url).await?;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<Snapshot, ScrapeError> {
        let value = self.client.execute(SNAPSHOT_JS, vec![]).await?;
        let raw: RawSnapshot = serde_json::from_value(value)?;
        Ok(Snapshot {
            first_card_text: raw.first,
            card_count: raw.count,
            fragment: raw.hash,
        })
    }

    async fn cards(&mut self) -> Result<Vec<Element>, ScrapeError> {
        Ok(self.client.find_all(Locator::Css(CARD_SELECTOR)).await?)
    }

    async fn read_card(&mut self, card: &Element) -> Result<RawCard, ScrapeError> {
        let text = card.text().await?;
        let html = card.html(false).await?;
        Ok(RawCard { text, html })
    }

    async fn keyword_inputs(&mut self) -> Result<Vec<InputCandidate<Element>>, ScrapeError> {
        let found = self.client.find_all(Locator::Css(KEYWORD_INPUT_SELECTOR)).await?;
        let mut candidates = Vec::with_capacity(found.len());
        for control in found {
            let id = control.attr("id").await.ok().flatten().unwrap_or_default();
            let visible = control.is_displayed().await.unwrap_or(false);
            let y = control.rectangle().await.ok().map(|(_, y, _, _)| y);
            candidates.push(InputCandidate { control, id, visible, y });
        }
        Ok(candidates)
    }

    async fn type_into(&mut self, input: &Element, text: &str) -> Result<(), ScrapeError> {
        self.scroll_into_view(input).await;
        input.clear().await?;
        for ch in text.chars() {
            input.send_keys(&ch.to_string()).await?;
            sleep(TYPING_DELAY).await;
        }
        Ok(())
    }

    async fn search_trigger(&mut self, input: &Element) -> Result<Option<Element>, ScrapeError> {
        match input.find(Locator::XPath(SEARCH_TRIGGER_XPATH)).await {
            Ok(button) => Ok(Some(button)),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn press_enter(&mut self, input: &Element) -> Result<(), ScrapeError> {
        let enter: char = Key::Enter.into();
        input.send_keys(&enter.to_string()).await?;
        Ok(())
    }

    async fn next_link_strict(&mut self) -> Result<Option<Element>, ScrapeError> {
        let links = self.client.find_all(Locator::XPath(NEXT_LINK_STRICT_XPATH)).await?;
        Ok(Self::first_displayed(links).await)
    }

    async fn next_link_loose(&mut self) -> Result<Option<Element>, ScrapeError> {
        let links = self.client.find_all(Locator::Css(NEXT_LINK_LOOSE_SELECTOR)).await?;
        let mut labelled = Vec::new();
        for link in links {
            if is_next_label(&link.text().await.unwrap_or_default()) {
                labelled.push(link);
            }
        }
        Ok(Self::first_displayed(labelled).await)
    }

    async fn is_visible(&mut self, control: &Element) -> bool {
        control.is_displayed().await.unwrap_or(false)
    }

    async fn click(&mut self, control: &Element) -> Result<(), ScrapeError> {
        self.scroll_into_view(control).await;
        control.click().await?;
        Ok(())
    }

    async fn wait_ready(&mut self) {
        let deadline = Instant::now() + ELEMENT_TIMEOUT;
        while Instant::now() < deadline {
            match self.client.execute(READY_JS, vec![]).await {
                Ok(v) if v.as_bool() == Some(true) => return,
                Ok(_) => {}
                Err(e) => {
                    debug!("readyState check failed: {e}");
                    return;
                }
            }
            sleep(POLL_INTERVAL).await;
        }
        debug!("page not idle after {} ms, continuing", ELEMENT_TIMEOUT.as_millis());
    }

    async fn close(self) -> Result<(), ScrapeError> {
        self.client.close().await?;
        Ok(())
    }
}

fn is_next_label(text: &str) -> bool {
    text.to_lowercase().contains("next")
}

pub fn random_desktop_ua() -> String {
    const UAS: &[&str] = &[
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36",
    ];
    let i = rng().random_range(0..UAS.len());
    UAS[i].to_string()
}
