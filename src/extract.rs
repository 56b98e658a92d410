//! Turning the rendered text and markup of one listing card into a [`TenderRecord`].
//!
//! Every helper here is total: missing or malformed input yields an empty
//! string or an empty list, never an error. Each field is extracted
//! independently from the same card text, so one miss never blocks another.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::model::TenderRecord;

static BID_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"GEM/\d+/B/\d+").unwrap());
static RA_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"GEM/\d+/R/\d+").unwrap());
static START_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Start Date:\s*([^\n]+)").unwrap());
static END_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"End Date:\s*([^\n]+)").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

const DEPARTMENT_LABEL: &str = "Department Name And Address:";
const MINISTRY_PREFIX: &str = "ministry";

/// Link patterns for a bid's detail page, most specific first.
const LISTING_LINK_PATTERNS: &[&str] = &["/bidlists/", "/showbid/", "/bid/"];
const DOCUMENT_LINK_PATTERN: &str = "/showbidDocument/";

/// One anchor inside a card, `href` already absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLink {
    pub href: String,
    pub text: String,
}

/// What the browser hands back for one card: its visible text and its outer HTML.
#[derive(Debug, Clone, Default)]
pub struct RawCard {
    pub text: String,
    pub html: String,
}

/// Resolve `href` against `origin` (`scheme://host`). Already absolute links pass through.
pub fn absolute_url(origin: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if is_absolute(href) {
        return href.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

fn is_absolute(href: &str) -> bool {
    let lower = href.get(..8).unwrap_or(href).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn first_match(pattern: &Regex, text: &str) -> String {
    pattern
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Split on line breaks, trim, drop blanks.
pub fn clean_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// The line right after the first line starting with `label` (case-insensitive).
pub fn value_after_label(lines: &[&str], label: &str) -> String {
    let label = label.to_lowercase();
    lines
        .iter()
        .position(|l| l.to_lowercase().starts_with(&label))
        .and_then(|idx| lines.get(idx + 1))
        .map(|l| l.to_string())
        .unwrap_or_default()
}

fn captured(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

pub fn bid_number(text: &str) -> String {
    first_match(&BID_NUMBER, text)
}

pub fn ra_number(text: &str) -> String {
    first_match(&RA_NUMBER, text)
}

pub fn start_date(text: &str) -> String {
    captured(&START_DATE, text)
}

pub fn end_date(text: &str) -> String {
    captured(&END_DATE, text)
}

/// Labelled department block, else the first "Ministry ..." line.
pub fn department(lines: &[&str]) -> String {
    let labelled = value_after_label(lines, DEPARTMENT_LABEL);
    if !labelled.is_empty() {
        return labelled;
    }
    lines
        .iter()
        .find(|l| l.to_lowercase().starts_with(MINISTRY_PREFIX))
        .map(|l| l.to_string())
        .unwrap_or_default()
}

/// All anchors with a non-empty `href`, in document order.
pub fn card_links(origin: &str, html: &str) -> Vec<CardLink> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&ANCHOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            Some(CardLink {
                href: absolute_url(origin, href),
                text: a.text().collect::<String>().trim().to_string(),
            })
        })
        .collect()
}

pub fn pick_listing_link(links: &[CardLink]) -> Option<&CardLink> {
    LISTING_LINK_PATTERNS
        .iter()
        .find_map(|p| links.iter().find(|l| l.href.contains(p)))
        .or_else(|| links.iter().find(|l| !l.href.contains(DOCUMENT_LINK_PATTERN)))
        .or_else(|| links.first())
}

pub fn pick_doc_link(links: &[CardLink]) -> Option<&CardLink> {
    links
        .iter()
        .find(|l| l.href.contains(DOCUMENT_LINK_PATTERN))
        .or_else(|| links.iter().find(|l| l.href.to_lowercase().contains(".pdf")))
}

pub fn parse_card(origin: &str, card: &RawCard) -> TenderRecord {
    let text = card.text.as_str();
    let lines = clean_lines(text);
    let links = card_links(origin, &card.html);

    let listing = pick_listing_link(&links);
    let doc = pick_doc_link(&links);

    let title = listing
        .map(|l| l.text.as_str())
        .filter(|t| !t.is_empty())
        .or_else(|| lines.first().copied())
        .unwrap_or_default()
        .trim()
        .to_string();

    TenderRecord {
        bid_number: bid_number(text),
        ra_number: ra_number(text),
        title,
        department: department(&lines),
        buyer: String::new(),
        start_date: start_date(text),
        end_date: end_date(text),
        listing_url: listing.map(|l| l.href.clone()).unwrap_or_default(),
        doc_url: doc.map(|l| l.href.clone()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://bidplus.gem.gov.in";

    #[test]
    fn absolute_url_prefixes_relative_links() {
        assert_eq!(absolute_url(ORIGIN, ""), "");
        assert_eq!(absolute_url(ORIGIN, "/showbidDocument/7"), format!("{ORIGIN}/showbidDocument/7"));
        assert_eq!(absolute_url(ORIGIN, "bidlists/7"), format!("{ORIGIN}/bidlists/7"));
        assert_eq!(absolute_url("https://x.in/", "/a"), "https://x.in/a");
        assert_eq!(absolute_url(ORIGIN, "https://other.in/a"), "https://other.in/a");
        assert_eq!(absolute_url(ORIGIN, "HTTP://other.in/a"), "HTTP://other.in/a");
    }

    #[test]
    fn absolute_url_is_idempotent() {
        for href in ["", "/a/b", "a/b", "#page-2", "https://z.in/q?x=1", "doc.pdf"] {
            let once = absolute_url(ORIGIN, href);
            assert_eq!(absolute_url(ORIGIN, &once), once, "href {href:?}");
        }
    }

    #[test]
    fn first_match_finds_identifiers() {
        let text = "BID NO: GEM/2025/B/6012345\nRA NO: GEM/2025/R/512345";
        assert_eq!(bid_number(text), "GEM/2025/B/6012345");
        assert_eq!(ra_number(text), "GEM/2025/R/512345");
        assert_eq!(bid_number("nothing here"), "");
    }

    #[test]
    fn clean_lines_trims_and_drops_blanks() {
        assert_eq!(clean_lines("  a \n\n\t\n b\r\n"), vec!["a", "b"]);
        assert!(clean_lines("").is_empty());
    }

    #[test]
    fn value_after_label_cases() {
        let lines = ["Items:", "Laptop", "Department Name And Address:", "Ministry of Defence"];
        assert_eq!(value_after_label(&lines, "items:"), "Laptop");
        assert_eq!(value_after_label(&lines, "DEPARTMENT NAME"), "Ministry of Defence");
        assert_eq!(value_after_label(&lines, "Quantity:"), "");
        assert_eq!(value_after_label(&["x", "Quantity:"], "Quantity:"), "");
    }

    #[test]
    fn dates_are_captured_to_end_of_line() {
        let text = "Start Date: 01-06-2025 10:00 AM  \nEnd Date:21-06-2025 6:00 PM";
        assert_eq!(start_date(text), "01-06-2025 10:00 AM");
        assert_eq!(end_date(text), "21-06-2025 6:00 PM");
        assert_eq!(start_date("no dates"), "");
    }

    #[test]
    fn department_falls_back_to_ministry_line() {
        assert_eq!(department(&["BID NO", "Ministry Of Railways", "x"]), "Ministry Of Railways");
        assert_eq!(department(&["nothing"]), "");
    }

    #[test]
    fn link_priority() {
        let link = |h: &str| CardLink { href: h.into(), text: String::new() };
        let links = vec![
            link("https://x/showbidDocument/1"),
            link("https://x/other"),
            link("https://x/showbid/9"),
        ];
        assert_eq!(pick_listing_link(&links).unwrap().href, "https://x/showbid/9");
        assert_eq!(pick_doc_link(&links).unwrap().href, "https://x/showbidDocument/1");

        let only_docs = vec![link("https://x/showbidDocument/1")];
        assert_eq!(pick_listing_link(&only_docs).unwrap().href, "https://x/showbidDocument/1");

        let generic = vec![link("https://x/showbidDocument/1"), link("https://x/page")];
        assert_eq!(pick_listing_link(&generic).unwrap().href, "https://x/page");

        let pdf = vec![link("https://x/files/SPEC.PDF")];
        assert_eq!(pick_doc_link(&pdf).unwrap().href, "https://x/files/SPEC.PDF");
        assert!(pick_doc_link(&[link("https://x/a")]).is_none());
        assert!(pick_listing_link(&[]).is_none());
    }

    #[test]
    fn parses_a_full_card() {
        let card = RawCard {
            text: "BID NO: GEM/2025/B/6012345\n\
                   Items: Road construction work\n\
                   Department Name And Address:\n\
                   Ministry of Road Transport\n\
                   Start Date: 01-06-2025 10:00 AM\n\
                   End Date: 21-06-2025 6:00 PM\n"
                .into(),
            html: r#"<div class="card">
                <a href="/showbidDocument/7701">GEM/2025/B/6012345</a>
                <a href=""></a>
                <a href="/bidlists/7701"> Road construction work </a>
            </div>"#
                .into(),
        };
        let t = parse_card(ORIGIN, &card);
        assert_eq!(t.bid_number, "GEM/2025/B/6012345");
        assert_eq!(t.ra_number, "");
        assert_eq!(t.title, "Road construction work");
        assert_eq!(t.department, "Ministry of Road Transport");
        assert_eq!(t.buyer, "");
        assert_eq!(t.start_date, "01-06-2025 10:00 AM");
        assert_eq!(t.end_date, "21-06-2025 6:00 PM");
        assert_eq!(t.listing_url, format!("{ORIGIN}/bidlists/7701"));
        assert_eq!(t.doc_url, format!("{ORIGIN}/showbidDocument/7701"));
    }

    #[test]
    fn card_without_links_uses_first_line_as_title() {
        let card = RawCard { text: "\n  Supply of chairs \nMinistry of Education".into(), html: String::new() };
        let t = parse_card(ORIGIN, &card);
        assert_eq!(t.title, "Supply of chairs");
        assert_eq!(t.department, "Ministry of Education");
        assert_eq!(t.listing_url, "");
        assert_eq!(t.doc_url, "");
    }
}
