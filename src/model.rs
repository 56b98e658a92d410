use serde::{Deserialize, Serialize};

/// One bid card as read from the listing. Field names on disk are camelCase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenderRecord {
    #[serde(alias = "bidNo")]
    pub bid_number: String,
    #[serde(alias = "raNo")]
    pub ra_number: String,
    pub title: String,
    pub department: String,
    /// Never populated from the listing; kept so stored data and exports keep the column.
    pub buyer: String,
    pub start_date: String,
    pub end_date: String,
    pub listing_url: String,
    pub doc_url: String,
}

impl TenderRecord {
    /// Identity of a card within one run. `doc_url` is not part of it.
    pub fn dedup_key(&self) -> String {
        format!("{}|{}|{}", self.bid_number, self.ra_number, self.listing_url)
    }

    /// The link shown to users: the detail page, else the document.
    pub fn url(&self) -> &str {
        if self.listing_url.is_empty() {
            &self.doc_url
        } else {
            &self.listing_url
        }
    }
}

/// A record that passed the keyword query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRecord {
    #[serde(flatten)]
    pub record: TenderRecord,
    pub url: String,
    pub matched_keywords: Vec<String>,
    pub score: usize,
}

/// A stored record as returned by the API, with the derived link attached.
#[derive(Debug, Clone, Serialize)]
pub struct ListedTender<'a> {
    #[serde(flatten)]
    pub record: &'a TenderRecord,
    pub url: &'a str,
}

impl<'a> From<&'a TenderRecord> for ListedTender<'a> {
    fn from(record: &'a TenderRecord) -> Self {
        Self { record, url: record.url() }
    }
}
