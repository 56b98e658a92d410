use std::fs;
use std::io;
use std::path::Path;

use csv::Writer;

use crate::model::{MatchedRecord, TenderRecord};

const BASE_HEADERS: [&str; 8] = [
    "Bid No",
    "RA No",
    "Title",
    "Department",
    "Buyer",
    "Start Date",
    "End Date",
    "Link",
];

/// Separator for the matched keywords column.
pub const KEYWORD_DELIMITER: &str = "|";

fn base_row(t: &TenderRecord) -> [&str; 8] {
    [
        t.bid_number.as_str(),
        t.ra_number.as_str(),
        t.title.as_str(),
        t.department.as_str(),
        t.buyer.as_str(),
        t.start_date.as_str(),
        t.end_date.as_str(),
        t.url(),
    ]
}

pub fn write_records<W: io::Write>(out: W, records: &[TenderRecord]) -> csv::Result<()> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(BASE_HEADERS)?;
    for t in records {
        wtr.write_record(base_row(t))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_matches<W: io::Write>(out: W, matches: &[MatchedRecord]) -> csv::Result<()> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(BASE_HEADERS.iter().chain(&["Matched Keywords", "Score"]))?;
    for m in matches {
        let keywords = m.matched_keywords.join(KEYWORD_DELIMITER);
        let score = m.score.to_string();
        wtr.write_record(base_row(&m.record).iter().chain(&[keywords.as_str(), score.as_str()]))?;
    }
    wtr.flush()?;
    Ok(())
}

fn create(path: &Path) -> io::Result<fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::File::create(path)
}

pub fn export_records(path: &Path, records: &[TenderRecord]) -> anyhow::Result<()> {
    write_records(create(path)?, records)?;
    Ok(())
}

pub fn export_matches(path: &Path, matches: &[MatchedRecord]) -> anyhow::Result<()> {
    write_matches(create(path)?, matches)?;
    Ok(())
}
