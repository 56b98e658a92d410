use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::ScrapeError;
use crate::model::TenderRecord;

/// Records from the last completed run. A missing or unreadable store is empty.
pub fn read_store(path: &Path) -> Vec<TenderRecord> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("store {} not readable: {e}", path.display());
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<TenderRecord>>(&raw) {
        Ok(records) => records,
        Err(e) => {
            debug!("store {} not a record array: {e}", path.display());
            Vec::new()
        }
    }
}

/// Replace the store with `records`. Writes a sibling temp file first, so readers never see a partial array.
pub fn write_store(path: &Path, records: &[TenderRecord]) -> Result<(), ScrapeError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
