// 📂 Replay - Recorded notifications from CSV
// Columns: source,title,body,posted_at_ms

use crate::extraction::RawEvent;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

pub fn load_events(csv_path: &Path) -> Result<Vec<RawEvent>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;
    read_events(file)
}

pub fn read_events<R: Read>(reader: R) -> Result<Vec<RawEvent>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut events = Vec::new();

    for (row, result) in rdr.deserialize().enumerate() {
        // Header is line 1
        let event: RawEvent = result.with_context(|| format!("Failed to parse event on line {}", row + 2))?;
        events.push(event);
    }

    Ok(events)
}
