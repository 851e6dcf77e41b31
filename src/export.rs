use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::core::{HalvingRecord, Projection, YearRecord};

pub const PROJECTION_CSV_FILE: &str = "projection.csv";
pub const HALVINGS_CSV_FILE: &str = "halvings.csv";

pub fn projection_csv(years: &[YearRecord]) -> Result<String> {
    records_to_csv(years, &["year_index", "age", "cumulative_btc", "projected_value"])
}

pub fn halvings_csv(halvings: &[HalvingRecord]) -> Result<String> {
    records_to_csv(
        halvings,
        &["halving_calendar_year", "estimated_multiplier", "estimated_value"],
    )
}

/// Writes both exports into `dir`, creating it if needed.
pub fn write_exports(dir: &Path, projection: &Projection) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let projection_path = dir.join(PROJECTION_CSV_FILE);
    let halvings_path = dir.join(HALVINGS_CSV_FILE);
    fs::write(&projection_path, projection_csv(&projection.years)?)?;
    fs::write(&halvings_path, halvings_csv(&projection.halvings)?)?;
    Ok((projection_path, halvings_path))
}

// Headers are written explicitly so an empty record set still yields a header row.
fn records_to_csv<T: Serialize>(records: &[T], headers: &[&str]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(headers)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
