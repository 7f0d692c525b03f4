use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::model::SurvivalRow;

/// Writes the survival-analysis dataset handed to R/SPSS downstream.
pub fn write_survival_csv(path: &Path, rows: &[SurvivalRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(rows = rows.len(), path = %path.display(), "wrote survival dataset");
    Ok(())
}

/// Reads a survival dataset back. Used to verify that exported outcomes
/// survive a round trip unchanged.
pub fn read_survival_csv(path: &Path) -> Result<Vec<SurvivalRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}
