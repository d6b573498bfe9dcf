use anyhow::{bail, Context, Result};
use csv::WriterBuilder;
use std::{fs, path::Path};

/// Write equal-length numeric columns as a comma-separated table with a
/// header row.
pub fn write_columns_csv(path: &Path, columns: &[(&str, &[f64])]) -> Result<()> {
    let rows = columns.first().map_or(0, |(_, values)| values.len());
    if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != rows) {
        bail!(
            "column '{name}' has {} values, expected {rows}",
            values.len()
        );
    }
    let file =
        fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record(columns.iter().map(|(name, _)| *name))?;
    for row in 0..rows {
        writer.write_record(columns.iter().map(|(_, values)| values[row].to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
