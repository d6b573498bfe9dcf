use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use log::debug;
use std::path::Path;

use crate::signal::Signal;

/// Column layout of the lab export, in file order.
pub const COLUMNS: [&str; 8] = ["Time", "HR", "Av BP", "BP", "D", "BP2", "Comment", "Extra"];
/// Numeric channels; `Time` is regenerated and `Comment`/`Extra` are dropped.
pub const CHANNELS: [&str; 5] = ["HR", "Av BP", "BP", "D", "BP2"];
pub const DEFAULT_INTERVAL_MS: f64 = 5.0;

/// A multi-channel tab-separated recording with a regenerated time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    interval_ms: f64,
    time: Vec<f64>,
    channels: Vec<(&'static str, Vec<f64>)>,
}

impl Recording {
    /// Read a Latin-1 encoded export from disk.
    pub fn read(path: &Path, interval_ms: f64) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("opening {}", path.display()))?;
        let text: String = bytes.iter().map(|&b| b as char).collect();
        Self::parse(&text, interval_ms).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse tab-separated rows without a header. Decimal commas are accepted;
    /// rows with a missing or non-numeric channel value are dropped.
    pub fn parse(text: &str, interval_ms: f64) -> Result<Self> {
        if !(interval_ms.is_finite() && interval_ms > 0.0) {
            bail!("sample interval must be positive, got {interval_ms} ms");
        }
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("reading record")?;

        let width = records
            .iter()
            .map(|r| r.len())
            .max()
            .unwrap_or(0)
            .min(COLUMNS.len());
        // channel name with its column position
        let present: Vec<(&'static str, usize)> = (0..width)
            .filter_map(|idx| {
                let name = COLUMNS[idx];
                CHANNELS.contains(&name).then_some((name, idx))
            })
            .collect();

        let mut channels: Vec<(&'static str, Vec<f64>)> =
            present.iter().map(|&(name, _)| (name, Vec::new())).collect();
        let mut dropped = 0usize;
        for record in &records {
            let row: Option<Vec<f64>> = present
                .iter()
                .map(|&(_, idx)| record.get(idx).and_then(parse_decimal))
                .collect();
            match row {
                Some(values) => {
                    for ((_, column), value) in channels.iter_mut().zip(values) {
                        column.push(value);
                    }
                }
                None => dropped += 1,
            }
        }

        let rows = channels.first().map_or(0, |(_, c)| c.len());
        debug!(
            "recording: {rows} rows kept, {dropped} dropped, channels {:?}",
            present.iter().map(|(name, _)| *name).collect::<Vec<_>>()
        );
        let time = (0..rows).map(|i| i as f64 * interval_ms / 1000.0).collect();
        Ok(Self {
            interval_ms,
            time,
            channels,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn sampling_rate(&self) -> f64 {
        1000.0 / self.interval_ms
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|(name, _)| *name).collect()
    }

    /// One channel as a [`Signal`] on the recording's time axis.
    pub fn channel(&self, name: &str) -> Result<Signal> {
        let (_, samples) = self
            .channels
            .iter()
            .find(|(channel, _)| channel.eq_ignore_ascii_case(name))
            .with_context(|| {
                format!(
                    "missing channel '{name}' (available: {})",
                    self.channel_names().join(", ")
                )
            })?;
        Ok(Signal::new(
            samples.clone(),
            self.time.clone(),
            self.sampling_rate(),
        )?)
    }

    /// Rows with `start <= time <= end`. The range must lie within the
    /// recording's own time span.
    pub fn crop(&self, start: f64, end: f64) -> Result<Recording> {
        let (Some(&min), Some(&max)) = (self.time.first(), self.time.last()) else {
            bail!("cannot crop an empty recording");
        };
        if start < min || end > max {
            bail!("time range {start}s..{end}s outside [{min}s, {max}s]");
        }
        let lo = self.time.partition_point(|&t| t < start);
        let hi = self.time.partition_point(|&t| t <= end).max(lo);
        Ok(Recording {
            interval_ms: self.interval_ms,
            time: self.time[lo..hi].to_vec(),
            channels: self
                .channels
                .iter()
                .map(|(name, values)| (*name, values[lo..hi].to_vec()))
                .collect(),
        })
    }
}

fn parse_decimal(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
