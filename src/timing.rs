//! Empirically tuned signal timing, loaded from CSV tables.
//!
//! Each row maps an observed traffic level and human-driver percentage
//! to the red-phase duration that worked best under those conditions.
//! Lookup picks the nearest observation by Manhattan distance.

use anyhow::{Context, Result};
use log::warn;
use std::path::Path;

/// The red-phase duration used when no observation is available, in s.
pub const DEFAULT_RED_DURATION: f64 = 2.0;

/// One tuned observation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Entry {
    traffic_level: f64,
    human_percent: f64,
    red_duration: f64,
}

impl Entry {
    fn distance(&self, traffic_level: f64, human_percent: f64) -> f64 {
        (traffic_level - self.traffic_level).abs() + (human_percent - self.human_percent).abs()
    }
}

/// The table of tuned red-phase durations.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingTable {
    entries: Vec<Entry>,
}

impl TimingTable {
    /// Parses a table from CSV text with rows of
    /// `traffic_level,human_percent,red_duration`.
    ///
    /// Blank lines are skipped. Malformed rows are diagnosed and
    /// dropped rather than failing the whole table.
    pub fn from_csv_str(text: &str) -> Self {
        let mut entries = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_row(line) {
                Some(entry) => entries.push(entry),
                None => warn!("timing table line {} is malformed: {line:?}", number + 1),
            }
        }
        Self { entries }
    }

    /// Loads a table from a CSV file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading timing table {}", path.display()))?;
        Ok(Self::from_csv_str(&text))
    }

    /// The number of observations in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table holds no observations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The tuned red-phase duration for the observed conditions: the
    /// entry nearest by Manhattan distance over (traffic level, human
    /// percentage).
    ///
    /// An empty table degrades to [DEFAULT_RED_DURATION] with a
    /// diagnostic rather than failing.
    pub fn red_duration(&self, traffic_level: f64, human_percent: f64) -> f64 {
        let nearest = self.entries.iter().min_by(|a, b| {
            a.distance(traffic_level, human_percent)
                .total_cmp(&b.distance(traffic_level, human_percent))
        });
        match nearest {
            Some(entry) => entry.red_duration,
            None => {
                warn!(
                    "timing table is empty; using the default red duration of {DEFAULT_RED_DURATION} s"
                );
                DEFAULT_RED_DURATION
            }
        }
    }
}

fn parse_row(line: &str) -> Option<Entry> {
    let mut fields = line.split(',');
    let traffic_level = fields.next()?.trim().parse().ok()?;
    let human_percent = fields.next()?.trim().parse().ok()?;
    let red_duration = fields.next()?.trim().parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Entry {
        traffic_level,
        human_percent,
        red_duration,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn nearest_match_wins() {
        let table = TimingTable::from_csv_str(
            "0.1,0.0,1.5\n\
             0.5,0.2,2.5\n\
             0.9,0.5,4.0\n",
        );
        assert_eq!(table.len(), 3);
        assert_approx_eq!(table.red_duration(0.45, 0.25), 2.5);
        assert_approx_eq!(table.red_duration(0.0, 0.0), 1.5);
        assert_approx_eq!(table.red_duration(2.0, 1.0), 4.0);
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let table = TimingTable::from_csv_str("0.1,0.0,1.5\nnot,a,row\n0.2,0.1\n\n0.9,0.5,4.0\n");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_table_degrades_to_default() {
        let table = TimingTable::from_csv_str("");
        assert!(table.is_empty());
        assert_approx_eq!(table.red_duration(0.5, 0.5), DEFAULT_RED_DURATION);
    }
}
