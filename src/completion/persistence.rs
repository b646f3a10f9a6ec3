//! Learning-data file format
//!
//! ```json
//! {
//!   "usage_frequency": { "sin(x)+cos(x)": 3 },
//!   "recency_scores": { "sin(x)+cos(x)": 1700000000.25 }
//! }
//! ```
//!
//! Saving is atomic (temp file then rename). Loading never fails: a missing
//! file and a malformed file are reported through [`LearningDataStatus`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use super::history::{UsageRecord, UsageTable};

/// On-disk shape of the usage table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningData {
    pub usage_frequency: BTreeMap<String, u64>,
    pub recency_scores: BTreeMap<String, f64>,
}

impl LearningData {
    pub fn from_table(table: &UsageTable) -> Self {
        let mut data = Self::default();
        for (expression, record) in table.iter() {
            data.usage_frequency.insert(expression.clone(), record.count);
            if let Some(last_used) = record.last_used {
                data.recency_scores.insert(expression.clone(), last_used);
            }
        }
        data
    }

    /// Expressions present in either map become records
    pub fn into_table(self) -> UsageTable {
        let mut table = UsageTable::new();
        let LearningData { usage_frequency, mut recency_scores } = self;

        for (expression, count) in usage_frequency {
            let last_used = recency_scores.remove(&expression);
            table.insert(expression, UsageRecord { count, last_used });
        }
        for (expression, last_used) in recency_scores {
            table.insert(expression, UsageRecord { count: 0, last_used: Some(last_used) });
        }
        table
    }

    pub fn len(&self) -> usize {
        self.usage_frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usage_frequency.is_empty() && self.recency_scores.is_empty()
    }
}

/// What `load_learning_data` found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningDataStatus {
    /// File parsed; the table now holds `expressions` records
    Loaded { expressions: usize },
    /// No file at the path; nothing changed
    Missing,
    /// File unreadable or malformed; the table was reset to empty
    Reset,
}

/// Write `table` to `path` as pretty JSON
pub fn save_learning_data(path: &Path, table: &UsageTable) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let data = LearningData::from_table(table);
    let json = serde_json::to_string_pretty(&data).context("Failed to serialize learning data")?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    fs::write(tmp_path, json).with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(tmp_path, path)
        .with_context(|| format!("Failed to move learning data into place at {}", path.display()))?;

    info!("Saved learning data for {} expressions to {}", data.len(), path.display());
    Ok(())
}

/// Read the learning data at `path`
///
/// Returns `None` with [`LearningDataStatus::Missing`] when there is no
/// file, and an empty table with [`LearningDataStatus::Reset`] when the file
/// cannot be read or parsed.
pub fn load_learning_data(path: &Path) -> (Option<UsageTable>, LearningDataStatus) {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No learning data found at {}, starting fresh", path.display());
            return (None, LearningDataStatus::Missing);
        }
        Err(e) => {
            warn!("Failed to read learning data at {}: {}; resetting", path.display(), e);
            return (Some(UsageTable::new()), LearningDataStatus::Reset);
        }
    };

    match serde_json::from_str::<LearningData>(&content) {
        Ok(data) => {
            let table = data.into_table();
            let expressions = table.len();
            info!("Loaded learning data for {} expressions from {}", expressions, path.display());
            (Some(table), LearningDataStatus::Loaded { expressions })
        }
        Err(e) => {
            warn!("Malformed learning data at {}: {}; resetting", path.display(), e);
            (Some(UsageTable::new()), LearningDataStatus::Reset)
        }
    }
}
