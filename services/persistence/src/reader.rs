//! Write-ahead log recovery scan
//!
//! Reads every segment in index order and decodes frames until the log ends
//! or a torn/corrupt frame is hit. The valid prefix is the recovered state;
//! anything after a bad frame is discarded, matching append-crash semantics.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::journal::{segment_indices, segment_path, WalError, WalRecord};

/// Outcome of a recovery scan.
#[derive(Debug)]
pub struct ScanResult {
    /// Valid records in append order.
    pub records: Vec<WalRecord>,
    /// Whether the scan stopped early on a torn or corrupt frame.
    pub truncated: bool,
}

impl ScanResult {
    /// Sequence the writer should continue from.
    pub fn next_sequence(&self) -> u64 {
        self.records.last().map(|r| r.sequence + 1).unwrap_or(1)
    }
}

/// Scan all segments under `dir`.
pub fn scan_dir(dir: &Path) -> Result<ScanResult, WalError> {
    let mut records: Vec<WalRecord> = Vec::new();
    let mut truncated = false;

    'segments: for index in segment_indices(dir) {
        let path = segment_path(dir, index);
        let data = fs::read(&path)?;
        let mut pos = 0;

        while pos < data.len() {
            match WalRecord::from_bytes(&data[pos..]) {
                Ok((record, consumed)) => {
                    if let Some(last) = records.last() {
                        if record.sequence != last.sequence + 1 {
                            warn!(
                                expected = last.sequence + 1,
                                got = record.sequence,
                                segment = %path.display(),
                                "sequence gap; discarding the rest of the log"
                            );
                            truncated = true;
                            break 'segments;
                        }
                    }
                    records.push(record);
                    pos += consumed;
                }
                Err(err) => {
                    warn!(
                        segment = %path.display(),
                        offset = pos,
                        %err,
                        "torn or corrupt frame; discarding the rest of the log"
                    );
                    truncated = true;
                    break 'segments;
                }
            }
        }
    }

    info!(
        records = records.len(),
        truncated, "write-ahead log scanned"
    );
    Ok(ScanResult { records, truncated })
}
