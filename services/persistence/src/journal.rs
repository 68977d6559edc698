//! Append-only write-ahead log with checksums
//!
//! Every store mutation is framed, CRC32C-checksummed, and appended before
//! the in-memory tables change. A restart replays the log to rebuild state.
//!
//! # Binary format (per frame)
//! ```text
//! [frame_len: u32]   // bytes after this field
//! [sequence:  u64]
//! [timestamp: i64]
//! [payload_len: u32][payload: bytes]   // bincode-encoded store event
//! [checksum: u32]    // CRC32C over sequence ++ timestamp ++ payload
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crc32c::crc32c;
use thiserror::Error;
use types::time::unix_nanos;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("corrupt frame: {0}")]
    Corrupt(String),
}

// ── Records ─────────────────────────────────────────────────────────

/// One framed mutation in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Strictly increasing per log directory.
    pub sequence: u64,
    /// Unix nanos at append time.
    pub timestamp: i64,
    /// Bincode-encoded store event.
    pub payload: Vec<u8>,
    /// CRC32C over sequence, timestamp, and payload.
    pub checksum: u32,
}

impl WalRecord {
    pub fn new(sequence: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, &payload);
        Self {
            sequence,
            timestamp,
            payload,
            checksum,
        }
    }

    pub fn compute_checksum(sequence: u64, timestamp: i64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        // frame = 8 (seq) + 8 (ts) + 4 (len) + payload + 4 (crc)
        let frame_len: u32 = 8 + 8 + 4 + payload_len + 4;

        let mut buf = Vec::with_capacity(4 + frame_len as usize);
        buf.extend_from_slice(&frame_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Decode one frame from the head of `data`, returning the record and
    /// bytes consumed. Truncated or implausible input is `Corrupt`, never a
    /// panic; recovery treats it as the torn tail of the log.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), WalError> {
        if data.len() < 4 {
            return Err(WalError::Corrupt("missing length prefix".into()));
        }
        let frame_len = u32::from_le_bytes(data[0..4].try_into().expect("sized slice")) as usize;
        if frame_len < 24 {
            return Err(WalError::Corrupt(format!("frame too small: {frame_len}")));
        }
        if frame_len > 64 * 1024 * 1024 {
            return Err(WalError::Corrupt(format!(
                "implausible frame length {frame_len}"
            )));
        }
        let total = 4 + frame_len;
        if data.len() < total {
            return Err(WalError::Corrupt(format!(
                "incomplete frame: need {total} bytes, have {}",
                data.len()
            )));
        }

        let body = &data[4..total];
        let sequence = u64::from_le_bytes(body[0..8].try_into().expect("sized slice"));
        let timestamp = i64::from_le_bytes(body[8..16].try_into().expect("sized slice"));
        let payload_len =
            u32::from_le_bytes(body[16..20].try_into().expect("sized slice")) as usize;
        if 20 + payload_len + 4 != body.len() {
            return Err(WalError::Corrupt(format!(
                "payload length {payload_len} disagrees with frame length {frame_len}"
            )));
        }
        let payload = body[20..20 + payload_len].to_vec();
        let checksum =
            u32::from_le_bytes(body[20 + payload_len..].try_into().expect("sized slice"));

        let record = Self {
            sequence,
            timestamp,
            payload,
            checksum,
        };
        if !record.verify_checksum() {
            return Err(WalError::Corrupt(format!(
                "checksum mismatch at sequence {sequence}"
            )));
        }
        Ok((record, total))
    }
}

// ── Writer ──────────────────────────────────────────────────────────

/// When `fsync` is called after appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Fsync after every append (default; slow and safe).
    EveryWrite,
    /// Fsync every N appends.
    EveryN(usize),
    /// Leave durability to the OS page cache.
    Never,
}

/// Write-ahead log configuration.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory for log segments.
    pub dir: PathBuf,
    /// Segment size that triggers rotation.
    pub max_segment_size: u64,
    pub fsync_policy: FsyncPolicy,
}

impl WalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_segment_size: 64 * 1024 * 1024,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

/// Appender over rotating log segments.
pub struct WalWriter {
    config: WalConfig,
    writer: BufWriter<File>,
    segment_path: PathBuf,
    segment_size: u64,
    segment_index: u64,
    next_sequence: u64,
    appends_since_fsync: usize,
}

impl WalWriter {
    /// Open the newest segment for append, creating the directory if needed.
    /// `next_sequence` continues after the recovered prefix.
    pub fn open(config: WalConfig, next_sequence: u64) -> Result<Self, WalError> {
        fs::create_dir_all(&config.dir)?;
        let segment_index = latest_segment_index(&config.dir);
        let segment_path = segment_path(&config.dir, segment_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&segment_path)?;
        let segment_size = file.metadata()?.len();

        Ok(Self {
            config,
            writer: BufWriter::new(file),
            segment_path,
            segment_size,
            segment_index,
            next_sequence,
            appends_since_fsync: 0,
        })
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn segment_path(&self) -> &Path {
        &self.segment_path
    }

    /// Frame and append one payload; returns the written record.
    pub fn append(&mut self, payload: Vec<u8>) -> Result<WalRecord, WalError> {
        if self.segment_size >= self.config.max_segment_size {
            self.rotate()?;
        }

        let record = WalRecord::new(self.next_sequence, unix_nanos(), payload);
        let bytes = record.to_bytes();
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.segment_size += bytes.len() as u64;
        self.next_sequence += 1;
        self.appends_since_fsync += 1;

        let should_fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.appends_since_fsync >= n,
            FsyncPolicy::Never => false,
        };
        if should_fsync {
            self.writer.get_ref().sync_all()?;
            self.appends_since_fsync = 0;
        }
        Ok(record)
    }

    /// Flush and fsync (shutdown, rotation).
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.appends_since_fsync = 0;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), WalError> {
        self.sync()?;
        self.segment_index += 1;
        self.segment_path = segment_path(&self.config.dir, self.segment_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.segment_path)?;
        self.writer = BufWriter::new(file);
        self.segment_size = 0;
        Ok(())
    }
}

pub(crate) fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("wal-{index:06}.log"))
}

pub(crate) fn segment_indices(dir: &Path) -> Vec<u64> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut indices: Vec<u64> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.strip_prefix("wal-")?
                .strip_suffix(".log")?
                .parse::<u64>()
                .ok()
        })
        .collect();
    indices.sort_unstable();
    indices
}

fn latest_segment_index(dir: &Path) -> u64 {
    segment_indices(dir).last().copied().unwrap_or(0)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn record_roundtrip_preserves_everything() {
        let record = WalRecord::new(42, 1_708_123_456_789_000_000, vec![1, 2, 3, 4, 5]);
        assert!(record.verify_checksum());

        let bytes = record.to_bytes();
        let (decoded, consumed) = WalRecord::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, record);
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let record = WalRecord::new(1, 100, vec![1, 2, 3]);
        let mut bytes = record.to_bytes();
        let payload_start = 4 + 8 + 8 + 4;
        bytes[payload_start] ^= 0xFF;
        assert!(matches!(
            WalRecord::from_bytes(&bytes),
            Err(WalError::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_frame_is_corrupt_not_panic() {
        let record = WalRecord::new(1, 100, vec![0u8; 64]);
        let bytes = record.to_bytes();
        for cut in [0, 3, 10, bytes.len() - 1] {
            assert!(WalRecord::from_bytes(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn appends_assign_increasing_sequences() {
        let tmp = TempDir::new().unwrap();
        let mut writer = WalWriter::open(WalConfig::new(tmp.path()), 1).unwrap();
        let a = writer.append(vec![1]).unwrap();
        let b = writer.append(vec![2]).unwrap();
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(writer.next_sequence(), 3);
    }

    #[test]
    fn rotation_splits_segments() {
        let tmp = TempDir::new().unwrap();
        let config = WalConfig {
            max_segment_size: 64,
            ..WalConfig::new(tmp.path())
        };
        let mut writer = WalWriter::open(config, 1).unwrap();
        for i in 0..16 {
            writer.append(vec![i as u8; 16]).unwrap();
        }
        assert!(segment_indices(tmp.path()).len() > 1);
    }

    #[test]
    fn fsync_every_n_still_lands_on_disk() {
        let tmp = TempDir::new().unwrap();
        let config = WalConfig {
            fsync_policy: FsyncPolicy::EveryN(5),
            ..WalConfig::new(tmp.path())
        };
        let mut writer = WalWriter::open(config, 1).unwrap();
        for _ in 0..6 {
            writer.append(vec![9]).unwrap();
        }
        let size = fs::metadata(writer.segment_path()).unwrap().len();
        assert!(size > 0);
    }
}
