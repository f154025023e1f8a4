//! Durable checkpoint file for the epoch history.
//!
//! The checkpoint is a small LF-terminated ASCII text file:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Line    │  Content                          │
//! ├──────────────────────────────────────────────┤
//! │  1       │  Format version (currently 0)     │
//! │  2       │  Entry count N                    │
//! │  3..3+N  │  "<epoch> <start_offset>"         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Atomicity
//!
//! Writes serialize the full history to a temporary sibling file, flush its
//! data, and rename it over the target. Concurrent readers in other
//! processes observe either the pre- or post-rename state, never a torn
//! file.
//!
//! # Recovery
//!
//! A missing file reads as an empty history (the file does not exist until
//! the first mutation). A present but malformed file fails loudly with
//! [`EpochError::CorruptCheckpoint`].

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use strand_types::{EpochEntry, LeaderEpoch, LogOffset};

use crate::error::{EpochError, Result};

/// Checkpoint file name used inside a partition's log directory.
pub const LEADER_EPOCH_CHECKPOINT_FILENAME: &str = "leader-epoch-checkpoint";

/// Current checkpoint format version.
const CURRENT_VERSION: i32 = 0;

/// Atomic reader/writer for an ordered list of [`EpochEntry`].
///
/// The store is stateless beyond the target path; serializing writes is the
/// caller's job (the cache performs every write under its exclusive lock).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochCheckpointFile {
    path: PathBuf,
}

impl EpochCheckpointFile {
    /// Creates a store for the given checkpoint path.
    ///
    /// The file itself is not touched until the first [`Self::write`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the checkpoint path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replaces the checkpoint with the given entries.
    ///
    /// Serializes to a temporary sibling file, flushes its data to disk,
    /// then renames it over the target.
    ///
    /// # Errors
    ///
    /// Returns [`EpochError::Io`] if any filesystem operation fails. The
    /// target file is untouched unless the rename succeeded.
    pub fn write(&self, entries: &[EpochEntry]) -> Result<()> {
        let mut buf = String::new();
        let _ = writeln!(buf, "{CURRENT_VERSION}");
        let _ = writeln!(buf, "{}", entries.len());
        for entry in entries {
            let _ = writeln!(buf, "{} {}", entry.epoch, entry.start_offset);
        }

        let tmp_path = self.path.with_extension("tmp");
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(buf.as_bytes())?;
        tmp.sync_data()?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Reads the full entry list from the checkpoint.
    ///
    /// A missing file yields an empty history.
    ///
    /// # Errors
    ///
    /// - [`EpochError::Io`] if the file cannot be read
    /// - [`EpochError::CorruptCheckpoint`] if the content is malformed:
    ///   unknown version, non-numeric fields, wrong field count on an entry
    ///   line, or an entry count that disagrees with the lines present
    pub fn read(&self) -> Result<Vec<EpochEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = content.lines();

        let version = self.parse_field::<i32>(lines.next(), "version")?;
        if version != CURRENT_VERSION {
            return Err(self.corrupt(format!("unknown version {version}")));
        }

        let count = self.parse_field::<usize>(lines.next(), "entry count")?;

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let line = lines
                .next()
                .ok_or_else(|| self.corrupt(format!("expected {count} entries, found fewer")))?;
            entries.push(self.parse_entry(line)?);
        }

        if let Some(extra) = lines.next() {
            return Err(self.corrupt(format!(
                "expected {count} entries, found trailing line {extra:?}"
            )));
        }

        // Postcondition: we read exactly `count` entries
        debug_assert_eq!(entries.len(), count, "entry count mismatch");

        Ok(entries)
    }

    /// Parses one `"<epoch> <start_offset>"` entry line.
    fn parse_entry(&self, line: &str) -> Result<EpochEntry> {
        let mut fields = line.split_whitespace();
        let (Some(epoch), Some(offset), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(self.corrupt(format!("malformed entry line {line:?}")));
        };

        let epoch: i32 = epoch
            .parse()
            .map_err(|_| self.corrupt(format!("non-numeric epoch in line {line:?}")))?;
        let offset: i64 = offset
            .parse()
            .map_err(|_| self.corrupt(format!("non-numeric offset in line {line:?}")))?;

        if epoch < 0 || offset < 0 {
            return Err(self.corrupt(format!("negative field in line {line:?}")));
        }

        Ok(EpochEntry::new(
            LeaderEpoch::new(epoch),
            LogOffset::new(offset),
        ))
    }

    /// Parses a single-integer header line.
    fn parse_field<T: std::str::FromStr>(&self, line: Option<&str>, what: &str) -> Result<T> {
        line.ok_or_else(|| self.corrupt(format!("missing {what} line")))?
            .trim()
            .parse()
            .map_err(|_| self.corrupt(format!("malformed {what} line")))
    }

    fn corrupt(&self, reason: String) -> EpochError {
        EpochError::CorruptCheckpoint {
            path: self.path.clone(),
            reason,
        }
    }
}
