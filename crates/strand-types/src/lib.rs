//! # strand-types: Core types for Strand
//!
//! This crate contains shared types used across the Strand replicated log:
//! - Leadership terms ([`LeaderEpoch`])
//! - Log positions ([`LogOffset`])
//! - Epoch history entries ([`EpochEntry`])
//! - Partition addressing ([`TopicPartition`])
//!
//! Both [`LeaderEpoch`] and [`LogOffset`] reserve `-1` as an "undefined"
//! sentinel. Query paths return sentinels instead of `Option` so the
//! replication hot path stays allocation-free; use [`LeaderEpoch::is_defined`]
//! and [`LogOffset::is_defined`] at the boundaries where it matters.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

// ============================================================================
// Leader Epoch - Copy (4-byte value)
// ============================================================================

/// Monotonically increasing leadership term for a partition.
///
/// An epoch identifies the period during which one replica is the leader.
/// Epochs only increase, never decrease. When leadership changes, the
/// controller hands the partition a higher epoch.
///
/// # Invariants
///
/// - Epochs recorded for a partition strictly increase over time
/// - A record stamped with a lower epoch than the latest recorded one is
///   stale and must not rewrite history
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LeaderEpoch(i32);

impl LeaderEpoch {
    /// Sentinel meaning "no epoch": returned by queries with no applicable
    /// entry and carried by requests that do not name an epoch.
    pub const UNDEFINED: LeaderEpoch = LeaderEpoch(-1);

    /// Creates a new leader epoch.
    pub fn new(epoch: i32) -> Self {
        debug_assert!(epoch >= 0, "leader epoch cannot be negative");
        Self(epoch)
    }

    /// Returns the epoch as an `i32`.
    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Returns `true` unless this is the [`Self::UNDEFINED`] sentinel.
    pub fn is_defined(&self) -> bool {
        self.0 >= 0
    }
}

impl Display for LeaderEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for LeaderEpoch {
    fn from(epoch: i32) -> Self {
        Self::new(epoch)
    }
}

impl From<LeaderEpoch> for i32 {
    fn from(epoch: LeaderEpoch) -> Self {
        epoch.0
    }
}

// ============================================================================
// Log Offset - Copy (8-byte value)
// ============================================================================

/// Position of a record within a partition's log.
///
/// Offsets are zero-indexed and sequential. The log-end offset (LEO) is the
/// offset the next appended record will receive.
///
/// Uses `i64` internally so the `-1` sentinel and wire formats that carry
/// signed offsets round-trip without conversion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogOffset(i64);

impl LogOffset {
    /// Sentinel meaning "no offset".
    pub const UNDEFINED: LogOffset = LogOffset(-1);

    /// The first offset in a log.
    pub const ZERO: LogOffset = LogOffset(0);

    /// Creates a new log offset.
    pub fn new(offset: i64) -> Self {
        debug_assert!(offset >= 0, "log offset cannot be negative");
        Self(offset)
    }

    /// Returns the offset as an `i64`.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns `true` unless this is the [`Self::UNDEFINED`] sentinel.
    pub fn is_defined(&self) -> bool {
        self.0 >= 0
    }
}

impl Display for LogOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for LogOffset {
    fn from(offset: i64) -> Self {
        Self::new(offset)
    }
}

impl From<LogOffset> for i64 {
    fn from(offset: LogOffset) -> Self {
        offset.0
    }
}

// ============================================================================
// Epoch Entry - Copy (12-byte value pair)
// ============================================================================

/// One entry in a partition's epoch history: an epoch and the offset of the
/// first record written while that epoch was current.
///
/// Entries are value objects with structural equality. The end of an epoch's
/// range is not stored; it is derived from the next entry's start offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpochEntry {
    /// The leadership term.
    pub epoch: LeaderEpoch,

    /// Offset of the first record produced under `epoch`.
    pub start_offset: LogOffset,
}

impl EpochEntry {
    /// Creates a new epoch entry.
    pub fn new(epoch: LeaderEpoch, start_offset: LogOffset) -> Self {
        Self {
            epoch,
            start_offset,
        }
    }
}

impl Display for EpochEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EpochEntry(epoch={}, start_offset={})",
            self.epoch, self.start_offset
        )
    }
}

// ============================================================================
// Topic Partition - Clone (contains String, cloned rarely)
// ============================================================================

/// The addressing unit a single partition-scoped component serves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    topic: String,
    partition: u32,
}

impl TopicPartition {
    /// Creates a new topic-partition address.
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    /// Returns the topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the partition index within the topic.
    pub fn partition(&self) -> u32 {
        self.partition
    }
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

#[cfg(test)]
mod tests;
