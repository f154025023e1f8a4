//! strand-epoch: Per-partition leader epoch cache for Strand
//!
//! This crate tracks the mapping between leader epochs and the log offsets
//! at which each epoch first produced data. The replication layer consults
//! it to detect and truncate divergent log suffixes after leadership
//! changes, and to answer "what was the last offset written under epoch E?".
//!
//! # Components
//!
//! - [`LeaderEpochCache`]: the in-memory epoch history with query, assign,
//!   and truncation operations. One cache per partition.
//! - [`EpochCheckpointFile`]: durable text checkpoint the cache writes
//!   through on every mutation.
//! - [`LogEndOffsetSource`]: capability supplied by the enclosing log that
//!   yields the current log-end offset on demand.
//!
//! # Checkpoint File Format
//!
//! LF-terminated ASCII text:
//!
//! ```text
//! 0              <- format version
//! 2              <- entry count
//! 1 100          <- epoch, start offset
//! 2 200
//! ```
//!
//! # Concurrency
//!
//! All public cache operations serialize under one exclusive lock, including
//! the checkpoint write on mutating paths. The on-disk file never lags the
//! in-memory history by more than one failed write.

// Modules
mod cache;
mod checkpoint;
mod error;

// Re-exports
pub use cache::{LeaderEpochCache, LogEndOffsetSource};
pub use checkpoint::{EpochCheckpointFile, LEADER_EPOCH_CHECKPOINT_FILENAME};
pub use error::{EpochError, Result};
