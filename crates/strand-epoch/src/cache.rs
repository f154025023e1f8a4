//! Per-partition leader epoch cache.
//!
//! The cache keeps an ordered history of `(epoch, start_offset)` entries and
//! answers the replication layer's truncation and end-offset queries. Every
//! mutation is written through to the checkpoint file before the operation
//! returns, so the on-disk history never lags the in-memory one by more than
//! one failed write.
//!
//! # Invariants
//!
//! After every operation:
//!
//! - Epochs strictly increase along the history
//! - Start offsets are non-decreasing along the history
//! - No two entries share an epoch
//! - A proposed-but-unflushed epoch never appears in the history
//!
//! # Leader-side assignment
//!
//! When a replica becomes leader at epoch E, the epoch's start offset is not
//! known until the first message is appended under it. The cache stages the
//! epoch as a proposal and binds the offset at flush time:
//!
//! ```text
//! propose_leader_epoch_change(E)      <- leadership change
//!         │
//!         ▼
//! epoch_for_leader_message_append()   <- stamps outgoing records with E
//!         │
//!         ▼
//! maybe_flush_uncommitted_epochs()    <- first append: records (E, LEO)
//! ```

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use strand_types::{EpochEntry, LeaderEpoch, LogOffset, TopicPartition};
use tracing::{debug, warn};

use crate::checkpoint::EpochCheckpointFile;
use crate::error::{EpochError, Result};

// ============================================================================
// Log End Offset Source
// ============================================================================

/// Capability supplied by the enclosing log: the current log-end offset.
///
/// Invoked while the cache holds its lock, so implementations must be
/// non-blocking and side-effect-free; they may be called arbitrarily often.
pub trait LogEndOffsetSource: Send + Sync {
    /// Returns the offset the next appended record would receive.
    fn log_end_offset(&self) -> LogOffset;
}

impl<F> LogEndOffsetSource for F
where
    F: Fn() -> LogOffset + Send + Sync,
{
    fn log_end_offset(&self) -> LogOffset {
        self()
    }
}

// ============================================================================
// Proposal state machine
// ============================================================================

/// Pending leader-side epoch assignment awaiting its first appended record.
///
/// Two states only; successive proposals overwrite each other, so there is
/// never more than one uncommitted epoch to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EpochProposal {
    /// No leadership change is pending.
    #[default]
    None,

    /// A leadership change to this epoch is pending its first append.
    Proposed(LeaderEpoch),
}

// ============================================================================
// Cache state (everything behind the lock)
// ============================================================================

#[derive(Debug, Default)]
struct CacheState {
    /// Committed history, ordered by epoch.
    entries: Vec<EpochEntry>,

    /// Uncommitted proposed epoch, if any. Never visible in `entries`.
    proposal: EpochProposal,
}

impl CacheState {
    fn latest_epoch(&self) -> LeaderEpoch {
        self.entries
            .last()
            .map(|e| e.epoch)
            .unwrap_or(LeaderEpoch::UNDEFINED)
    }

    /// Appends `entry` if it preserves the history invariants.
    ///
    /// Returns `false` without mutating when the entry must be ignored: an
    /// epoch at or below the latest recorded one (history is never
    /// rewritten), or a start offset below the latest recorded one.
    fn try_append(&mut self, entry: EpochEntry) -> bool {
        if let Some(last) = self.entries.last() {
            if entry.epoch <= last.epoch || entry.start_offset < last.start_offset {
                return false;
            }
        }
        self.entries.push(entry);

        debug_assert!(self.is_consistent(), "epoch history invariant violated");
        true
    }

    fn is_consistent(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].epoch < w[1].epoch && w[0].start_offset <= w[1].start_offset)
    }
}

// ============================================================================
// Leader Epoch Cache
// ============================================================================

/// Per-partition, durable, in-memory mapping of leader epochs to the offsets
/// at which each epoch first produced data.
///
/// All public operations acquire one exclusive lock for their full duration,
/// checkpoint write included. Mutations on one partition are therefore
/// totally ordered; no ordering is guaranteed between partitions.
pub struct LeaderEpochCache {
    partition: TopicPartition,
    log_end_offset: Box<dyn LogEndOffsetSource>,
    checkpoint: EpochCheckpointFile,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for LeaderEpochCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderEpochCache")
            .field("partition", &self.partition)
            .field("checkpoint", &self.checkpoint)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl LeaderEpochCache {
    /// Opens the cache for a partition, loading any persisted history.
    ///
    /// # Errors
    ///
    /// - [`EpochError::Io`] if the checkpoint cannot be read
    /// - [`EpochError::CorruptCheckpoint`] if it exists but is malformed
    ///
    /// Either failure is fatal to construction: a partition whose epoch
    /// history cannot be loaded cannot safely participate in replication.
    pub fn open(
        partition: TopicPartition,
        log_end_offset: impl LogEndOffsetSource + 'static,
        checkpoint_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let checkpoint = EpochCheckpointFile::new(checkpoint_path);
        let entries = checkpoint.read()?;

        let state = CacheState {
            entries,
            proposal: EpochProposal::None,
        };
        debug_assert!(state.is_consistent(), "persisted epoch history is inconsistent");

        debug!(
            partition = %partition,
            entries = state.entries.len(),
            "loaded leader epoch history"
        );

        Ok(Self {
            partition,
            log_end_offset: Box::new(log_end_offset),
            checkpoint,
            state: Mutex::new(state),
        })
    }

    /// Returns the partition this cache serves.
    pub fn partition(&self) -> &TopicPartition {
        &self.partition
    }

    // ------------------------------------------------------------------------
    // Follower path: direct assignment
    // ------------------------------------------------------------------------

    /// Records that `epoch` first produced data at `start_offset`.
    ///
    /// The entry is ignored (and nothing is persisted) when it would rewrite
    /// history: an epoch at or below the latest recorded one, or a start
    /// offset below the latest recorded one. An epoch's start offset is
    /// fixed the first time it is seen.
    ///
    /// # Errors
    ///
    /// - [`EpochError::InvalidArgument`] if `epoch` or `start_offset` is
    ///   negative
    /// - [`EpochError::Io`] if the checkpoint write fails; the in-memory
    ///   change has already taken effect, and the next successful mutation
    ///   rewrites the full file
    pub fn assign(&self, epoch: LeaderEpoch, start_offset: LogOffset) -> Result<()> {
        if !epoch.is_defined() || !start_offset.is_defined() {
            return Err(EpochError::InvalidArgument(format!(
                "assign requires a non-negative epoch and offset, got epoch={epoch} start_offset={start_offset}"
            )));
        }

        let mut state = self.locked();
        if state.try_append(EpochEntry::new(epoch, start_offset)) {
            debug!(
                partition = %self.partition,
                epoch = epoch.as_i32(),
                start_offset = start_offset.as_i64(),
                "assigned leader epoch"
            );
            self.persist(&state)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Returns the latest recorded epoch, or [`LeaderEpoch::UNDEFINED`] if
    /// the history is empty.
    pub fn latest_epoch(&self) -> LeaderEpoch {
        self.locked().latest_epoch()
    }

    /// Returns the offset that marks the end of data for `requested_epoch`.
    ///
    /// - The latest recorded epoch is still open-ended: it answers with the
    ///   live log-end offset.
    /// - A non-latest recorded epoch answers with the next recorded epoch's
    ///   start offset. So does an unrecorded epoch between two recorded
    ///   ones: an epoch the cache never saw produced no records, and its
    ///   range ends where the following recorded epoch begins.
    /// - Everything else ([`LeaderEpoch::UNDEFINED`], empty history, epochs
    ///   before the earliest or after the latest entry) answers
    ///   [`LogOffset::UNDEFINED`].
    pub fn end_offset_for(&self, requested_epoch: LeaderEpoch) -> LogOffset {
        if !requested_epoch.is_defined() {
            return LogOffset::UNDEFINED;
        }

        let state = self.locked();
        let (Some(first), Some(last)) = (state.entries.first(), state.entries.last()) else {
            return LogOffset::UNDEFINED;
        };

        if requested_epoch < first.epoch || requested_epoch > last.epoch {
            return LogOffset::UNDEFINED;
        }
        if requested_epoch == last.epoch {
            return self.log_end_offset.log_end_offset();
        }

        // Smallest recorded epoch strictly greater than the requested one.
        let next = state
            .entries
            .partition_point(|e| e.epoch <= requested_epoch);

        debug_assert!(next < state.entries.len(), "latest epoch handled above");
        state.entries[next].start_offset
    }

    /// Returns a stable snapshot of the current history.
    pub fn entries(&self) -> Vec<EpochEntry> {
        self.locked().entries.clone()
    }

    /// Returns `true` if no epoch has been recorded.
    pub fn is_empty(&self) -> bool {
        self.locked().entries.is_empty()
    }

    /// Returns the earliest recorded entry, if any.
    pub fn earliest_entry(&self) -> Option<EpochEntry> {
        self.locked().entries.first().copied()
    }

    /// Returns the latest recorded entry, if any.
    pub fn latest_entry(&self) -> Option<EpochEntry> {
        self.locked().entries.last().copied()
    }

    /// Returns the largest recorded epoch strictly below `epoch`, or
    /// [`LeaderEpoch::UNDEFINED`] if there is none.
    ///
    /// Used when walking divergence backwards through history one epoch at
    /// a time.
    pub fn previous_epoch(&self, epoch: LeaderEpoch) -> LeaderEpoch {
        let state = self.locked();
        let below = state.entries.partition_point(|e| e.epoch < epoch);
        match below {
            0 => LeaderEpoch::UNDEFINED,
            _ => state.entries[below - 1].epoch,
        }
    }

    /// Returns the epoch whose range contains `offset`.
    ///
    /// The range of an entry runs from its start offset up to the next
    /// entry's start offset; the latest entry's range is open-ended.
    /// Answers [`LeaderEpoch::UNDEFINED`] for offsets before the earliest
    /// entry, for an empty history, and for [`LogOffset::UNDEFINED`].
    pub fn epoch_for_offset(&self, offset: LogOffset) -> LeaderEpoch {
        if !offset.is_defined() {
            return LeaderEpoch::UNDEFINED;
        }

        let state = self.locked();
        let above = state.entries.partition_point(|e| e.start_offset <= offset);
        match above {
            0 => LeaderEpoch::UNDEFINED,
            _ => state.entries[above - 1].epoch,
        }
    }

    // ------------------------------------------------------------------------
    // Truncation
    // ------------------------------------------------------------------------

    /// Truncates history from the head after the log-start offset advanced
    /// past historical data.
    ///
    /// Entries entirely below `offset` are dropped, except that the entry
    /// straddling `offset` is retained with its start offset advanced to
    /// `offset` (the data at the old start is gone). The latest entry is
    /// always preserved. No-op for [`LogOffset::UNDEFINED`], an empty
    /// history, or an offset at or below the earliest start offset.
    ///
    /// # Errors
    ///
    /// Returns [`EpochError::Io`] if the checkpoint write fails.
    pub fn clear_earliest(&self, offset: LogOffset) -> Result<()> {
        if !offset.is_defined() {
            return Ok(());
        }

        let mut state = self.locked();
        let Some(first) = state.entries.first() else {
            return Ok(());
        };
        if offset <= first.start_offset {
            return Ok(());
        }

        // Largest index whose entry starts at or below the cut. At least
        // index 0 qualifies since first.start_offset < offset.
        let straddler = state.entries.partition_point(|e| e.start_offset <= offset) - 1;
        state.entries.drain(..straddler);

        let head = state.entries[0];
        if head.start_offset < offset {
            state.entries[0] = EpochEntry::new(head.epoch, offset);
        }

        debug_assert!(state.is_consistent(), "epoch history invariant violated");
        debug!(
            partition = %self.partition,
            offset = offset.as_i64(),
            retained = state.entries.len(),
            "truncated epoch history from start"
        );
        self.persist(&state)
    }

    /// Truncates history from the tail after the log lost its suffix from
    /// `offset` onwards (unclean leader truncation, follower divergence).
    ///
    /// Removes every entry whose start offset is at or beyond `offset`;
    /// truncation is inclusive of an entry that begins exactly at the cut
    /// point. No-op for [`LogOffset::UNDEFINED`] or an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`EpochError::Io`] if the checkpoint write fails.
    pub fn clear_latest(&self, offset: LogOffset) -> Result<()> {
        if !offset.is_defined() {
            return Ok(());
        }

        let mut state = self.locked();
        if state.entries.is_empty() {
            return Ok(());
        }

        let cut = state.entries.partition_point(|e| e.start_offset < offset);
        if cut == state.entries.len() {
            return Ok(());
        }
        state.entries.truncate(cut);

        debug!(
            partition = %self.partition,
            offset = offset.as_i64(),
            retained = state.entries.len(),
            "truncated epoch history from end"
        );
        self.persist(&state)
    }

    /// Removes all entries and persists an empty history.
    ///
    /// Used when the partition's log is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`EpochError::Io`] if the checkpoint write fails.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.locked();
        state.entries.clear();
        self.persist(&state)
    }

    // ------------------------------------------------------------------------
    // Leader path: two-phase epoch assignment
    // ------------------------------------------------------------------------

    /// Stages a leadership change to `epoch`.
    ///
    /// The proposal is ignored unless `epoch` is above the latest recorded
    /// epoch; epochs never go backwards, even as proposals. Successive
    /// proposals overwrite the pending one; only the most recent wins until
    /// flush. The proposed epoch does not appear in the committed history
    /// until [`Self::maybe_flush_uncommitted_epochs`] runs.
    pub fn propose_leader_epoch_change(&self, epoch: LeaderEpoch) {
        let mut state = self.locked();
        if epoch > state.latest_epoch() {
            state.proposal = EpochProposal::Proposed(epoch);
            debug!(
                partition = %self.partition,
                epoch = epoch.as_i32(),
                "staged leader epoch proposal"
            );
        } else {
            warn!(
                partition = %self.partition,
                epoch = epoch.as_i32(),
                latest = state.latest_epoch().as_i32(),
                "ignoring leader epoch proposal that does not advance the latest epoch"
            );
        }
    }

    /// Returns the epoch to stamp on records the leader is about to append.
    ///
    /// The proposed epoch if one is pending, otherwise the latest recorded
    /// epoch. Does not commit the proposal.
    pub fn epoch_for_leader_message_append(&self) -> LeaderEpoch {
        let state = self.locked();
        match state.proposal {
            EpochProposal::Proposed(epoch) => epoch,
            EpochProposal::None => state.latest_epoch(),
        }
    }

    /// Commits a pending proposal, binding it to the current log-end offset.
    ///
    /// Called by the log append path once the first message under the new
    /// epoch is written. The entry `(epoch, log_end_offset)` goes through
    /// the standard [`Self::assign`] rules; if those reject it the proposal
    /// is discarded anyway, since the stamp has already been applied to
    /// appended records and no further action on it is meaningful.
    ///
    /// No-op when nothing is proposed.
    ///
    /// # Errors
    ///
    /// Returns [`EpochError::Io`] if the checkpoint write fails.
    pub fn maybe_flush_uncommitted_epochs(&self) -> Result<()> {
        let mut state = self.locked();
        let EpochProposal::Proposed(epoch) = state.proposal else {
            return Ok(());
        };
        state.proposal = EpochProposal::None;

        let log_end_offset = self.log_end_offset.log_end_offset();
        debug_assert!(
            log_end_offset.is_defined(),
            "log end offset source returned the undefined sentinel"
        );

        if state.try_append(EpochEntry::new(epoch, log_end_offset)) {
            debug!(
                partition = %self.partition,
                epoch = epoch.as_i32(),
                start_offset = log_end_offset.as_i64(),
                "flushed proposed leader epoch"
            );
            self.persist(&state)
        } else {
            warn!(
                partition = %self.partition,
                epoch = epoch.as_i32(),
                log_end_offset = log_end_offset.as_i64(),
                "discarding proposed leader epoch rejected by the history rules"
            );
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn locked(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().expect("leader epoch cache lock poisoned")
    }

    /// Writes the full history through to the checkpoint.
    fn persist(&self, state: &CacheState) -> Result<()> {
        self.checkpoint.write(&state.entries)
    }
}
