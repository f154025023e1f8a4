//! Unit tests for strand-types

use crate::{EpochEntry, LeaderEpoch, LogOffset, TopicPartition};

#[test]
fn leader_epoch_ordering() {
    let e1 = LeaderEpoch::new(1);
    let e2 = LeaderEpoch::new(2);
    assert!(e1 < e2);
    assert!(LeaderEpoch::UNDEFINED < e1);
}

#[test]
fn leader_epoch_sentinel_is_undefined() {
    assert!(!LeaderEpoch::UNDEFINED.is_defined());
    assert_eq!(LeaderEpoch::UNDEFINED.as_i32(), -1);
    assert!(LeaderEpoch::new(0).is_defined());
}

#[test]
fn log_offset_ordering() {
    assert!(LogOffset::ZERO < LogOffset::new(5));
    assert!(LogOffset::UNDEFINED < LogOffset::ZERO);
}

#[test]
fn log_offset_sentinel_is_undefined() {
    assert!(!LogOffset::UNDEFINED.is_defined());
    assert_eq!(LogOffset::UNDEFINED.as_i64(), -1);
    assert!(LogOffset::ZERO.is_defined());
}

#[test]
fn epoch_entry_structural_equality() {
    let a = EpochEntry::new(LeaderEpoch::new(2), LogOffset::new(6));
    let b = EpochEntry::new(LeaderEpoch::new(2), LogOffset::new(6));
    let c = EpochEntry::new(LeaderEpoch::new(2), LogOffset::new(7));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn epoch_entry_display() {
    let entry = EpochEntry::new(LeaderEpoch::new(3), LogOffset::new(11));
    assert_eq!(format!("{entry}"), "EpochEntry(epoch=3, start_offset=11)");
}

#[test]
fn topic_partition_display() {
    let tp = TopicPartition::new("orders", 7);
    assert_eq!(format!("{tp}"), "orders-7");
    assert_eq!(tp.topic(), "orders");
    assert_eq!(tp.partition(), 7);
}

#[test]
fn epoch_entry_serde_roundtrip() {
    let entry = EpochEntry::new(LeaderEpoch::new(4), LogOffset::new(42));
    let json = serde_json::to_string(&entry).unwrap();
    let back: EpochEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(entry, back);
}
