//! Transfers that cross the tail/extent boundary.

use whw_runtime::{header_size, BindingMode, RandomAccessHeader};
use whw_tests::Harness;

const TAIL: u32 = 16;

#[test]
fn straddling_write_splits_at_the_tail_end() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, 256);
    assert_eq!(h.put(10, b"ABCDEFGHIJKL"), 12);

    // First six bytes in the tail, the rest at the start of the extent.
    assert_eq!(h.bytes(h.tail_addr() + 10, 6), b"ABCDEF");
    assert_eq!(&h.instance.backing().as_slice()[..6], b"GHIJKL");

    assert_eq!(h.get(10, 12), Ok(b"ABCDEFGHIJKL".to_vec()));
}

#[test]
fn partial_reads_of_a_straddling_write() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, 256);
    assert_eq!(h.put(10, b"ABCDEFGHIJKL"), 12);
    assert_eq!(h.get(10, 6), Ok(b"ABCDEF".to_vec()));
    assert_eq!(h.get(16, 6), Ok(b"GHIJKL".to_vec()));
    assert_eq!(h.get(14, 4), Ok(b"EFGH".to_vec()));
}

#[test]
fn write_ending_exactly_at_tail_end_stays_in_tail() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, 256);
    assert_eq!(h.put(8, b"12345678"), 8);
    assert!(h.instance.backing().is_empty());
}

#[test]
fn transfers_leave_the_header_alone() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, 256);
    let formatted = h.bytes(h.base, header_size());
    assert_eq!(h.put(10, b"ABCDEFGHIJKL"), 12);
    assert_eq!(h.put(100, b"xy"), 2);
    assert_eq!(h.get(20, 1), Ok(vec![0]));

    assert_eq!(h.bytes(h.base, header_size()), formatted);
    let header = RandomAccessHeader::load(&h.memory, h.base as usize).unwrap();
    assert_eq!(header, RandomAccessHeader::formatted(0, 256));
}
