//! Round trips across the serviceable range of a store.

use whw_runtime::BindingMode;
use whw_tests::Harness;

const TAIL: u32 = 64;
const EXTENT: u32 = 1024;

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn tail_only_round_trips() {
    let mut h = Harness::new(TAIL);
    for (offset, len) in [(0, 1), (0, 64), (10, 20), (63, 1)] {
        let data = pattern(len, offset as u8);
        assert_eq!(h.put(offset, &data), len as i32);
        assert_eq!(h.get(offset, len), Ok(data), "offset {offset} len {len}");
    }
}

#[test]
fn extent_only_round_trips() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, EXTENT);
    let end = TAIL + EXTENT;
    for (offset, len) in [(TAIL, 1), (TAIL + 100, 300), (end - 1, 1), (TAIL, EXTENT as usize)] {
        let data = pattern(len, 7);
        assert_eq!(h.put(offset, &data), len as i32);
        assert_eq!(h.get(offset, len), Ok(data), "offset {offset} len {len}");
    }
}

#[test]
fn last_write_wins() {
    let mut h = Harness::new(TAIL);
    assert_eq!(h.put(4, b"first"), 5);
    assert_eq!(h.put(4, b"again"), 5);
    assert_eq!(h.get(4, 5), Ok(b"again".to_vec()));
}

#[test]
fn adjacent_ranges_do_not_disturb_each_other() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, EXTENT);
    assert_eq!(h.put(50, &[0xAA; 30]), 30);
    assert_eq!(h.put(80, &[0xBB; 30]), 30);
    assert_eq!(h.put(20, &[0xCC; 30]), 30);

    assert_eq!(h.get(50, 30), Ok(vec![0xAA; 30]));
    assert_eq!(h.get(80, 30), Ok(vec![0xBB; 30]));
    assert_eq!(h.get(20, 30), Ok(vec![0xCC; 30]));
}

#[test]
fn unwritten_bytes_read_as_zero() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, EXTENT);
    assert_eq!(h.get(0, 16), Ok(vec![0; 16]));
    assert_eq!(h.get(TAIL + 500, 16), Ok(vec![0; 16]));
}

#[test]
fn zero_length_transfers_succeed_anywhere_in_range() {
    let mut h = Harness::new(TAIL);
    assert_eq!(h.write(0, TAIL, 0), 0);
    assert_eq!(h.read(1, 0, 0), 0);
}

#[test]
fn success_returns_exactly_size() {
    let mut h = Harness::with_extent(BindingMode::Minimal, TAIL, EXTENT);
    for size in [1u32, 2, 17, 64, 65, 512] {
        h.place(h.buffer(0), &pattern(size as usize, 1));
        assert_eq!(h.write(0, 3, size), size as i32);
        assert_eq!(h.read(1, 3, size), size as i32);
    }
}
