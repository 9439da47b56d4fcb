// Integration tests for the store's LRU discipline and capacity accounting.
//
// Coverage mirrors the engine's observable invariants:
//   - search always lands on a key-equal object, promoted by at most one
//   - the byte budget is conserved across every mutation path
//   - position-control operations (swap vs move) differ as designed
//   - prefetch orders ascending by last_access and is stable

use rapto::object::{Field, Object};
use rapto::store::{Store, StoreError};

fn live_bytes(s: &Store) -> u64 {
    s.iter().map(Object::size).sum()
}

fn assert_conserved(s: &Store) {
    assert_eq!(
        live_bytes(s) + s.cap_remaining(),
        s.capacity(),
        "capacity accounting drifted"
    );
}

#[test]
fn search_hits_key_equal_object_one_position_hotter() {
    let mut s = Store::new("t", 1 << 16);
    let keys: Vec<Vec<u8>> = (0..10).map(|i| format!("key-{i}").into_bytes()).collect();
    for k in &keys {
        s.put(k, Field::Integer(1)).unwrap();
    }

    for k in &keys {
        let before = (0..s.len()).find(|&i| s.at(i).key == *k).unwrap();
        let after = s.search(k).expect("present key must be found");
        assert_eq!(s.at(after).key, *k);
        if before + 1 < s.len() {
            assert_eq!(after, before + 1, "hit must move exactly one position hotter");
        } else {
            assert_eq!(after, before, "hot-most element must stay in place");
        }
    }
}

#[test]
fn repeated_get_on_hot_most_key_is_stable() {
    let mut s = Store::new("t", 1 << 16);
    s.put(b"cold", Field::Integer(0)).unwrap();
    s.put(b"hot", Field::Integer(1)).unwrap();
    let idx = s.search(b"hot").unwrap();
    for _ in 0..5 {
        assert_eq!(s.search(b"hot"), Some(idx));
    }
}

#[test]
fn long_keys_use_the_hash_gate_and_still_match() {
    let mut s = Store::new("t", 1 << 16);
    let long_a = vec![b'a'; 40];
    let mut long_b = long_a.clone();
    *long_b.last_mut().unwrap() = b'b';
    s.put(&long_a, Field::Integer(1)).unwrap();
    s.put(&long_b, Field::Integer(2)).unwrap();
    let i = s.search(&long_a).unwrap();
    assert_eq!(s.at(i).key, long_a);
}

#[test]
fn budget_is_conserved_across_mutations() {
    let mut s = Store::new("t", 1 << 16);
    s.put(b"a", Field::Integer(1)).unwrap();
    assert_conserved(&s);
    s.put(b"b", Field::String(b"some value".to_vec())).unwrap();
    assert_conserved(&s);
    // Different-type replacement credits the old size and debits the new.
    s.put(b"b", Field::Integer(2)).unwrap();
    assert_conserved(&s);
    s.rename(b"b", b"b-with-longer-name").unwrap();
    assert_conserved(&s);
    s.remove(b"a").unwrap();
    assert_conserved(&s);
    s.clear();
    assert_conserved(&s);
}

#[test]
fn exhausted_budget_fails_and_leaves_store_intact() {
    let mut s = Store::new("t", 60);
    s.put(b"a", Field::Integer(1)).unwrap(); // 27 bytes
    s.put(b"b", Field::Integer(2)).unwrap(); // 27 bytes, 6 left
    let snapshot_len = s.len();
    let snapshot_rem = s.cap_remaining();
    assert_eq!(
        s.put(b"c", Field::Integer(3)),
        Err(StoreError::ExceededSpaceLimit)
    );
    assert_eq!(s.len(), snapshot_len);
    assert_eq!(s.cap_remaining(), snapshot_rem);
    assert_conserved(&s);
}

#[test]
fn different_type_replacement_fails_cleanly_when_too_big() {
    let mut s = Store::new("t", 40);
    s.put(b"k", Field::Integer(1)).unwrap(); // 27 bytes, 13 left
    let err = s
        .put(b"k", Field::String(vec![b'x'; 64]))
        .expect_err("replacement must not fit");
    assert_eq!(err, StoreError::ExceededSpaceLimit);
    // The original object survives untouched.
    let i = s.search(b"k").unwrap();
    assert_eq!(s.at(i).field, Field::Integer(1));
    assert_conserved(&s);
}

#[test]
fn insert_object_replaces_same_key() {
    let mut s = Store::new("t", 1 << 16);
    s.put(b"k", Field::Integer(1)).unwrap();
    let replacement = Object::new(b"k".to_vec(), Field::String(b"fresh".to_vec()));
    s.insert_object(replacement).unwrap();
    assert_eq!(s.len(), 1);
    let i = s.search(b"k").unwrap();
    assert_eq!(s.at(i).field, Field::String(b"fresh".to_vec()));
    assert_conserved(&s);
}

#[test]
fn swap_breaks_order_move_preserves_remainder() {
    let mut s = Store::new("t", 1 << 16);
    for k in [&b"a"[..], b"b", b"c", b"d", b"e"] {
        s.put(k, Field::Integer(0)).unwrap();
    }
    // cold→hot: a b c d e
    s.swap_with_tail(b"d").unwrap();
    // cold→hot: d b c a e  — b and c untouched, a displaced.
    assert_eq!(s.at(0).key, b"d");
    assert_eq!(s.at(3).key, b"a");

    let mut s = Store::new("t", 1 << 16);
    for k in [&b"a"[..], b"b", b"c", b"d", b"e"] {
        s.put(k, Field::Integer(0)).unwrap();
    }
    s.move_to_tail(b"d").unwrap();
    // cold→hot: d a b c e — relative order of the rest preserved.
    let order: Vec<&[u8]> = s.iter().map(|o| o.key.as_slice()).collect();
    assert_eq!(order, vec![b"d".as_slice(), b"a", b"b", b"c", b"e"]);
}

#[test]
fn prefetch_is_stable_for_equal_timestamps() {
    let mut s = Store::new("t", 1 << 16);
    for k in [&b"first"[..], b"second", b"third"] {
        s.put(k, Field::Integer(0)).unwrap();
    }
    let stamp = 1_000_000;
    for i in 0..s.len() {
        s.at_mut(i).metadata.last_access = stamp;
    }
    s.prefetch();
    let order: Vec<&[u8]> = s.iter().map(|o| o.key.as_slice()).collect();
    assert_eq!(order, vec![b"first".as_slice(), b"second", b"third"]);
}

#[test]
fn get_bumps_metadata_search_does_not() {
    let mut s = Store::new("t", 1 << 16);
    s.put(b"k", Field::Integer(1)).unwrap();
    let i = s.search(b"k").unwrap();
    assert_eq!(s.at(i).metadata.access_times, 1);
    s.get(b"k").unwrap();
    let i = s.search(b"k").unwrap();
    assert_eq!(s.at(i).metadata.access_times, 2);
}
