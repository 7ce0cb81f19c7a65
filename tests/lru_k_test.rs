//! Integration tests for the LRU-K replacer

use burrow::buffer::LruKReplacer;
use burrow::common::FrameId;

#[test]
fn test_lru_k_eviction_order() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..5 {
        replacer.record_access(FrameId::new(i));
        replacer.set_evictable(FrameId::new(i), true);
    }

    assert_eq!(replacer.size(), 5);

    // All frames have a single access, so all have an infinite k-distance;
    // the earliest first access is evicted first
    for i in 0..5 {
        assert_eq!(replacer.evict(), Some(FrameId::new(i)));
    }

    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_interleaved_scenario() {
    // Accesses A,B,A,B,C with k=2: C is the only frame with fewer than two
    // accesses, so it is the first victim. Once C reaches two accesses the
    // victim is the frame whose 2nd-most-recent access is oldest.
    let replacer = LruKReplacer::new(2, 10);
    let (a, b, c) = (FrameId::new(0), FrameId::new(1), FrameId::new(2));

    replacer.record_access(a);
    replacer.record_access(b);
    replacer.record_access(a);
    replacer.record_access(b);
    replacer.record_access(c);

    for f in [a, b, c] {
        replacer.set_evictable(f, true);
    }

    assert_eq!(replacer.evict(), Some(c));

    replacer.record_access(c);
    replacer.record_access(c);
    replacer.set_evictable(c, true);

    assert_eq!(replacer.evict(), Some(a));
    assert_eq!(replacer.evict(), Some(b));
    assert_eq!(replacer.evict(), Some(c));
}

#[test]
fn test_lru_k_size_tracks_evictable_frames() {
    let replacer = LruKReplacer::new(3, 10);

    for i in 0..6 {
        replacer.record_access(FrameId::new(i));
    }
    assert_eq!(replacer.size(), 0);

    for i in 0..6 {
        replacer.set_evictable(FrameId::new(i), true);
        assert_eq!(replacer.size(), (i + 1) as usize);
    }

    replacer.set_evictable(FrameId::new(0), false);
    replacer.set_evictable(FrameId::new(1), false);
    assert_eq!(replacer.size(), 4);

    replacer.remove(FrameId::new(2));
    assert_eq!(replacer.size(), 3);

    assert!(replacer.evict().is_some());
    assert_eq!(replacer.size(), 2);
}

#[test]
fn test_lru_k_pinned_frames_never_evicted() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(2));

    replacer.set_evictable(FrameId::new(1), true);
    replacer.set_evictable(FrameId::new(2), true);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_history_cap() {
    let replacer = LruKReplacer::new(2, 10);

    // Frame 0 is accessed many times, frame 1 twice but more recently
    for _ in 0..10 {
        replacer.record_access(FrameId::new(0));
    }
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(1));

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);

    // Only the last k accesses count, and frame 0's are older
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
}

#[test]
fn test_lru_k_concurrent_access() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(2, 100));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25 {
                    let frame_id = FrameId::new((t * 25 + i) as u32);
                    replacer.record_access(frame_id);
                    replacer.set_evictable(frame_id, true);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);

    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
}
