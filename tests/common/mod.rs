#![allow(dead_code)]

use std::sync::Arc;

use burrow::buffer::BufferPoolManager;
use burrow::common::{IndexKey, PageId, INVALID_PAGE_ID};
use burrow::index::{BTreePageRef, InternalNodeRef, LeafNodeRef};

/// Walks the whole tree checking structural invariants, then follows the
/// leaf chain and returns every key in order. Intended for quiescent
/// trees (no concurrent writers).
pub fn check_tree_invariants(bpm: &Arc<BufferPoolManager>, root: PageId) -> Vec<IndexKey> {
    if root == INVALID_PAGE_ID {
        return Vec::new();
    }

    let mut leftmost_leaf = None;
    check_node(bpm, root, INVALID_PAGE_ID, None, None, &mut leftmost_leaf);

    let mut keys = Vec::new();
    let mut page_id = leftmost_leaf.expect("non-empty tree has a leftmost leaf");
    while page_id != INVALID_PAGE_ID {
        let guard = bpm.checked_read_page(page_id).unwrap().unwrap();
        let leaf = LeafNodeRef::new(guard.data());
        for i in 0..leaf.size() {
            keys.push(leaf.key_at(i));
        }
        page_id = leaf.next_page_id();
    }

    assert!(
        keys.windows(2).all(|w| w[0] < w[1]),
        "leaf chain keys are not strictly ascending"
    );
    keys
}

/// Checks one node and its subtree; returns the smallest key in the
/// subtree. Children are visited left to right, so the first leaf seen is
/// the leftmost.
fn check_node(
    bpm: &Arc<BufferPoolManager>,
    page_id: PageId,
    expected_parent: PageId,
    lower: Option<IndexKey>,
    upper: Option<IndexKey>,
    leftmost_leaf: &mut Option<PageId>,
) -> IndexKey {
    let guard = bpm.checked_read_page(page_id).unwrap().unwrap();
    let header = BTreePageRef::new(guard.data());
    assert_eq!(
        header.parent_page_id(),
        expected_parent,
        "parent pointer mismatch at {}",
        page_id
    );
    let is_root = expected_parent == INVALID_PAGE_ID;

    if header.is_leaf() {
        let leaf = LeafNodeRef::new(guard.data());
        assert!(leaf.size() <= leaf.max_size(), "oversized leaf {}", page_id);
        if !is_root {
            assert!(
                leaf.size() >= leaf.min_size(),
                "underfull leaf {} (size {})",
                page_id,
                leaf.size()
            );
        }
        if leftmost_leaf.is_none() {
            *leftmost_leaf = Some(page_id);
        }
        for i in 0..leaf.size() {
            let key = leaf.key_at(i);
            if let Some(lo) = lower {
                assert!(key >= lo, "key {} below subtree bound {}", key, lo);
            }
            if let Some(hi) = upper {
                assert!(key < hi, "key {} above subtree bound {}", key, hi);
            }
        }
        return leaf.key_at(0);
    }

    let node = InternalNodeRef::new(guard.data());
    assert!(node.size() <= node.max_size(), "oversized internal {}", page_id);
    if is_root {
        assert!(node.size() >= 2, "internal root with a single child");
    } else {
        assert!(
            node.size() >= node.min_size(),
            "underfull internal {} (size {})",
            page_id,
            node.size()
        );
    }

    let size = node.size();
    let children: Vec<PageId> = (0..size).map(|i| node.child_at(i)).collect();
    let keys: Vec<IndexKey> = (1..size).map(|i| node.key_at(i)).collect();
    assert!(
        keys.windows(2).all(|w| w[0] < w[1]),
        "internal keys not strictly ascending at {}",
        page_id
    );
    drop(guard);

    let mut smallest = 0;
    for i in 0..size {
        let lo = if i == 0 { lower } else { Some(keys[i - 1]) };
        let hi = if i + 1 < size { Some(keys[i]) } else { upper };
        let sub_smallest = check_node(bpm, children[i], page_id, lo, hi, leftmost_leaf);
        if i == 0 {
            smallest = sub_smallest;
        } else {
            assert_eq!(
                sub_smallest,
                keys[i - 1],
                "separator at slot {} of {} is not the smallest key of its subtree",
                i,
                page_id
            );
        }
    }
    smallest
}
