pub mod b_plus_tree;
pub mod btree_iterator;
pub mod btree_page;
pub mod key_comparator;
pub mod transaction;

pub use b_plus_tree::BPlusTree;
pub use btree_iterator::BTreeIterator;
pub use btree_page::{
    BTreePageMut, BTreePageRef, BTreePageType, InternalNodeMut, InternalNodeRef, LeafNodeMut,
    LeafNodeRef,
};
pub use key_comparator::{IntegerComparator, KeyComparator, ReverseComparator};
pub use transaction::Transaction;
