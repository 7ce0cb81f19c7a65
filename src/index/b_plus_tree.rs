use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::buffer::{BufferPoolManager, ReadPageGuard, WritePageGuard};
use crate::common::{
    BurrowError, IndexKey, PageId, RecordId, Result, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::{HeaderPage, HeaderPageRef};

use super::btree_iterator::BTreeIterator;
use super::btree_page::{
    BTreePageMut, BTreePageRef, InternalNodeMut, InternalNodeRef, LeafNodeMut, LeafNodeRef,
    INTERNAL_SLOT_CAPACITY, LEAF_SLOT_CAPACITY,
};
use super::key_comparator::KeyComparator;
use super::transaction::Transaction;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Operation {
    Insert,
    Remove,
}

/// Concurrent B+tree index over the buffer pool.
///
/// Descent uses latch crabbing: the default path takes read latches down
/// and write-latches only the leaf, restarting pessimistically (write
/// latches all the way, releasing above every safe node) when the leaf
/// turns out to need a split or merge. Page guards couple each latch with
/// a pin, so every latched page is pinned for exactly as long as it is
/// held.
///
/// The root's identity is guarded by a dedicated mutex and mirrored into
/// the header page, which is how the index finds its root after a restart.
pub struct BPlusTree<C: KeyComparator> {
    index_name: String,
    root_page_id: Mutex<PageId>,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<C: KeyComparator> BPlusTree<C> {
    /// Opens the index named `name`, creating its header record if this is
    /// the first time the name is seen. The tree itself stays empty until
    /// the first insert.
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        assert!(leaf_max_size >= 2 && leaf_max_size + 1 <= LEAF_SLOT_CAPACITY);
        assert!(internal_max_size >= 3 && internal_max_size + 1 <= INTERNAL_SLOT_CAPACITY);

        let index_name = name.into();
        let root = {
            let mut guard = bpm
                .checked_write_page(HEADER_PAGE_ID)?
                .ok_or(BurrowError::PageNotFound(HEADER_PAGE_ID))?;
            if HeaderPageRef::new(guard.data()).contains(&index_name) {
                HeaderPageRef::new(guard.data())
                    .get_root_id(&index_name)
                    .unwrap_or(INVALID_PAGE_ID)
            } else {
                let mut header = HeaderPage::new(guard.data_mut());
                if !header.insert_record(&index_name, INVALID_PAGE_ID) {
                    return Err(BurrowError::HeaderFull);
                }
                INVALID_PAGE_ID
            }
        };

        Ok(Self {
            index_name,
            root_page_id: Mutex::new(root),
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.lock() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.lock()
    }

    fn leaf_min(&self) -> usize {
        (self.leaf_max_size + 1) / 2
    }

    fn internal_min(&self) -> usize {
        (self.internal_max_size + 1) / 2
    }

    fn fetch_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        self.bpm
            .checked_read_page(page_id)?
            .ok_or(BurrowError::PageNotFound(page_id))
    }

    fn fetch_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        self.bpm
            .checked_write_page(page_id)?
            .ok_or(BurrowError::PageNotFound(page_id))
    }

    /// A node is safe when the pending operation cannot propagate past it.
    fn is_safe(&self, data: &[u8], op: Operation) -> bool {
        let header = BTreePageRef::new(data);
        let size = header.size();
        let is_root = header.parent_page_id() == INVALID_PAGE_ID;

        match op {
            Operation::Insert => {
                if header.is_leaf() {
                    size < self.leaf_max_size
                } else {
                    size < self.internal_max_size
                }
            }
            Operation::Remove => {
                let min = match (header.is_leaf(), is_root) {
                    (true, true) => 1,
                    (true, false) => self.leaf_min(),
                    (false, true) => 2,
                    (false, false) => self.internal_min(),
                };
                size > min
            }
        }
    }

    fn update_root_record(&self, root: PageId) -> Result<()> {
        let mut guard = self
            .bpm
            .checked_write_page(HEADER_PAGE_ID)?
            .ok_or(BurrowError::PageNotFound(HEADER_PAGE_ID))?;
        let mut header = HeaderPage::new(guard.data_mut());
        if !header.update_record(&self.index_name, root) {
            return Err(BurrowError::IndexNotFound(self.index_name.clone()));
        }
        Ok(())
    }

    /// Point lookup. Read-crabs from the root: the child is latched before
    /// the parent is released, so no reader ever observes a half-applied
    /// structural change.
    pub fn get_value(&self, key: IndexKey) -> Result<Option<RecordId>> {
        let root_latch = self.root_page_id.lock();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.fetch_read(*root_latch)?;
        drop(root_latch);

        loop {
            if BTreePageRef::new(guard.data()).is_leaf() {
                let leaf = LeafNodeRef::new(guard.data());
                return Ok(leaf.lookup(key, &self.comparator));
            }
            let child_pid = {
                let node = InternalNodeRef::new(guard.data());
                node.child_at(node.search(key, &self.comparator))
            };
            let child = self.fetch_read(child_pid)?;
            guard = child;
        }
    }

    /// Optimistic write descent: read latches down, write latch on the
    /// leaf only. When the root itself is the leaf the root latch is kept
    /// (and returned) so a possible root change stays serialized.
    /// Returns None when the tree is empty.
    fn find_leaf_optimistic(
        &self,
        key: IndexKey,
    ) -> Result<Option<(WritePageGuard, Option<MutexGuard<'_, PageId>>)>> {
        let root_latch = self.root_page_id.lock();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(None);
        }
        let root_pid = *root_latch;

        let first = self.fetch_read(root_pid)?;
        if BTreePageRef::new(first.data()).is_leaf() {
            // No structural change can intervene: any split or collapse of
            // the root needs the latch we are holding
            drop(first);
            let leaf = self.fetch_write(root_pid)?;
            return Ok(Some((leaf, Some(root_latch))));
        }
        drop(root_latch);

        let mut parent = first;
        loop {
            let child_pid = {
                let node = InternalNodeRef::new(parent.data());
                node.child_at(node.search(key, &self.comparator))
            };
            let child = self.fetch_read(child_pid)?;
            if BTreePageRef::new(child.data()).is_leaf() {
                // Upgrade to a write latch while the parent read latch is
                // still held; the leaf's identity and bounds cannot change
                // because a split would need the parent write-latched
                drop(child);
                let leaf = self.fetch_write(child_pid)?;
                return Ok(Some((leaf, None)));
            }
            parent = child;
        }
    }

    /// Inserts a key/value pair. Returns false (without modification) if
    /// the key already exists.
    pub fn insert(&self, key: IndexKey, value: RecordId, txn: &mut Transaction) -> Result<bool> {
        match self.find_leaf_optimistic(key)? {
            None => {
                let mut root_latch = self.root_page_id.lock();
                if *root_latch == INVALID_PAGE_ID {
                    self.start_new_tree(&mut root_latch, key, value)?;
                    return Ok(true);
                }
                // Another thread planted the root in the meantime
            }
            Some((mut leaf_guard, _root_latch)) => {
                let view = LeafNodeRef::new(leaf_guard.data());
                if view.lookup(key, &self.comparator).is_some() {
                    return Ok(false);
                }
                if view.size() < self.leaf_max_size {
                    let mut leaf = LeafNodeMut::new(leaf_guard.data_mut());
                    leaf.insert(key, value, &self.comparator);
                    return Ok(true);
                }
                // Leaf is full: fall back to the pessimistic path
            }
        }
        self.insert_pessimistic(key, value, txn)
    }

    fn start_new_tree(
        &self,
        root_latch: &mut MutexGuard<'_, PageId>,
        key: IndexKey,
        value: RecordId,
    ) -> Result<()> {
        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        {
            let mut leaf = LeafNodeMut::init(guard.data_mut(), page_id, self.leaf_max_size);
            leaf.insert(key, value, &self.comparator);
        }
        drop(guard);

        **root_latch = page_id;
        self.update_root_record(page_id)
    }

    fn insert_pessimistic(
        &self,
        key: IndexKey,
        value: RecordId,
        txn: &mut Transaction,
    ) -> Result<bool> {
        let mut root_latch = self.root_page_id.lock();
        if *root_latch == INVALID_PAGE_ID {
            self.start_new_tree(&mut root_latch, key, value)?;
            return Ok(true);
        }
        let root_pid = *root_latch;
        let mut root_latch = Some(root_latch);

        let mut guard = self.fetch_write(root_pid)?;
        if self.is_safe(guard.data(), Operation::Insert) {
            root_latch = None;
        }

        while !BTreePageRef::new(guard.data()).is_leaf() {
            let child_pid = {
                let node = InternalNodeRef::new(guard.data());
                node.child_at(node.search(key, &self.comparator))
            };
            let child = self.fetch_write(child_pid)?;
            txn.add_into_page_set(guard);
            if self.is_safe(child.data(), Operation::Insert) {
                txn.release_all();
                root_latch = None;
            }
            guard = child;
        }

        if LeafNodeRef::new(guard.data())
            .lookup(key, &self.comparator)
            .is_some()
        {
            txn.release_all();
            return Ok(false);
        }

        {
            let mut leaf = LeafNodeMut::new(guard.data_mut());
            leaf.insert(key, value, &self.comparator);
            if leaf.size() <= self.leaf_max_size {
                txn.release_all();
                return Ok(true);
            }
        }

        // The leaf overflowed: grow a right sibling and push the separator
        let mut right_guard = self.bpm.new_page()?;
        let right_pid = right_guard.page_id();
        let separator = {
            let mut leaf = LeafNodeMut::new(guard.data_mut());
            let mut right =
                LeafNodeMut::init(right_guard.data_mut(), right_pid, self.leaf_max_size);
            right.set_parent_page_id(leaf.parent_page_id());
            let separator = leaf.split_into(&mut right);
            right.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(right_pid);
            separator
        };

        self.insert_into_parent(guard, separator, right_guard, txn, &mut root_latch)?;
        txn.release_all();
        Ok(true)
    }

    /// Splices a freshly split pair into the parent, recursing when the
    /// parent overflows in turn. The parent's write guard is taken back
    /// from the transaction's page set.
    fn insert_into_parent<'a>(
        &'a self,
        mut left_guard: WritePageGuard,
        key: IndexKey,
        mut right_guard: WritePageGuard,
        txn: &mut Transaction,
        root_latch: &mut Option<MutexGuard<'a, PageId>>,
    ) -> Result<()> {
        let left_pid = left_guard.page_id();
        let right_pid = right_guard.page_id();
        let parent_pid = BTreePageRef::new(left_guard.data()).parent_page_id();

        if parent_pid == INVALID_PAGE_ID {
            // The split node was the root: grow a new root above the pair
            let mut new_root_guard = self.bpm.new_page()?;
            let new_root_pid = new_root_guard.page_id();
            {
                let mut root = InternalNodeMut::init(
                    new_root_guard.data_mut(),
                    new_root_pid,
                    self.internal_max_size,
                );
                root.populate_new_root(left_pid, key, right_pid);
            }
            drop(new_root_guard);

            BTreePageMut::new(left_guard.data_mut()).set_parent_page_id(new_root_pid);
            BTreePageMut::new(right_guard.data_mut()).set_parent_page_id(new_root_pid);
            drop(left_guard);
            drop(right_guard);

            let latch = root_latch
                .as_mut()
                .expect("root latch is held across a root split");
            **latch = new_root_pid;
            return self.update_root_record(new_root_pid);
        }

        let mut parent_guard = txn
            .pop_page_set()
            .expect("parent is write-latched during a pessimistic descent");
        debug_assert_eq!(parent_guard.page_id(), parent_pid);
        drop(left_guard);

        if InternalNodeRef::new(parent_guard.data()).size() < self.internal_max_size {
            let index = InternalNodeRef::new(parent_guard.data()).lower_bound(key, &self.comparator);
            InternalNodeMut::new(parent_guard.data_mut()).insert_at(index, key, right_pid);
            return Ok(());
        }

        // Parent is full as well: insert into the spare slot, then split
        {
            let index = InternalNodeRef::new(parent_guard.data()).lower_bound(key, &self.comparator);
            InternalNodeMut::new(parent_guard.data_mut()).insert_at(index, key, right_pid);
        }

        let mut parent_right_guard = self.bpm.new_page()?;
        let parent_right_pid = parent_right_guard.page_id();
        let push_key = {
            let mut parent = InternalNodeMut::new(parent_guard.data_mut());
            let mut parent_right = InternalNodeMut::init(
                parent_right_guard.data_mut(),
                parent_right_pid,
                self.internal_max_size,
            );
            parent_right.set_parent_page_id(parent.parent_page_id());
            parent.split_into(&mut parent_right)
        };

        // Children that moved to the new sibling need their parent pointer
        // rewritten. The just-created right node may be among them and is
        // still latched by us, so it is handled through its own guard.
        let moved: Vec<PageId> = {
            let node = InternalNodeRef::new(parent_right_guard.data());
            (0..node.size()).map(|i| node.child_at(i)).collect()
        };
        for child_pid in moved {
            if child_pid == right_pid {
                BTreePageMut::new(right_guard.data_mut()).set_parent_page_id(parent_right_pid);
            } else {
                let mut child_guard = self.fetch_write(child_pid)?;
                BTreePageMut::new(child_guard.data_mut()).set_parent_page_id(parent_right_pid);
            }
        }
        drop(right_guard);

        self.insert_into_parent(parent_guard, push_key, parent_right_guard, txn, root_latch)
    }

    /// Removes a key; absent keys are a no-op.
    pub fn remove(&self, key: IndexKey, txn: &mut Transaction) -> Result<()> {
        match self.find_leaf_optimistic(key)? {
            None => return Ok(()),
            Some((mut leaf_guard, root_latch)) => {
                let is_root = root_latch.is_some();
                let view = LeafNodeRef::new(leaf_guard.data());
                if view.lookup(key, &self.comparator).is_none() {
                    return Ok(());
                }
                let min = if is_root { 1 } else { view.min_size() };
                if view.size() > min {
                    let mut leaf = LeafNodeMut::new(leaf_guard.data_mut());
                    leaf.remove(key, &self.comparator);
                    return Ok(());
                }
                // Removal would underflow the leaf: go pessimistic
            }
        }
        self.remove_pessimistic(key, txn)
    }

    fn remove_pessimistic(&self, key: IndexKey, txn: &mut Transaction) -> Result<()> {
        let root_latch = self.root_page_id.lock();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(());
        }
        let root_pid = *root_latch;
        let mut root_latch = Some(root_latch);

        let mut guard = self.fetch_write(root_pid)?;
        if self.is_safe(guard.data(), Operation::Remove) {
            root_latch = None;
        }

        while !BTreePageRef::new(guard.data()).is_leaf() {
            let child_pid = {
                let node = InternalNodeRef::new(guard.data());
                node.child_at(node.search(key, &self.comparator))
            };
            let child = self.fetch_write(child_pid)?;
            txn.add_into_page_set(guard);
            if self.is_safe(child.data(), Operation::Remove) {
                txn.release_all();
                root_latch = None;
            }
            guard = child;
        }

        if LeafNodeRef::new(guard.data())
            .lookup(key, &self.comparator)
            .is_none()
        {
            txn.release_all();
            return Ok(());
        }

        {
            let mut leaf = LeafNodeMut::new(guard.data_mut());
            leaf.remove(key, &self.comparator);
        }

        let (is_root, size) = {
            let view = LeafNodeRef::new(guard.data());
            (view.parent_page_id() == INVALID_PAGE_ID, view.size())
        };

        if is_root {
            if size == 0 {
                // The last key is gone; the tree is empty again
                let page_id = guard.page_id();
                drop(guard);
                let latch = root_latch
                    .as_mut()
                    .expect("root latch is held for a root collapse");
                **latch = INVALID_PAGE_ID;
                // false here means an iterator still pins the page; it is
                // unreachable from the tree either way
                self.bpm.delete_page(page_id);
                self.update_root_record(INVALID_PAGE_ID)?;
            }
            txn.release_all();
            return Ok(());
        }

        if size >= self.leaf_min() {
            txn.release_all();
            return Ok(());
        }

        self.fix_underflow(guard, txn, &mut root_latch)?;
        txn.release_all();
        Ok(())
    }

    /// Restores the minimum-occupancy invariant of a non-root node that
    /// just dropped below it: borrow from a sibling with surplus, else
    /// merge, recursing into the parent when the merge underflows it.
    ///
    /// Sibling latches are only ever taken while the shared parent is
    /// write-latched, so adjacent operations cannot deadlock.
    fn fix_underflow<'a>(
        &'a self,
        mut node_guard: WritePageGuard,
        txn: &mut Transaction,
        root_latch: &mut Option<MutexGuard<'a, PageId>>,
    ) -> Result<()> {
        let node_pid = node_guard.page_id();
        let node_is_leaf = BTreePageRef::new(node_guard.data()).is_leaf();

        let mut parent_guard = txn
            .pop_page_set()
            .expect("parent is write-latched during a pessimistic descent");
        let node_index = InternalNodeRef::new(parent_guard.data())
            .child_index_of(node_pid)
            .expect("underflowing node is a child of its parent");
        let parent_size = InternalNodeRef::new(parent_guard.data()).size();

        let left_pid = (node_index > 0)
            .then(|| InternalNodeRef::new(parent_guard.data()).child_at(node_index - 1));
        let right_pid = (node_index + 1 < parent_size)
            .then(|| InternalNodeRef::new(parent_guard.data()).child_at(node_index + 1));

        let mut left_guard = match left_pid {
            Some(pid) => Some(self.fetch_write(pid)?),
            None => None,
        };

        // Borrow from the left sibling if it has surplus
        if let Some(lg) = left_guard.as_mut() {
            let has_surplus = {
                let view = BTreePageRef::new(lg.data());
                view.size() > view.min_size()
            };
            if has_surplus {
                if node_is_leaf {
                    let (key, rid) = LeafNodeMut::new(lg.data_mut()).pop_back();
                    LeafNodeMut::new(node_guard.data_mut()).push_front(key, rid);
                    InternalNodeMut::new(parent_guard.data_mut()).set_key_at(node_index, key);
                } else {
                    let separator = InternalNodeRef::new(parent_guard.data()).key_at(node_index);
                    let (key, moved_child) = InternalNodeMut::new(lg.data_mut()).pop_back();
                    InternalNodeMut::new(node_guard.data_mut()).push_front(moved_child, separator);
                    InternalNodeMut::new(parent_guard.data_mut()).set_key_at(node_index, key);
                    let mut child_guard = self.fetch_write(moved_child)?;
                    BTreePageMut::new(child_guard.data_mut()).set_parent_page_id(node_pid);
                }
                return Ok(());
            }
        }

        let mut right_guard = match right_pid {
            Some(pid) => Some(self.fetch_write(pid)?),
            None => None,
        };

        // Borrow from the right sibling if it has surplus
        if let Some(rg) = right_guard.as_mut() {
            let has_surplus = {
                let view = BTreePageRef::new(rg.data());
                view.size() > view.min_size()
            };
            if has_surplus {
                let right_index = node_index + 1;
                if node_is_leaf {
                    let (key, rid) = LeafNodeMut::new(rg.data_mut()).pop_front();
                    LeafNodeMut::new(node_guard.data_mut()).push_back(key, rid);
                    let new_first = LeafNodeRef::new(rg.data()).key_at(0);
                    InternalNodeMut::new(parent_guard.data_mut()).set_key_at(right_index, new_first);
                } else {
                    let separator = InternalNodeRef::new(parent_guard.data()).key_at(right_index);
                    let (moved_child, new_separator) =
                        InternalNodeMut::new(rg.data_mut()).pop_front();
                    InternalNodeMut::new(node_guard.data_mut()).push_back(separator, moved_child);
                    InternalNodeMut::new(parent_guard.data_mut())
                        .set_key_at(right_index, new_separator);
                    let mut child_guard = self.fetch_write(moved_child)?;
                    BTreePageMut::new(child_guard.data_mut()).set_parent_page_id(node_pid);
                }
                return Ok(());
            }
        }

        // Neither sibling can spare an entry: merge. Prefer folding the
        // node into its left sibling; a leftmost node absorbs its right
        // sibling instead.
        if let Some(mut lg) = left_guard {
            let left_merge_pid = lg.page_id();
            let separator = InternalNodeRef::new(parent_guard.data()).key_at(node_index);
            if node_is_leaf {
                let next = LeafNodeRef::new(node_guard.data()).next_page_id();
                LeafNodeMut::new(lg.data_mut()).append(&LeafNodeRef::new(node_guard.data()));
                LeafNodeMut::new(lg.data_mut()).set_next_page_id(next);
            } else {
                let children: Vec<PageId> = {
                    let view = InternalNodeRef::new(node_guard.data());
                    (0..view.size()).map(|i| view.child_at(i)).collect()
                };
                InternalNodeMut::new(lg.data_mut())
                    .append(&InternalNodeRef::new(node_guard.data()), separator);
                for child_pid in children {
                    let mut child_guard = self.fetch_write(child_pid)?;
                    BTreePageMut::new(child_guard.data_mut()).set_parent_page_id(left_merge_pid);
                }
            }
            InternalNodeMut::new(parent_guard.data_mut()).remove_at(node_index);
            drop(right_guard);
            drop(lg);
            drop(node_guard);
            self.bpm.delete_page(node_pid);
        } else {
            let mut rg = right_guard.expect("a non-root node has at least one sibling");
            let right_merge_pid = rg.page_id();
            let right_index = node_index + 1;
            let separator = InternalNodeRef::new(parent_guard.data()).key_at(right_index);
            if node_is_leaf {
                let next = LeafNodeRef::new(rg.data()).next_page_id();
                LeafNodeMut::new(node_guard.data_mut()).append(&LeafNodeRef::new(rg.data()));
                LeafNodeMut::new(node_guard.data_mut()).set_next_page_id(next);
            } else {
                let children: Vec<PageId> = {
                    let view = InternalNodeRef::new(rg.data());
                    (0..view.size()).map(|i| view.child_at(i)).collect()
                };
                InternalNodeMut::new(node_guard.data_mut())
                    .append(&InternalNodeRef::new(rg.data()), separator);
                for child_pid in children {
                    let mut child_guard = self.fetch_write(child_pid)?;
                    BTreePageMut::new(child_guard.data_mut()).set_parent_page_id(node_pid);
                }
            }
            InternalNodeMut::new(parent_guard.data_mut()).remove_at(right_index);
            drop(rg);
            drop(node_guard);
            self.bpm.delete_page(right_merge_pid);
        }

        // The merge dropped one separator from the parent
        let (parent_is_root, parent_size_now) = {
            let view = InternalNodeRef::new(parent_guard.data());
            (view.parent_page_id() == INVALID_PAGE_ID, view.size())
        };

        if parent_is_root {
            if parent_size_now == 1 {
                // Promote the only child as the new root
                let child_pid = InternalNodeRef::new(parent_guard.data()).child_at(0);
                let old_root_pid = parent_guard.page_id();
                drop(parent_guard);

                let mut child_guard = self.fetch_write(child_pid)?;
                BTreePageMut::new(child_guard.data_mut()).set_parent_page_id(INVALID_PAGE_ID);
                drop(child_guard);

                let latch = root_latch
                    .as_mut()
                    .expect("root latch is held for a root collapse");
                **latch = child_pid;
                self.bpm.delete_page(old_root_pid);
                self.update_root_record(child_pid)?;
            }
            return Ok(());
        }

        if parent_size_now < self.internal_min() {
            return self.fix_underflow(parent_guard, txn, root_latch);
        }
        Ok(())
    }

    /// Iterator over all entries, starting from the leftmost leaf.
    pub fn begin(&self) -> Result<BTreeIterator> {
        let root_latch = self.root_page_id.lock();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(BTreeIterator::exhausted(Arc::clone(&self.bpm)));
        }
        let mut guard = self.fetch_read(*root_latch)?;
        drop(root_latch);

        loop {
            if BTreePageRef::new(guard.data()).is_leaf() {
                let page_id = guard.page_id();
                return Ok(BTreeIterator::new(Arc::clone(&self.bpm), page_id, 0));
            }
            let child_pid = InternalNodeRef::new(guard.data()).child_at(0);
            let child = self.fetch_read(child_pid)?;
            guard = child;
        }
    }

    /// Iterator over entries with keys >= `key`.
    pub fn begin_at(&self, key: IndexKey) -> Result<BTreeIterator> {
        let root_latch = self.root_page_id.lock();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(BTreeIterator::exhausted(Arc::clone(&self.bpm)));
        }
        let mut guard = self.fetch_read(*root_latch)?;
        drop(root_latch);

        loop {
            if BTreePageRef::new(guard.data()).is_leaf() {
                let leaf = LeafNodeRef::new(guard.data());
                let index = leaf.lower_bound(key, &self.comparator);
                let page_id = leaf.page_id();
                return Ok(BTreeIterator::new(Arc::clone(&self.bpm), page_id, index));
            }
            let child_pid = {
                let node = InternalNodeRef::new(guard.data());
                node.child_at(node.search(key, &self.comparator))
            };
            let child = self.fetch_read(child_pid)?;
            guard = child;
        }
    }
}
