use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{BurrowError, IndexKey, PageId, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::LeafNodeRef;

/// Forward iterator over the leaf chain.
///
/// Each `next` call takes a fresh read latch on the current leaf and
/// releases it before returning, so the iterator never holds a latch
/// between calls.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    current_page_id: PageId,
    current_index: usize,
}

impl BTreeIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page_id: PageId, index: usize) -> Self {
        Self {
            bpm,
            current_page_id: page_id,
            current_index: index,
        }
    }

    pub(crate) fn exhausted(bpm: Arc<BufferPoolManager>) -> Self {
        Self::new(bpm, INVALID_PAGE_ID, 0)
    }

    pub fn next(&mut self) -> Result<Option<(IndexKey, RecordId)>> {
        while self.current_page_id != INVALID_PAGE_ID {
            let guard = self
                .bpm
                .checked_read_page(self.current_page_id)?
                .ok_or(BurrowError::PageNotFound(self.current_page_id))?;
            let leaf = LeafNodeRef::new(guard.data());

            if self.current_index < leaf.size() {
                let entry = (
                    leaf.key_at(self.current_index),
                    leaf.rid_at(self.current_index),
                );
                self.current_index += 1;
                return Ok(Some(entry));
            }

            self.current_page_id = leaf.next_page_id();
            self.current_index = 0;
        }

        Ok(None)
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BTreeIterator::next(self) {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
