use crate::common::{PageId, PAGE_SIZE};

const MAGIC_NUMBER: u32 = 0x42555257; // "BURW" in hex

const MAGIC_OFFSET: usize = 0;
const RECORD_COUNT_OFFSET: usize = 4;
const RECORDS_OFFSET: usize = 8;

const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4; // name (32) + root_page_id (4)
const MAX_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

const INVALID_PAGE: u32 = u32::MAX;

/// Read-only view of the header page (page 0).
///
/// The header page stores one record per index: a fixed-width name and the
/// page ID of that index's root. It is how an index finds its root again
/// after a restart.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn is_valid(&self) -> bool {
        let bytes: [u8; 4] = self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4]
            .try_into()
            .unwrap();
        u32::from_le_bytes(bytes) == MAGIC_NUMBER
    }

    pub fn record_count(&self) -> usize {
        let bytes: [u8; 4] = self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
            .try_into()
            .unwrap();
        u32::from_le_bytes(bytes) as usize
    }

    /// Looks up the root page ID recorded for the given index name.
    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        let index = find_record(self.data, name)?;
        let offset = record_offset(index) + NAME_SIZE;
        let bytes: [u8; 4] = self.data[offset..offset + 4].try_into().unwrap();
        let value = u32::from_le_bytes(bytes);
        if value == INVALID_PAGE {
            None
        } else {
            Some(PageId::new(value))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        find_record(self.data, name).is_some()
    }
}

/// Mutable view of the header page.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
        self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&MAGIC_NUMBER.to_le_bytes());
        self.set_record_count(0);
    }

    pub fn record_count(&self) -> usize {
        HeaderPageRef::new(self.data).record_count()
    }

    fn set_record_count(&mut self, count: usize) {
        self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
            .copy_from_slice(&(count as u32).to_le_bytes());
    }

    /// Adds a new (name, root_page_id) record.
    /// Returns false if the page is full or the name is already recorded.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        let count = self.record_count();
        if count >= MAX_RECORDS || find_record(self.data, name).is_some() {
            return false;
        }

        let offset = record_offset(count);
        write_name(&mut self.data[offset..offset + NAME_SIZE], name);
        self.data[offset + NAME_SIZE..offset + RECORD_SIZE]
            .copy_from_slice(&root_page_id.as_u32().to_le_bytes());
        self.set_record_count(count + 1);
        true
    }

    /// Rewrites the root page ID of an existing record.
    /// Returns false if the name is not recorded.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        match find_record(self.data, name) {
            Some(index) => {
                let offset = record_offset(index) + NAME_SIZE;
                self.data[offset..offset + 4]
                    .copy_from_slice(&root_page_id.as_u32().to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Drops a record, compacting the tail over it.
    /// Returns false if the name is not recorded.
    pub fn delete_record(&mut self, name: &str) -> bool {
        let count = self.record_count();
        match find_record(self.data, name) {
            Some(index) => {
                let start = record_offset(index);
                let end = record_offset(count);
                self.data.copy_within(start + RECORD_SIZE..end, start);
                self.set_record_count(count - 1);
                true
            }
            None => false,
        }
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        HeaderPageRef::new(self.data).get_root_id(name)
    }
}

fn record_offset(index: usize) -> usize {
    RECORDS_OFFSET + index * RECORD_SIZE
}

fn write_name(slot: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    assert!(bytes.len() <= NAME_SIZE, "index name too long");
    slot.fill(0);
    slot[..bytes.len()].copy_from_slice(bytes);
}

fn find_record(data: &[u8], name: &str) -> Option<usize> {
    let count = HeaderPageRef::new(data).record_count();
    let needle = name.as_bytes();
    if needle.len() > NAME_SIZE {
        return None;
    }

    (0..count).find(|&i| {
        let offset = record_offset(i);
        let stored = &data[offset..offset + NAME_SIZE];
        let len = stored.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        &stored[..len] == needle
    })
}
