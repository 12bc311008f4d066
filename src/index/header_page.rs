use crate::common::{PageId, PAGE_SIZE};

const ROOT_PAGE_ID_OFFSET: usize = 0;
const INVALID_PAGE: u32 = u32::MAX;

/// A dedicated page holding the current root page id of a B+ tree.
///
/// Indirecting root lookups through this page (rather than storing the
/// root id in the `BTreeIndex` struct) lets the root identity itself be
/// latched: the header page is the first guard acquired on every descent,
/// so a root split is just another "safe node" release in the crabbing
/// stack instead of a special case.
pub struct BTreeHeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> BTreeHeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self, root_page_id: PageId) {
        self.data.fill(0);
        self.set_root_page_id(root_page_id);
    }

    pub fn set_root_page_id(&mut self, page_id: PageId) {
        let bytes = page_id.as_u32().to_le_bytes();
        self.data[ROOT_PAGE_ID_OFFSET..ROOT_PAGE_ID_OFFSET + 4].copy_from_slice(&bytes);
    }
}

pub struct BTreeHeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> BTreeHeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn root_page_id(&self) -> Option<PageId> {
        let bytes: [u8; 4] = self.data[ROOT_PAGE_ID_OFFSET..ROOT_PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        let value = u32::from_le_bytes(bytes);
        if value == INVALID_PAGE {
            None
        } else {
            Some(PageId::new(value))
        }
    }
}
