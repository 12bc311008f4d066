use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, PAGE_SIZE};

/// DiskManager is responsible for reading and writing pages to/from a single
/// backing file. It tracks the number of pages allocated with a monotonic
/// counter; page ids are a dense, zero-based offset into that file.
///
/// This is the "raw block device" external collaborator the rest of the
/// crate is built against — its allocation policy is intentionally simple
/// (linear growth, no reclamation of freed offsets) since richer allocation
/// strategies are out of this crate's scope.
pub struct DiskManager {
    file: Mutex<File>,
    db_path: PathBuf,
    num_pages: AtomicU32,
    num_reads: AtomicU32,
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens (or creates) the database file at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file: Mutex::new(file),
            db_path,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    fn byte_offset(page_id: PageId) -> u64 {
        (page_id.as_u32() as u64) * (PAGE_SIZE as u64)
    }

    /// Reads a page from disk into the provided buffer.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::byte_offset(page_id)))?;

        let bytes_read = file.read(data)?;
        if bytes_read < PAGE_SIZE {
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page to disk from the provided buffer.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::byte_offset(page_id)))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Reads `num_pages` contiguous pages starting at `start_page_id` in a
    /// single I/O operation.
    pub fn read_pages(&self, start_page_id: PageId, num_pages: u32, data: &mut [u8]) -> Result<()> {
        let expected_size = (num_pages as usize) * PAGE_SIZE;
        assert_eq!(data.len(), expected_size);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::byte_offset(start_page_id)))?;

        let bytes_read = file.read(data)?;
        if bytes_read < expected_size {
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes `num_pages` contiguous pages starting at `start_page_id` in a
    /// single I/O operation.
    pub fn write_pages(&self, start_page_id: PageId, num_pages: u32, data: &[u8]) -> Result<()> {
        let expected_size = (num_pages as usize) * PAGE_SIZE;
        assert_eq!(data.len(), expected_size);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::byte_offset(start_page_id)))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a fresh page id and zero-fills it on disk.
    pub fn allocate_page(&self) -> Result<PageId> {
        let raw = self.num_pages.fetch_add(1, Ordering::SeqCst);
        let page_id = PageId::new(raw);

        let zeros = [0u8; PAGE_SIZE];
        self.write_page(page_id, &zeros)?;

        Ok(page_id)
    }

    /// Releases a page id. This allocator never reclaims offsets (richer
    /// free-space tracking is out of this crate's scope), so this is a
    /// no-op kept for interface stability.
    pub fn deallocate_page(&self, _page_id: PageId) -> Result<()> {
        Ok(())
    }

    pub fn get_num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }

    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn sync(&self) -> Result<()> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let file = self.file.get_mut();
        let _ = file.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_manager_new() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let dm = DiskManager::new(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(dm.get_num_pages(), 0);
    }

    #[test]
    fn test_disk_manager_allocate_page() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("alloc.db");
        let dm = DiskManager::new(&db_path).unwrap();

        let page_id = dm.allocate_page().unwrap();
        assert_eq!(page_id, PageId::new(0));
        let page_id2 = dm.allocate_page().unwrap();
        assert_eq!(page_id2, PageId::new(1));
    }

    #[test]
    fn test_disk_manager_read_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("rw.db");
        let dm = DiskManager::new(&db_path).unwrap();

        let page_id = dm.allocate_page().unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        write_data[PAGE_SIZE - 1] = 128;
        dm.write_page(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
        assert_eq!(read_data[PAGE_SIZE - 1], 128);
    }

    #[test]
    fn test_disk_manager_bulk_read_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("bulk.db");
        let dm = DiskManager::new(&db_path).unwrap();

        for _ in 0..4 {
            dm.allocate_page().unwrap();
        }

        let mut bulk = vec![0u8; 4 * PAGE_SIZE];
        for i in 0..4 {
            bulk[i * PAGE_SIZE] = i as u8;
        }
        dm.write_pages(PageId::new(0), 4, &bulk).unwrap();

        let mut read_back = vec![0u8; 4 * PAGE_SIZE];
        dm.read_pages(PageId::new(0), 4, &mut read_back).unwrap();
        for i in 0..4 {
            assert_eq!(read_back[i * PAGE_SIZE], i as u8);
        }
    }

    #[test]
    fn test_disk_manager_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("persist.db");

        {
            let dm = DiskManager::new(&db_path).unwrap();
            let page_id = dm.allocate_page().unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 123;
            dm.write_page(page_id, &data).unwrap();
        }

        {
            let dm = DiskManager::new(&db_path).unwrap();
            assert_eq!(dm.get_num_pages(), 1);

            let mut data = [0u8; PAGE_SIZE];
            dm.read_page(PageId::new(0), &mut data).unwrap();
            assert_eq!(data[0], 123);
        }
    }
}
