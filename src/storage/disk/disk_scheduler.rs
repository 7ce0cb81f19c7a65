use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::common::{BurrowError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// Kind of disk I/O to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Write,
}

/// A queued disk I/O request.
///
/// For reads the buffer is filled from disk; for writes it is the source.
pub struct DiskRequest {
    pub op: IoOp,
    pub page_id: PageId,
    /// Pointer to a PAGE_SIZE buffer owned by the requester
    pub data: *mut u8,
    /// Completion signal, true on success
    pub done: Option<mpsc::Sender<bool>>,
}

// Safety: the worker thread is the only other user of the pointer, and the
// requester keeps the buffer alive until the completion signal arrives
unsafe impl Send for DiskRequest {}

/// DiskScheduler owns a background worker that drains a bounded request
/// queue and performs the actual I/O through the disk manager.
///
/// Shutdown is by disconnect: dropping the scheduler closes the queue, the
/// worker finishes whatever is still enqueued and exits, and `Drop` joins
/// it.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_sender: Option<Sender<DiskRequest>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<DiskRequest>(128);

        let dm = Arc::clone(&disk_manager);
        let worker_handle = thread::spawn(move || Self::worker_loop(dm, receiver));

        Self {
            disk_manager,
            request_sender: Some(sender),
            worker_handle: Some(worker_handle),
        }
    }

    /// Queues a request for the background worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .as_ref()
            .expect("scheduler is running")
            .send(request)
            .map_err(|e| BurrowError::DiskScheduler(format!("failed to schedule request: {}", e)))
    }

    /// Queues a read and blocks until the page is in `data`.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = mpsc::channel();
        self.schedule(DiskRequest {
            op: IoOp::Read,
            page_id,
            data: data.as_mut_ptr(),
            done: Some(tx),
        })?;
        Self::await_completion(rx)
    }

    /// Queues a write and blocks until `data` is on disk.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = mpsc::channel();
        // The worker only reads through the pointer for writes
        self.schedule(DiskRequest {
            op: IoOp::Write,
            page_id,
            data: data.as_ptr() as *mut u8,
            done: Some(tx),
        })?;
        Self::await_completion(rx)
    }

    fn await_completion(rx: mpsc::Receiver<bool>) -> Result<()> {
        match rx.recv() {
            Ok(true) => Ok(()),
            Ok(false) => Err(BurrowError::DiskScheduler("disk request failed".to_string())),
            Err(e) => Err(BurrowError::DiskScheduler(format!(
                "worker dropped request: {}",
                e
            ))),
        }
    }

    /// Drains the queue until every sender is gone.
    fn worker_loop(disk_manager: Arc<DiskManager>, receiver: Receiver<DiskRequest>) {
        while let Ok(request) = receiver.recv() {
            let success = match request.op {
                IoOp::Write => {
                    // Safety: requester keeps the buffer alive until signaled
                    let data = unsafe { std::slice::from_raw_parts(request.data, PAGE_SIZE) };
                    disk_manager.write_page(request.page_id, data).is_ok()
                }
                IoOp::Read => {
                    // Safety: requester keeps the buffer alive until signaled
                    let data = unsafe { std::slice::from_raw_parts_mut(request.data, PAGE_SIZE) };
                    disk_manager.read_page(request.page_id, data).is_ok()
                }
            };

            if let Some(done) = request.done {
                let _ = done.send(success);
            }
        }
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the channel tells the worker to finish up
        self.request_sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_scheduler_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id = scheduler.disk_manager().allocate_page().unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        scheduler.schedule_write_sync(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_disk_scheduler_many_requests_in_order() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let pages: Vec<PageId> = (0..8)
            .map(|_| scheduler.disk_manager().allocate_page().unwrap())
            .collect();

        for (i, &pid) in pages.iter().enumerate() {
            let data = [i as u8; PAGE_SIZE];
            scheduler.schedule_write_sync(pid, &data).unwrap();
        }

        for (i, &pid) in pages.iter().enumerate() {
            let mut data = [0u8; PAGE_SIZE];
            scheduler.schedule_read_sync(pid, &mut data).unwrap();
            assert_eq!(data[0], i as u8);
        }
    }

    #[test]
    fn test_disk_scheduler_shutdown_drains_queue() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());

        let page_id = {
            let scheduler = DiskScheduler::new(Arc::clone(&dm));
            let page_id = scheduler.disk_manager().allocate_page().unwrap();
            let data = [7u8; PAGE_SIZE];
            scheduler.schedule_write_sync(page_id, &data).unwrap();
            page_id
            // scheduler dropped here; worker joins
        };

        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut data).unwrap();
        assert_eq!(data[0], 7);
    }
}
