//! DiskScheduler: serializes page I/O onto one background worker.
//!
//! Callers enqueue requests and get back a single-shot completion they can
//! wait on; the worker drains the queue FIFO and dispatches to the disk
//! manager. Shutdown enqueues a sentinel and joins the worker, so every
//! request accepted before drop is performed.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::debug;
use parking_lot::Mutex;

use crate::disk::DiskManager;
use crate::page::Page;
use crate::PageId;

/// Fulfilled with `true` once the request's I/O has been performed.
pub type DiskPromise = Sender<bool>;
/// The waiting side of a completion pair.
pub type DiskFuture = Receiver<bool>;

/// A single read or write handed to the background worker.
///
/// The page data is shared: for a write the worker reads it, for a read the
/// worker fills it. The completion fences the hand-off, so the two sides
/// never touch the buffer at the same time.
pub struct DiskRequest {
    pub is_write: bool,
    pub data: Arc<Mutex<Page>>,
    pub page_id: PageId,
    pub done: DiskPromise,
}

pub struct DiskScheduler {
    sender: Sender<Option<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Takes ownership of the disk manager and spawns the worker.
    pub fn new(disk_manager: DiskManager) -> Self {
        let (sender, receiver) = mpsc::channel::<Option<DiskRequest>>();
        let worker = std::thread::spawn(move || {
            Self::run_worker(disk_manager, receiver);
        });
        Self {
            sender,
            worker: Some(worker),
        }
    }

    /// Enqueues a request and returns immediately.
    pub fn schedule(&self, request: DiskRequest) {
        self.sender
            .send(Some(request))
            .expect("disk scheduler worker is gone");
    }

    /// Returns a fresh single-shot completion pair.
    ///
    /// The promise goes into a [`DiskRequest`]; the caller keeps the future
    /// and blocks on it until the worker has performed the I/O.
    pub fn create_promise() -> (DiskPromise, DiskFuture) {
        mpsc::channel()
    }

    fn run_worker(mut disk_manager: DiskManager, receiver: Receiver<Option<DiskRequest>>) {
        debug!("disk scheduler worker started");
        while let Ok(Some(request)) = receiver.recv() {
            {
                let mut page = request.data.lock();
                if request.is_write {
                    disk_manager
                        .write_page(request.page_id, page.data())
                        .expect("disk write failed");
                } else {
                    disk_manager
                        .read_page(request.page_id, page.data_mut())
                        .expect("disk read failed");
                }
            }
            // The waiter may have gone away; the I/O still happened.
            let _ = request.done.send(true);
        }
        debug!("disk scheduler worker stopped");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        let _ = self.sender.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
