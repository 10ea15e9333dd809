//! Worker threads for super-threaded channel processing.

use crate::{Error, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// One line's share of a period.
pub type ChannelJob = Box<dyn FnOnce() + Send + 'static>;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fixed set of named workers. [`run_period`](Self::run_period) hands every
/// job to a worker and blocks until each one has reported back.
pub struct ChannelWorkerPool {
    job_tx: Option<Sender<ChannelJob>>,
    done_rx: Receiver<()>,
    /// Serializes periods so done signals are never mixed up.
    period: parking_lot::Mutex<()>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl ChannelWorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::Worker("worker pool needs at least one thread".into()));
        }
        let (job_tx, job_rx) = bounded::<ChannelJob>(threads * 4);
        let (done_tx, done_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("ripieno-channel-{index}"))
                .spawn(move || worker_loop(job_rx, done_tx, shutdown))
                .map_err(|e| Error::Worker(e.to_string()))?;
            handles.push(handle);
        }

        Ok(Self {
            job_tx: Some(job_tx),
            done_rx,
            period: parking_lot::Mutex::new(()),
            shutdown,
            handles,
        })
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Run `jobs` on the workers and wait for all of them. Jobs that cannot
    /// be handed over run on the calling thread.
    pub fn run_period(&self, jobs: Vec<ChannelJob>) {
        let _period = self.period.lock();
        let mut pending = 0;
        for job in jobs {
            match &self.job_tx {
                Some(tx) => match tx.send(job) {
                    Ok(()) => pending += 1,
                    Err(returned) => (returned.into_inner())(),
                },
                None => job(),
            }
        }
        for _ in 0..pending {
            if self.done_rx.recv().is_err() {
                warn!("channel workers disconnected mid-period");
                break;
            }
        }
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.job_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ChannelWorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(job_rx: Receiver<ChannelJob>, done_tx: Sender<()>, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match job_rx.recv_timeout(POLL_INTERVAL) {
            Ok(job) => {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("channel job panicked; line skipped for this period");
                }
                if done_tx.send(()).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
