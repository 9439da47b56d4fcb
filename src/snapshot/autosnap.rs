//! Background snapshot trigger.
//!
//! The worker wakes once a second and, when both the configured delay has
//! elapsed since the last trigger and the modification counter has reached
//! the configured threshold, enqueues a snapshot request for the executor.
//! Routing the actual write through the executor keeps the store confined
//! to one thread; the worker itself never touches it.

use crate::config::AUTOSNAP_TICK_SECS;
use crate::server::queue::{Work, WorkQueue};
use crate::vlog;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Autosnap trigger thresholds.
#[derive(Debug, Clone, Copy)]
pub struct AutosnapConfig {
    /// Minimum seconds between snapshots.
    pub delay_secs: u64,
    /// Minimum modifications since the last snapshot. Clamped to at least 1
    /// at configuration time.
    pub count: u64,
}

impl AutosnapConfig {
    /// Builds a config, clamping `count` to at least 1.
    pub fn new(delay_secs: u64, count: u64) -> Self {
        AutosnapConfig {
            delay_secs,
            count: count.max(1),
        }
    }
}

/// Running autosnap worker; dropping without [`stop`](Self::stop) detaches it.
pub struct AutosnapWorker {
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

impl AutosnapWorker {
    /// Spawns the worker thread.
    pub fn spawn(
        cfg: AutosnapConfig,
        modifications: Arc<AtomicU64>,
        queue: Arc<WorkQueue>,
    ) -> std::io::Result<Self> {
        let (shutdown, rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("autosnap".into())
            .spawn(move || {
                let tick = Duration::from_secs(AUTOSNAP_TICK_SECS);
                let mut last_trigger = Instant::now();
                loop {
                    match rx.recv_timeout(tick) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    let due = last_trigger.elapsed().as_secs() >= cfg.delay_secs
                        && modifications.load(Ordering::SeqCst) >= cfg.count;
                    if due {
                        vlog!(crate::verbosity::LEVEL_NOISY, "autosnap: snapshot triggered");
                        queue.push(Work::Autosnap);
                        last_trigger = Instant::now();
                    }
                }
            })?;
        Ok(AutosnapWorker { shutdown, thread })
    }

    /// Signals the worker and joins it.
    pub fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.thread.join();
    }
}
