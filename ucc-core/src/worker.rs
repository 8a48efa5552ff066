//! Periodic worker lifecycle
//!
//! A [`PeriodicWorker`] runs a [`Worker`] on a dedicated thread:
//! `on_start` once, then `on_work` every interval while running, then
//! `on_exit` once. Errors and panics escaping a hook are logged at the loop
//! boundary and never take down the process.
//!
//! `stop()` wakes the interval sleep but never interrupts a tick in
//! progress; it returns once the current tick and `on_exit` have finished.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::constants::timing;
use crate::error::{Result, UccError};

/// Consecutive `on_work` failures between repeated error logs
const ERROR_LOG_EVERY: u64 = 60;

/// Hooks driven by a [`PeriodicWorker`]
pub trait Worker: Send + 'static {
    /// Name used for the thread and in logs
    fn name(&self) -> &str;

    fn on_start(&mut self) -> Result<()>;

    fn on_work(&mut self) -> Result<()>;

    fn on_exit(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
struct LoopState {
    /// Cleared by `stop()` to end the loop
    running: bool,
    /// Set while the thread is alive, cleared after `on_exit`
    active: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LoopState>,
    signal: Condvar,
}

/// Runs a [`Worker`] on its own thread at a fixed cadence
pub struct PeriodicWorker<W: Worker> {
    name: String,
    interval: Duration,
    shared: Arc<Shared>,
    /// Parked here while the thread is not running
    worker: Option<W>,
    handle: Option<JoinHandle<W>>,
}

impl<W: Worker> PeriodicWorker<W> {
    /// Wrap `worker`; with `auto_start` the thread is spawned immediately
    pub fn new(worker: W, interval: Duration, auto_start: bool) -> Result<Self> {
        let mut periodic = Self {
            name: worker.name().to_string(),
            interval,
            shared: Arc::new(Shared::default()),
            worker: Some(worker),
            handle: None,
        };
        if auto_start {
            periodic.start()?;
        }
        Ok(periodic)
    }

    /// Spawn the worker thread; does nothing if it is already running
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            debug!(worker = %self.name, "Worker already running");
            return Ok(());
        }

        let worker = self
            .worker
            .take()
            .ok_or_else(|| UccError::worker(&self.name, "worker was lost by a failed start"))?;

        {
            let mut state = self.shared.state.lock();
            state.running = true;
            state.active = true;
        }

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_loop(worker, shared, interval));

        match spawned {
            Ok(handle) => {
                info!(worker = %self.name, interval_ms = self.interval.as_millis() as u64, "Worker started");
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                let mut state = self.shared.state.lock();
                state.running = false;
                state.active = false;
                Err(UccError::worker(&self.name, format!("failed to spawn thread: {}", e)))
            }
        }
    }

    /// Signal the loop to end and wait for the thread to finish
    ///
    /// The current tick always completes. If the thread has not finished within
    /// a short grace period a warning is logged and the wait continues.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        {
            let mut state = self.shared.state.lock();
            state.running = false;
            self.shared.signal.notify_all();

            let deadline = Instant::now() + timing::WORKER_STOP_GRACE;
            while state.active {
                if self.shared.signal.wait_until(&mut state, deadline).timed_out() {
                    warn!(worker = %self.name, "Worker still finishing its current tick, waiting");
                    break;
                }
            }
        }

        match handle.join() {
            Ok(worker) => {
                self.worker = Some(worker);
                info!(worker = %self.name, "Worker stopped");
            }
            Err(_) => error!(worker = %self.name, "Worker thread panicked outside its hooks"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.shared.state.lock().active
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The wrapped worker, available while stopped
    pub fn worker(&self) -> Option<&W> {
        self.worker.as_ref()
    }
}

impl<W: Worker> Drop for PeriodicWorker<W> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<W: Worker>(mut worker: W, shared: Arc<Shared>, interval: Duration) -> W {
    let name = worker.name().to_string();

    guarded(&name, "on_start", || worker.on_start());

    let mut consecutive_errors: u64 = 0;
    loop {
        if !shared.state.lock().running {
            break;
        }

        if guarded(&name, "on_work", || worker.on_work()) {
            if consecutive_errors > 0 {
                debug!(worker = %name, errors = consecutive_errors, "Worker recovered");
                consecutive_errors = 0;
            }
        } else {
            consecutive_errors += 1;
            if consecutive_errors % ERROR_LOG_EVERY == 0 {
                error!(worker = %name, count = consecutive_errors, "Worker keeps failing");
            }
        }

        let deadline = Instant::now() + interval;
        let mut state = shared.state.lock();
        while state.running {
            if shared.signal.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
    }

    guarded(&name, "on_exit", || worker.on_exit());

    {
        let mut state = shared.state.lock();
        state.running = false;
        state.active = false;
    }
    shared.signal.notify_all();

    worker
}

/// Run one hook, logging errors and panics. Returns true on success.
fn guarded<F>(worker: &str, hook: &str, f: F) -> bool
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(worker, hook, error = %e, "Worker hook failed");
            false
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(worker, hook, panic = %message, "Worker hook panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        works: AtomicUsize,
        exits: AtomicUsize,
    }

    struct CountingWorker {
        counters: Arc<Counters>,
        fail_every_tick: bool,
        panic_on_tick: Option<usize>,
        tick_duration: Duration,
    }

    impl CountingWorker {
        fn new(counters: Arc<Counters>) -> Self {
            Self {
                counters,
                fail_every_tick: false,
                panic_on_tick: None,
                tick_duration: Duration::ZERO,
            }
        }
    }

    impl Worker for CountingWorker {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_start(&mut self) -> Result<()> {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_work(&mut self) -> Result<()> {
            let tick = self.counters.works.fetch_add(1, Ordering::SeqCst) + 1;
            thread::sleep(self.tick_duration);
            if self.panic_on_tick == Some(tick) {
                panic!("tick {} exploded", tick);
            }
            if self.fail_every_tick {
                return Err(UccError::generic("sensor gone"));
            }
            Ok(())
        }

        fn on_exit(&mut self) -> Result<()> {
            self.counters.exits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn wait_for_ticks(counters: &Counters, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while counters.works.load(Ordering::SeqCst) < n {
            assert!(Instant::now() < deadline, "worker did not tick {} times", n);
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_lifecycle_hooks_run_once() {
        let counters = Arc::new(Counters::default());
        let mut worker =
            PeriodicWorker::new(CountingWorker::new(counters.clone()), Duration::from_millis(5), true).unwrap();

        wait_for_ticks(&counters, 3);
        worker.stop();

        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.exits.load(Ordering::SeqCst), 1);
        assert!(!worker.is_running());

        let ticks = counters.works.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(counters.works.load(Ordering::SeqCst), ticks);
    }

    #[test]
    fn test_no_auto_start() {
        let counters = Arc::new(Counters::default());
        let worker =
            PeriodicWorker::new(CountingWorker::new(counters.clone()), Duration::from_millis(5), false).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_running());
        assert_eq!(counters.starts.load(Ordering::SeqCst), 0);
        assert!(worker.worker().is_some());
    }

    #[test]
    fn test_start_is_idempotent() {
        let counters = Arc::new(Counters::default());
        let mut worker =
            PeriodicWorker::new(CountingWorker::new(counters.clone()), Duration::from_millis(5), false).unwrap();
        worker.start().unwrap();
        worker.start().unwrap();
        wait_for_ticks(&counters, 1);
        worker.stop();
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_after_stop() {
        let counters = Arc::new(Counters::default());
        let mut worker =
            PeriodicWorker::new(CountingWorker::new(counters.clone()), Duration::from_millis(5), true).unwrap();
        wait_for_ticks(&counters, 1);
        worker.stop();
        worker.start().unwrap();
        wait_for_ticks(&counters, 3);
        worker.stop();
        assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
        assert_eq!(counters.exits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_errors_do_not_end_loop() {
        let counters = Arc::new(Counters::default());
        let mut inner = CountingWorker::new(counters.clone());
        inner.fail_every_tick = true;
        let mut worker = PeriodicWorker::new(inner, Duration::from_millis(2), true).unwrap();
        wait_for_ticks(&counters, 5);
        worker.stop();
        assert_eq!(counters.exits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_is_contained() {
        let counters = Arc::new(Counters::default());
        let mut inner = CountingWorker::new(counters.clone());
        inner.panic_on_tick = Some(2);
        let mut worker = PeriodicWorker::new(inner, Duration::from_millis(2), true).unwrap();
        wait_for_ticks(&counters, 5);
        worker.stop();
        assert_eq!(counters.exits.load(Ordering::SeqCst), 1);
        assert!(worker.worker().is_some());
    }

    #[test]
    fn test_stop_wakes_long_sleep() {
        let counters = Arc::new(Counters::default());
        let mut worker =
            PeriodicWorker::new(CountingWorker::new(counters.clone()), Duration::from_secs(60), true).unwrap();
        wait_for_ticks(&counters, 1);

        let started = Instant::now();
        worker.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(counters.works.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_waits_for_tick_in_progress() {
        let counters = Arc::new(Counters::default());
        let mut inner = CountingWorker::new(counters.clone());
        inner.tick_duration = Duration::from_millis(300);
        let mut worker = PeriodicWorker::new(inner, Duration::from_millis(5), true).unwrap();
        wait_for_ticks(&counters, 1);

        worker.stop();
        // the exit hook only runs after the slow tick returned
        assert_eq!(counters.exits.load(Ordering::SeqCst), 1);
        assert_eq!(counters.works.load(Ordering::SeqCst), 1);
    }
}
