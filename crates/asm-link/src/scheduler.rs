//! Cancellable repeating timers.
//!
//! The reconnect policy schedules its retries through the [`Scheduler`] trait so
//! it can run on real threads in the console and be stepped by hand in tests.
//!
//! - [`ThreadScheduler`]: one sleeping thread per timer, woken early on cancel
//! - [`ManualScheduler`]: timers only fire when [`ManualScheduler::fire`] is called

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{LinkError, LinkResult};

/// Work run each time a timer fires.
pub type TimerTask = Box<dyn FnMut() + Send + 'static>;

/// Schedules repeating work.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `interval` until the returned handle is cancelled.
    fn schedule_repeating(&self, interval: Duration, task: TimerTask) -> LinkResult<TimerHandle>;
}

/// Handle to a scheduled timer.
///
/// Cancelling is idempotent and takes effect before the next tick. Dropping every
/// clone of a [`ThreadScheduler`] handle also stops that timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
}

impl TimerHandle {
    fn new(id: u64, wake: Option<Sender<()>>) -> Self {
        TimerHandle {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            wake,
        }
    }

    /// Scheduler-assigned timer id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the timer.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(wake) = &self.wake {
            let _ = wake.try_send(());
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Thread Scheduler
// ============================================================================

/// Runs each timer on its own named thread.
#[derive(Debug, Default)]
pub struct ThreadScheduler {
    next_id: AtomicU64,
}

impl ThreadScheduler {
    /// Create a new thread scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_repeating(&self, interval: Duration, mut task: TimerTask) -> LinkResult<TimerHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        let handle = TimerHandle::new(id, Some(wake_tx));
        let cancelled = Arc::clone(&handle.cancelled);

        thread::Builder::new()
            .name(format!("asm-timer-{}", id))
            .spawn(move || loop {
                match wake_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if cancelled.load(Ordering::SeqCst) {
                            break;
                        }
                        task();
                    }
                    // Woken by cancel, or every handle was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|source| LinkError::Spawn {
                what: "timer",
                source,
            })?;

        Ok(handle)
    }
}

// ============================================================================
// Manual Scheduler
// ============================================================================

struct ManualTimer {
    handle: TimerHandle,
    interval: Duration,
    task: Arc<Mutex<TimerTask>>,
}

/// A scheduler whose timers fire only when told to.
///
/// Used to drive the reconnect policy deterministically, without waiting on
/// the wall clock.
#[derive(Default)]
pub struct ManualScheduler {
    timers: Mutex<Vec<ManualTimer>>,
    next_id: AtomicU64,
}

impl ManualScheduler {
    /// Create an empty manual scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    /// Interval of each live timer, in scheduling order.
    pub fn intervals(&self) -> Vec<Duration> {
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .map(|t| t.interval)
            .collect()
    }

    /// Fire every live timer once. Returns how many tasks ran.
    ///
    /// Tasks run without the scheduler lock held, so they may schedule or cancel
    /// timers themselves.
    pub fn fire(&self) -> usize {
        let due: Vec<(TimerHandle, Arc<Mutex<TimerTask>>)> = {
            let mut timers = self.timers.lock();
            timers.retain(|t| !t.handle.is_cancelled());
            timers
                .iter()
                .map(|t| (t.handle.clone(), Arc::clone(&t.task)))
                .collect()
        };

        let mut ran = 0;
        for (handle, task) in due {
            if handle.is_cancelled() {
                continue;
            }
            let mut task = task.lock();
            (&mut *task)();
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, task: TimerTask) -> LinkResult<TimerHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TimerHandle::new(id, None);
        self.timers.lock().push(ManualTimer {
            handle: handle.clone(),
            interval,
            task: Arc::new(Mutex::new(task)),
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn counting_task(counter: &Arc<AtomicUsize>) -> TimerTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_manual_fire_runs_each_timer_once() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let _a = scheduler
            .schedule_repeating(Duration::from_secs(5), counting_task(&counter))
            .unwrap();
        let _b = scheduler
            .schedule_repeating(Duration::from_secs(1), counting_task(&counter))
            .unwrap();

        assert_eq!(scheduler.pending(), 2);
        assert_eq!(scheduler.fire(), 2);
        assert_eq!(scheduler.fire(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_manual_cancel_stops_timer() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler
            .schedule_repeating(Duration::from_secs(5), counting_task(&counter))
            .unwrap();

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.fire(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_task_can_cancel_itself() {
        let scheduler = Arc::new(ManualScheduler::new());
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));
        let task_slot = Arc::clone(&slot);
        let handle = scheduler
            .schedule_repeating(
                Duration::from_secs(5),
                Box::new(move || {
                    if let Some(handle) = task_slot.lock().take() {
                        handle.cancel();
                    }
                }),
            )
            .unwrap();
        *slot.lock() = Some(handle);

        assert_eq!(scheduler.fire(), 1);
        assert_eq!(scheduler.fire(), 0);
    }

    #[test]
    fn test_thread_timer_fires_repeatedly_until_cancelled() {
        let scheduler = ThreadScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler
            .schedule_repeating(Duration::from_millis(10), counting_task(&counter))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        handle.cancel();
        assert!(counter.load(Ordering::SeqCst) >= 3);

        thread::sleep(Duration::from_millis(50));
        let after_cancel = counter.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn test_thread_timer_cancel_wakes_early() {
        let scheduler = ThreadScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler
            .schedule_repeating(Duration::from_secs(60), counting_task(&counter))
            .unwrap();
        handle.cancel();
        drop(handle);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
