//! Interval timer running a callback on its own thread
//!
//! Used by the rotation watcher and the retention sweeper. Stopping is
//! cooperative: the stop request wakes the sleeping thread, which exits
//! before its next tick, and the caller joins it.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Stop flag the timer thread waits on between ticks
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        if let Ok(mut stopped) = self.stopped.lock() {
            *stopped = true;
        }
        self.wake.notify_all();
    }

    /// Sleep for `interval` unless stopped first; returns true when stopped
    fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = match self.stopped.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !*stopped {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            stopped = match self.wake.wait_timeout(stopped, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

struct Running {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

/// A restartable interval timer with at most one thread alive
pub struct IntervalTimer {
    name: String,
    running: Mutex<Option<Running>>,
}

impl IntervalTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: Mutex::new(None),
        }
    }

    /// Start calling `tick` every `interval`
    ///
    /// With `immediate`, the first tick runs right away instead of after one
    /// interval. Returns `Ok(false)` without doing anything if the timer is
    /// already running.
    pub fn start<F>(&self, interval: Duration, immediate: bool, mut tick: F) -> Result<bool>
    where
        F: FnMut() + Send + 'static,
    {
        let mut running = self.lock_running();
        if running.is_some() {
            return Ok(false);
        }

        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                if immediate {
                    tick();
                }
                while !thread_signal.wait(interval) {
                    tick();
                }
            })
            .with_context(|| format!("Failed to spawn {} thread", self.name))?;

        *running = Some(Running { signal, handle });
        tracing::debug!("{} started (interval: {:?})", self.name, interval);
        Ok(true)
    }

    /// Stop the timer and wait for its thread to exit
    ///
    /// Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let running = self.lock_running().take();
        match running {
            Some(Running { signal, handle }) => {
                signal.stop();
                if handle.join().is_err() {
                    tracing::error!("{} thread panicked", self.name);
                }
                tracing::debug!("{} stopped", self.name);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
