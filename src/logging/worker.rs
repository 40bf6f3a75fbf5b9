//! The single consumer draining the message queue into the sink

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use super::queue::MessageQueue;
use super::sink::SinkManager;

/// Default wait between checks when idle or paused
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Background thread writing queued lines to the sink
pub struct LogWorker {
    queue: Arc<MessageQueue<String>>,
    sink: Arc<SinkManager>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogWorker {
    pub fn new(queue: Arc<MessageQueue<String>>, sink: Arc<SinkManager>) -> Self {
        Self::with_poll_interval(queue, sink, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        queue: Arc<MessageQueue<String>>,
        sink: Arc<SinkManager>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            sink,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the worker thread; returns `Ok(false)` if it is already running
    pub fn start(&self) -> Result<bool> {
        let mut handle = self.lock_handle();
        if handle.is_some() {
            return Ok(false);
        }

        self.running.store(true, Ordering::Release);
        let queue = Arc::clone(&self.queue);
        let sink = Arc::clone(&self.sink);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("rotolog-worker".to_string())
            .spawn(move || run(&queue, &sink, &running, poll_interval));
        match spawned {
            Ok(join) => {
                *handle = Some(join);
                Ok(true)
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e).context("Failed to spawn log worker thread")
            }
        }
    }

    /// Stop the worker after it writes what is already queued
    pub fn stop(&self) {
        let handle = self.lock_handle().take();
        self.running.store(false, Ordering::Release);
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Log worker thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_handle().is_some()
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for LogWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    queue: &MessageQueue<String>,
    sink: &SinkManager,
    running: &AtomicBool,
    poll_interval: Duration,
) {
    while running.load(Ordering::Acquire) {
        if sink.is_paused() {
            thread::sleep(poll_interval);
            continue;
        }
        if let Some(line) = queue.dequeue_timeout(poll_interval) {
            write(sink, &line);
        }
    }

    // Flush what producers queued before shutdown
    while let Some(line) = queue.try_dequeue() {
        write(sink, &line);
    }
}

fn write(sink: &SinkManager, line: &str) {
    if let Err(e) = sink.write_line(line) {
        tracing::error!("Dropped log line, sink write failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::level::LogMode;
    use crate::logging::test_support::{eventually, SharedBuffer};
    use std::path::Path;

    fn console_worker() -> (Arc<MessageQueue<String>>, Arc<SinkManager>, LogWorker, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let sink = Arc::new(SinkManager::with_console(buffer.factory()));
        sink.initialize(LogMode::Console, Path::new(".")).unwrap();
        let queue = Arc::new(MessageQueue::new());
        let worker = LogWorker::with_poll_interval(
            Arc::clone(&queue),
            Arc::clone(&sink),
            Duration::from_millis(5),
        );
        (queue, sink, worker, buffer)
    }

    #[test]
    fn test_worker_drains_queue_in_order() {
        let (queue, _sink, worker, buffer) = console_worker();
        assert!(worker.start().unwrap());

        for i in 0..20 {
            queue.enqueue(format!("line {}", i));
        }

        assert!(eventually(|| buffer.lines().len() == 20));
        let expected: Vec<String> = (0..20).map(|i| format!("line {}", i)).collect();
        assert_eq!(buffer.lines(), expected);
        worker.stop();
    }

    #[test]
    fn test_start_is_idempotent() {
        let (_queue, _sink, worker, _buffer) = console_worker();
        assert!(worker.start().unwrap());
        assert!(!worker.start().unwrap());
        assert!(worker.is_running());
        worker.stop();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_stop_flushes_pending_lines() {
        let (queue, _sink, worker, buffer) = console_worker();
        for i in 0..100 {
            queue.enqueue(format!("pending {}", i));
        }
        worker.start().unwrap();
        worker.stop();

        assert_eq!(buffer.lines().len(), 100);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_write_failure_drops_line_and_continues() {
        let (queue, sink, worker, buffer) = console_worker();

        sink.close();
        queue.enqueue("lost".to_string());
        worker.start().unwrap();
        worker.stop();
        assert!(queue.is_empty());

        sink.initialize(LogMode::Console, Path::new(".")).unwrap();
        worker.start().unwrap();
        queue.enqueue("kept".to_string());
        assert!(eventually(|| buffer.lines().contains(&"kept".to_string())));
        assert!(!buffer.lines().contains(&"lost".to_string()));
        worker.stop();
    }
}
