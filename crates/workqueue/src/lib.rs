//! Fixed-size worker pool with a join counter.
//!
//! Tasks are boxed closures pulled off a shared channel by `N` long-lived
//! threads. Every accepted task bumps an outstanding counter that is only
//! decremented once the task has finished running (or panicked), so
//! [`WorkQueue::wait`] returns exactly when everything submitted so far,
//! including tasks submitted *by* tasks, has completed.
//!
//! Tasks that need to enqueue follow-up work capture a [`Submitter`] (see
//! [`WorkQueue::submitter`]) rather than a reference to the queue itself.

pub mod error;

use crate::error::{ErrorKind, Result};
use crossbeam_channel::{Receiver, Sender};
use exn::ResultExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Terminate,
}

/// Outstanding task counter. The count and the condition variable share one
/// mutex so a waiter can never miss the final decrement.
#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    settled: Condvar,
}
impl Outstanding {
    fn increment(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.settled.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self.settled.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn get(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle for submitting tasks, safe to move into tasks.
#[derive(Clone)]
pub struct Submitter {
    sender: Sender<Message>,
    outstanding: Arc<Outstanding>,
}
impl Submitter {
    /// Enqueue a task. Never blocks.
    ///
    /// # Errors
    /// Returns [`ErrorKind::ShutDown`] when every worker has already exited.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        // Count before sending; a worker could otherwise finish the task and
        // decrement before the increment lands.
        self.outstanding.increment();
        if self.sender.send(Message::Run(Box::new(task))).is_err() {
            self.outstanding.decrement();
            exn::bail!(ErrorKind::ShutDown);
        }
        Ok(())
    }

    /// Number of tasks submitted but not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }
}

/// A pool of `N` worker threads sharing one task channel.
///
/// Dropping the queue waits for outstanding work and joins the workers.
pub struct WorkQueue {
    submitter: Submitter,
    workers: Vec<JoinHandle<()>>,
}

impl WorkQueue {
    /// Start `workers` threads.
    ///
    /// # Errors
    /// - [`ErrorKind::NoWorkers`] if `workers` is zero.
    /// - [`ErrorKind::Spawn`] if a thread could not be started.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            exn::bail!(ErrorKind::NoWorkers);
        }
        let (sender, receiver) = crossbeam_channel::unbounded();
        let outstanding = Arc::new(Outstanding::default());
        let mut queue = Self { submitter: Submitter { sender, outstanding }, workers: Vec::with_capacity(workers) };
        for index in 0..workers {
            let receiver = receiver.clone();
            let outstanding = Arc::clone(&queue.submitter.outstanding);
            // On failure, workers started so far are stopped when `queue` drops.
            let handle = thread::Builder::new()
                .name(format!("cdman-worker-{index}"))
                .spawn(move || work(index, receiver, outstanding))
                .or_raise(|| ErrorKind::Spawn)?;
            queue.workers.push(handle);
        }
        tracing::debug!(workers, "Started work queue");
        Ok(queue)
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a task. See [`Submitter::submit`].
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submitter.submit(task)
    }

    /// A cloneable handle that tasks can capture to submit follow-up work.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Block until every task submitted so far, and every task those tasks
    /// submitted, has finished.
    ///
    /// Must not be called from inside a task: the calling worker would be
    /// counted as outstanding while waiting on itself.
    pub fn wait(&self) {
        self.submitter.outstanding.wait();
    }

    /// Wait for outstanding work, then stop and join every worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.wait();
        for _ in 0..self.workers.len() {
            // Receivers only disappear once workers exit, which happens after
            // they see Terminate; a send failure means nobody is left to stop.
            if self.submitter.sender.send(Message::Terminate).is_err() {
                break;
            }
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread exited abnormally");
            }
        }
        tracing::debug!("Work queue shut down");
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn work(index: usize, receiver: Receiver<Message>, outstanding: Arc<Outstanding>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic payload".to_string());
                    tracing::error!(worker = index, %reason, "Task panicked");
                }
                outstanding.decrement();
            },
            Message::Terminate => break,
        }
    }
    tracing::trace!(worker = index, "Worker stopped");
}
