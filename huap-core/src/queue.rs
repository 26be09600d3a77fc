use std::collections::VecDeque;
use std::path::PathBuf;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Byte-for-byte copy preserving permissions and timestamps
    Copy,
    /// Markdown rendered through the full pipeline
    Render,
}

#[derive(Debug)]
pub struct Job {
    pub kind: JobKind,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Returned by [`JobQueue::push`] once the queue is closed. Carries the
/// rejected job back to the caller.
#[derive(Debug, thiserror::Error)]
#[error("job queue is closed")]
pub struct QueueClosed(pub Job);

#[derive(Default)]
struct State {
    jobs: VecDeque<Job>,
    closed: bool,
}

/// Unbounded FIFO fed by one producer and drained by the worker pool.
///
/// Closing is one-way. Workers keep popping until the queue is both closed
/// and empty.
#[derive(Default)]
pub struct JobQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: Job) -> Result<(), QueueClosed> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueClosed(job));
        }
        state.jobs.push_back(job);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until a job is available. `None` means closed and drained.
    pub fn pop(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Stops accepting jobs and wakes every idle worker.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
    }

    /// Jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.state.lock().jobs.len()
    }
}
