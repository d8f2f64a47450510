//! UI sequence task queue and blocking workers
//!
//! Managed objects are only touched from the UI sequence. Blocking work
//! (disk, uploads) runs on the runtime's blocking pool and its reply is
//! queued back here; the owner of the UI sequence drains the queue.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::sequence::SequenceChecker;

type UiTask = Box<dyn FnOnce() + Send>;

pub struct TaskRunner {
    sender: UnboundedSender<UiTask>,
    receiver: Mutex<UnboundedReceiver<UiTask>>,
    runtime: Handle,
    sequence: SequenceChecker,
}

impl TaskRunner {
    /// Binds the UI sequence to the calling thread; background work goes to
    /// `runtime`.
    pub fn new(runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            runtime,
            sequence: SequenceChecker::new(),
        }
    }

    /// Queues `task` to run on the UI sequence after the current one.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(task)).is_err() {
            tracing::debug!("UI queue closed; dropping task");
        }
    }

    /// Runs `work` on a blocking worker, then `reply` with its result on the
    /// UI sequence.
    pub fn post_blocking<T, W, R>(&self, work: W, reply: R)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        R: FnOnce(T) + Send + 'static,
    {
        let sender = self.sender.clone();
        self.runtime.spawn_blocking(move || {
            let result = work();
            if sender.send(Box::new(move || reply(result))).is_err() {
                tracing::debug!("UI queue closed; dropping reply");
            }
        });
    }

    fn pop(&self) -> Option<UiTask> {
        match self.receiver.lock().try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Runs every task that is already queued, including ones queued by the
    /// tasks themselves. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        self.sequence.check("task runner");
        let mut ran = 0;
        while let Some(task) = self.pop() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one task and runs it.
    pub fn run_next(&self, timeout: Duration) -> bool {
        self.sequence.check("task runner");
        let task = {
            let mut receiver = self.receiver.lock();
            self.runtime
                .block_on(tokio::time::timeout(timeout, receiver.recv()))
                .ok()
                .flatten()
        };

        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Drains tasks until `done` holds or `timeout` passes.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_until_idle();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.run_next(deadline - now);
        }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_posted_tasks_run_in_order() {
        let rt = runtime();
        let runner = TaskRunner::new(rt.handle().clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            runner.post(move || log.lock().push(i));
        }

        assert_eq!(runner.run_until_idle(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert_eq!(runner.run_until_idle(), 0);
    }

    #[test]
    fn test_blocking_reply_comes_back_to_ui_thread() {
        let rt = runtime();
        let runner = TaskRunner::new(rt.handle().clone());
        let ui_thread = std::thread::current().id();
        let replies = Arc::new(AtomicUsize::new(0));

        let seen = replies.clone();
        runner.post_blocking(
            move || std::thread::current().id(),
            move |worker_thread| {
                assert_ne!(worker_thread, ui_thread);
                assert_eq!(std::thread::current().id(), ui_thread);
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert!(runner.run_until(Duration::from_secs(5), || replies.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_run_next_times_out() {
        let rt = runtime();
        let runner = TaskRunner::new(rt.handle().clone());
        assert!(!runner.run_next(Duration::from_millis(10)));
    }
}
