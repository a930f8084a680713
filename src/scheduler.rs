//! Bounded-concurrency job execution.
//!
//! The [`JobScheduler`] owns a pool of worker threads fed through a request
//! channel and answering on a reply channel. Graph bookkeeping (countdowns,
//! the waiting set, counters and the failure status) is only touched by the
//! thread calling [`JobScheduler::collect`], so execution is parallel while
//! graph mutation stays single threaded.
//!
//! A job is handed to a worker only once every job it waits on has been
//! collected successfully. After the first failure no further job is
//! dispatched; jobs already running finish and are still collected.
//!
//! # Examples
//!
//! ```
//! use ccbuild::job::{FnCommand, Job};
//! use ccbuild::scheduler::JobScheduler;
//!
//! let mut scheduler = JobScheduler::new(None);
//! let mut compile = Job::new(FnCommand::new("compile", || 0));
//! let mut link = Job::new(FnCommand::new("link", || 0));
//! compile.register_derivative(&mut link);
//! scheduler.schedule(compile);
//! scheduler.schedule(link);
//!
//! let order: Vec<String> = std::iter::from_fn(|| scheduler.collect())
//!     .map(|job| job.command().to_owned())
//!     .collect();
//! assert_eq!(order, ["compile", "link"]);
//! assert_eq!(scheduler.status(), 0);
//! ```

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

use crate::job::{Job, JobId, Status};

/// Status recorded when waiting jobs can never become ready.
pub const STATUS_STALLED: Status = -1;

/// Runs jobs on a pool of worker threads, honouring their countdowns.
pub struct JobScheduler {
    concurrency: NonZeroUsize,
    request_tx: Option<Sender<Job>>,
    request_rx: Receiver<Job>,
    reply_tx: Sender<Job>,
    reply_rx: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
    started: bool,
    waiting: HashMap<JobId, Job>,
    credits: HashMap<JobId, usize>,
    in_flight: usize,
    total_count: usize,
    finish_count: usize,
    status: Status,
}

impl JobScheduler {
    /// Create a scheduler running up to `concurrency` jobs at once.
    ///
    /// `None` uses the host's available parallelism.
    #[must_use]
    pub fn new(concurrency: Option<NonZeroUsize>) -> Self {
        let concurrency = concurrency.unwrap_or_else(|| {
            thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
        });
        let (request_tx, request_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();
        Self {
            concurrency,
            request_tx: Some(request_tx),
            request_rx,
            reply_tx,
            reply_rx,
            workers: Vec::new(),
            started: false,
            waiting: HashMap::new(),
            credits: HashMap::new(),
            in_flight: 0,
            total_count: 0,
            finish_count: 0,
            status: 0,
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    /// First non-zero status observed, or `0`.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Number of jobs handed to [`schedule`](Self::schedule).
    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.total_count
    }

    /// Number of jobs returned by [`collect`](Self::collect).
    #[must_use]
    pub const fn finish_count(&self) -> usize {
        self.finish_count
    }

    /// Number of jobs still waiting for a prerequisite.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Submit a job. Ready jobs are queued for the workers immediately,
    /// others wait until their countdown reaches zero.
    pub fn schedule(&mut self, mut job: Job) {
        self.total_count += 1;
        if let Some(credit) = self.credits.remove(&job.id()) {
            job.release(credit);
        }
        if job.count_down() == 0 {
            self.dispatch(job);
        } else {
            debug!(job = %job.id(), count_down = job.count_down(), "waiting");
            self.waiting.insert(job.id(), job);
        }
    }

    /// Start the worker pool. Does nothing when already started or when
    /// nothing has been scheduled yet.
    pub fn start(&mut self) {
        if self.started || self.total_count == 0 {
            return;
        }
        self.started = true;

        for index in 0..self.concurrency.get() {
            let requests = self.request_rx.clone();
            let replies = self.reply_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("ccbuild-worker-{index}"))
                .spawn(move || serve(&requests, &replies));
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    error!(error = %err, "failed to spawn worker thread");
                    break;
                }
            }
        }

        if self.workers.is_empty() {
            self.fail(STATUS_STALLED);
        }
    }

    /// Wait for the next finished job.
    ///
    /// Returns `None` once every scheduled job has been collected, when
    /// nothing was scheduled, or when a failure stopped admission and the
    /// remaining in-flight jobs have drained.
    pub fn collect(&mut self) -> Option<Job> {
        if self.total_count == 0 || self.finish_count == self.total_count {
            return None;
        }

        self.start();

        if self.in_flight == 0 {
            if self.status == 0 {
                error!(
                    waiting = self.waiting.len(),
                    "jobs are waiting on prerequisites that will never finish"
                );
                self.status = STATUS_STALLED;
            }
            return None;
        }

        let job = self.reply_rx.recv().ok()?;
        self.in_flight -= 1;

        if job.status() == 0 {
            for derivative in job.derivatives() {
                self.release(*derivative);
            }
        } else {
            warn!(job = %job.id(), status = job.status(), "job failed");
            self.fail(job.status());
        }

        self.finish_count += 1;
        Some(job)
    }

    fn dispatch(&mut self, job: Job) {
        if self.status != 0 {
            debug!(job = %job.id(), "not admitted after failure");
            return;
        }
        let Some(requests) = &self.request_tx else {
            return;
        };
        match requests.send(job) {
            Ok(()) => self.in_flight += 1,
            Err(err) => error!(job = %err.0.id(), "request channel closed"),
        }
    }

    fn release(&mut self, id: JobId) {
        match self.waiting.get_mut(&id) {
            Some(job) => {
                if job.release(1) {
                    if let Some(ready) = self.waiting.remove(&id) {
                        self.dispatch(ready);
                    }
                }
            }
            None => *self.credits.entry(id).or_default() += 1,
        }
    }

    /// Record a failure and stop admitting work.
    fn fail(&mut self, status: Status) {
        if self.status == 0 {
            self.status = status;
        }
        // Take back every job no worker has picked up yet.
        while let Ok(job) = self.request_rx.try_recv() {
            debug!(job = %job.id(), "withdrawn after failure");
            self.in_flight -= 1;
        }
        self.request_tx = None;
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.request_tx = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

fn serve(requests: &Receiver<Job>, replies: &Sender<Job>) {
    for mut job in requests {
        job.run();
        if replies.send(job).is_err() {
            break;
        }
    }
}
