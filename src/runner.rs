//! Fan a task out over a bounded pool of worker threads.
//!
//! Items sit in a crossbeam channel; `try_recv` is the atomic pop, so each item
//! is handed to exactly one worker. Workers keep pulling until the channel is
//! empty or they hit a rate limit, in which case that worker stops and its
//! in-flight item is lost. Every other failure only skips the item.

use crate::error::TaskError;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use std::fmt::Display;
use std::time::Instant;

/// What a task hands back for one item.
#[derive(Debug)]
pub enum TaskOutput<T, X = ()> {
    /// Nothing is appended to the results.
    Dropped,
    /// One record; with `extra` it becomes [`Record::WithExtra`].
    Single { value: T, extra: Option<X> },
    /// Every element is appended on its own. Extras are not carried here.
    Iterate(Vec<Element<T>>),
}

impl<T, X> TaskOutput<T, X> {
    pub fn single(value: T) -> Self {
        TaskOutput::Single { value, extra: None }
    }

    pub fn with_extra(value: T, extra: X) -> Self {
        TaskOutput::Single { value, extra: Some(extra) }
    }
}

#[derive(Debug)]
pub enum Element<T> {
    Item(T),
    /// Each key/value pair becomes its own [`Record::Entry`].
    Mapping(Vec<(String, T)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record<T, X = ()> {
    Value(T),
    WithExtra(T, X),
    Entry(String, T),
}

impl<T, X> Record<T, X> {
    pub fn into_value(self) -> T {
        match self {
            Record::Value(value) | Record::WithExtra(value, _) | Record::Entry(_, value) => value,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub workers: usize,
    pub processed: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub skipped: usize,
    pub aborted_workers: usize,
    pub abandoned: usize,
}

struct WorkerReport<T, X> {
    records: Vec<Record<T, X>>,
    processed: usize,
    dropped: usize,
    skipped: usize,
    aborted: bool,
}

/// Threads a single pass may use regardless of what a stage asks for.
pub fn platform_thread_limit() -> usize {
    (num_cpus::get() * 16).clamp(8, 256)
}

pub struct TaskRunner {
    name: String,
    workers: usize,
    thread_limit: usize,
    progress: Option<ProgressBar>,
}

impl TaskRunner {
    pub fn new(name: impl Into<String>, workers: usize) -> Self {
        Self { name: name.into(), workers, thread_limit: platform_thread_limit(), progress: None }
    }

    pub fn with_thread_limit(mut self, limit: usize) -> Self {
        self.thread_limit = limit.max(1);
        self
    }

    /// Advanced by one for every item a worker takes off the queue.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn effective_workers(&self, items: usize) -> usize {
        self.workers.max(1).min(items).min(self.thread_limit)
    }

    /// Runs `task` over every input item and appends what it emits to `results`,
    /// which may already hold records from an earlier pass. Record order is
    /// unspecified.
    pub fn run<I, A, T, X, F>(&self, input: Vec<I>, task: F, args: &A, results: Vec<Record<T, X>>) -> Result<Vec<Record<T, X>>>
    where
        I: Display + Send,
        A: Sync + ?Sized,
        T: Send,
        X: Send,
        F: Fn(I, &A) -> Result<TaskOutput<T, X>, TaskError> + Sync,
    {
        Ok(self.run_with_summary(input, task, args, results)?.0)
    }

    pub fn run_with_summary<I, A, T, X, F>(
        &self,
        input: Vec<I>,
        task: F,
        args: &A,
        mut results: Vec<Record<T, X>>,
    ) -> Result<(Vec<Record<T, X>>, RunSummary)>
    where
        I: Display + Send,
        A: Sync + ?Sized,
        T: Send,
        X: Send,
        F: Fn(I, &A) -> Result<TaskOutput<T, X>, TaskError> + Sync,
    {
        if input.is_empty() {
            debug!("{}: nothing to process", self.name);
            return Ok((results, RunSummary::default()));
        }

        let start = Instant::now();
        let total = input.len();
        let num_workers = self.effective_workers(total);

        let (item_sender, item_receiver) = unbounded::<I>();
        for item in input {
            item_sender.send(item).map_err(|_| anyhow!("Work queue closed while filling"))?;
        }
        drop(item_sender);

        let name = self.name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(move |i| format!("{}-{}", name, i))
            .build()
            .with_context(|| format!("Failed to build thread pool of {} workers for {}", num_workers, self.name))?;
        info!("{}: {} items over {} workers", self.name, total, num_workers);

        let (report_sender, report_receiver) = unbounded::<WorkerReport<T, X>>();
        let queue = &item_receiver;
        let task = &task;
        pool.scope(|s| {
            for worker in 0..num_workers {
                let report_sender = report_sender.clone();
                s.spawn(move |_| {
                    let report = self.work(worker, queue, task, args);
                    if report_sender.send(report).is_err() {
                        error!("{}-{}: result channel closed, results lost", self.name, worker);
                    }
                });
            }
        });
        drop(report_sender);

        let mut summary = RunSummary { workers: num_workers, ..RunSummary::default() };
        for report in report_receiver {
            summary.processed += report.processed;
            summary.dropped += report.dropped;
            summary.skipped += report.skipped;
            summary.emitted += report.records.len();
            if report.aborted {
                summary.aborted_workers += 1;
            }
            results.extend(report.records);
        }

        summary.abandoned = item_receiver.len();
        if summary.abandoned > 0 {
            warn!("{}: every worker aborted, {} items were never processed", self.name, summary.abandoned);
        }

        info!(
            "{}: processed {} items -> {} records ({} dropped, {} skipped, {} workers aborted) in {:.2?}",
            self.name,
            summary.processed,
            summary.emitted,
            summary.dropped,
            summary.skipped,
            summary.aborted_workers,
            start.elapsed()
        );
        Ok((results, summary))
    }

    fn work<I, A, T, X, F>(&self, worker: usize, queue: &Receiver<I>, task: &F, args: &A) -> WorkerReport<T, X>
    where
        I: Display,
        A: ?Sized,
        F: Fn(I, &A) -> Result<TaskOutput<T, X>, TaskError>,
    {
        let mut report = WorkerReport { records: Vec::new(), processed: 0, dropped: 0, skipped: 0, aborted: false };

        while let Ok(item) = queue.try_recv() {
            let label = item.to_string();
            let outcome = task(item, args);
            report.processed += 1;
            if let Some(progress) = &self.progress {
                progress.inc(1);
            }

            match outcome {
                Ok(TaskOutput::Dropped) => report.dropped += 1,
                Ok(TaskOutput::Single { value, extra: Some(extra) }) => report.records.push(Record::WithExtra(value, extra)),
                Ok(TaskOutput::Single { value, extra: None }) => report.records.push(Record::Value(value)),
                Ok(TaskOutput::Iterate(elements)) => {
                    for element in elements {
                        match element {
                            Element::Item(value) => report.records.push(Record::Value(value)),
                            Element::Mapping(pairs) => report.records.extend(pairs.into_iter().map(|(key, value)| Record::Entry(key, value))),
                        }
                    }
                }
                Err(TaskError::RateLimited(msg)) => {
                    error!("{}-{}: while processing {}, rate limited: {}. ABORTING FURTHER RUN", self.name, worker, label, msg);
                    report.aborted = true;
                    break;
                }
                Err(TaskError::FetchFailed(msg)) => {
                    warn!("{}-{}: while processing {}, connection error: {}", self.name, worker, label, msg);
                    report.skipped += 1;
                }
                Err(TaskError::InvalidInput(msg)) => {
                    warn!("{}-{}: while processing {}, invalid input: {}", self.name, worker, label, msg);
                    report.skipped += 1;
                }
                Err(TaskError::Unexpected(e)) => {
                    error!("{}-{}: while processing {}, an unexpected error was raised: {:#}", self.name, worker, label, e);
                    report.skipped += 1;
                }
            }
        }
        report
    }
}
