use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::error;

use crate::api::ImageDetail;

const DEFAULT_WORKERS: usize = 4;

/// Narrow fetch facade the aggregator fans out over. One detail lookup and
/// one comment count per post id.
pub trait DetailSource: Send + Sync {
    fn detail(&self, id: &str) -> Result<Option<ImageDetail>>;
    fn comment_count(&self, id: &str) -> Result<u64>;
}

#[derive(Debug)]
struct FetchOutcome {
    id: String,
    detail: Option<ImageDetail>,
    comments: Option<u64>,
}

struct Job {
    id: String,
    tx: Sender<FetchOutcome>,
}

struct Pool {
    jobs: Sender<Job>,
    stop: Sender<()>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Pool {
    fn new(source: Arc<dyn DetailSource>, workers: usize) -> Self {
        let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
        let (job_tx, job_rx) = unbounded::<Job>();
        let (stop_tx, stop_rx) = unbounded();

        let mut handles = Vec::new();
        for _ in 0..workers {
            let rx_jobs = job_rx.clone();
            let rx_stop = stop_rx.clone();
            let worker_source = source.clone();
            handles.push(thread::spawn(move || {
                worker(worker_source, rx_jobs, rx_stop)
            }));
        }

        Self {
            jobs: job_tx,
            stop: stop_tx,
            handles,
        }
    }

    fn shutdown(&mut self) {
        for _ in &self.handles {
            let _ = self.stop.send(());
        }
        while let Some(handle) = self.handles.pop() {
            let _ = handle.join();
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker(source: Arc<dyn DetailSource>, jobs: Receiver<Job>, stop: Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(stop) -> _ => break,
            recv(jobs) -> msg => {
                match msg {
                    Ok(job) => process(source.as_ref(), job),
                    Err(_) => break,
                }
            }
        }
    }
}

// Either fetch may fail on its own; the other still lands. Failures are
// terminal for the id, so they are reported as absent rather than retried.
fn process(source: &dyn DetailSource, job: Job) {
    let detail = match source.detail(&job.id) {
        Ok(detail) => detail,
        Err(err) => {
            error!(id = %job.id, "detail fetch failed: {err:#}");
            None
        }
    };
    let comments = match source.comment_count(&job.id) {
        Ok(count) => Some(count),
        Err(err) => {
            error!(id = %job.id, "comment count fetch failed: {err:#}");
            None
        }
    };
    let _ = job.tx.send(FetchOutcome {
        id: job.id,
        detail,
        comments,
    });
}

struct Batch {
    pending: usize,
    rx: Receiver<FetchOutcome>,
    settled: Vec<FetchOutcome>,
}

/// Assembles per-post detail data for a collection of post ids, fetching each
/// distinct id at most once for the aggregator's lifetime.
///
/// All maps are owned by the instance and grow monotonically: entries are
/// merged in, never removed, until the aggregator is dropped. Each
/// `reconcile` call produces one batch whose results are merged as a single
/// state update once every fetch in the batch has settled.
pub struct DetailAggregator {
    pool: Pool,
    fetched: HashSet<String>,
    details: HashMap<String, ImageDetail>,
    comment_counts: HashMap<String, u64>,
    batches: Vec<Batch>,
}

impl DetailAggregator {
    pub fn new(source: Arc<dyn DetailSource>, workers: usize) -> Self {
        Self {
            pool: Pool::new(source, workers),
            fetched: HashSet::new(),
            details: HashMap::new(),
            comment_counts: HashMap::new(),
            batches: Vec::new(),
        }
    }

    /// Dispatches fetches for ids not seen before and returns how many were
    /// dispatched. Ids already attempted (even if they failed) are skipped;
    /// supplying a subset of known ids performs zero network calls.
    pub fn reconcile(&mut self, ids: &[String]) -> usize {
        let mut new_ids = Vec::new();
        for id in ids {
            if self.fetched.insert(id.clone()) {
                new_ids.push(id.clone());
            }
        }
        if new_ids.is_empty() {
            return 0;
        }

        let (tx, rx) = unbounded();
        let pending = new_ids.len();
        for id in new_ids {
            let _ = self.pool.jobs.send(Job { id, tx: tx.clone() });
        }
        self.batches.push(Batch {
            pending,
            rx,
            settled: Vec::new(),
        });
        pending
    }

    /// Drains finished fetches and merges any fully settled batch. Returns
    /// true when state changed. A batch merges all at once, so readers never
    /// observe part of a batch alongside `loading() == true` for it.
    pub fn poll(&mut self) -> bool {
        let mut merged = false;
        let mut remaining = Vec::new();
        for mut batch in self.batches.drain(..) {
            while let Ok(outcome) = batch.rx.try_recv() {
                batch.settled.push(outcome);
            }
            if batch.settled.len() == batch.pending {
                for outcome in batch.settled {
                    if let Some(detail) = outcome.detail {
                        self.details.insert(outcome.id.clone(), detail);
                    }
                    if let Some(count) = outcome.comments {
                        self.comment_counts.insert(outcome.id, count);
                    }
                }
                merged = true;
            } else {
                remaining.push(batch);
            }
        }
        self.batches = remaining;
        merged
    }

    pub fn loading(&self) -> bool {
        !self.batches.is_empty()
    }

    pub fn details(&self) -> &HashMap<String, ImageDetail> {
        &self.details
    }

    pub fn comment_counts(&self) -> &HashMap<String, u64> {
        &self.comment_counts
    }

    pub fn detail(&self, id: &str) -> Option<&ImageDetail> {
        self.details.get(id)
    }

    pub fn comment_count(&self, id: &str) -> Option<u64> {
        self.comment_counts.get(id).copied()
    }

    /// Polls until every outstanding batch has merged or the timeout passes.
    /// Returns false on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if !self.loading() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}
