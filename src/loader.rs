use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use tracing::error;

/// Loads one remote collection in the background and hands it over through a
/// channel. Each `activate` discards the previous collection and any still
/// in-flight response; the whole list is replaced on success, never merged.
pub struct CollectionLoader<T> {
    items: Vec<T>,
    loading: bool,
    failed: bool,
    rx: Option<Receiver<Result<Vec<T>>>>,
}

impl<T> Default for CollectionLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CollectionLoader<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            failed: false,
            rx: None,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// True when the most recent load ended in a failure rather than an empty
    /// result. Callers that render failures distinctly (the users table) read
    /// this; the rest show the empty collection.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl<T: Send + 'static> CollectionLoader<T> {
    pub fn activate<F>(&mut self, fetch: F)
    where
        F: FnOnce() -> Result<Vec<T>> + Send + 'static,
    {
        self.items.clear();
        self.failed = false;
        self.loading = true;

        // Replacing the receiver drops the previous one, so a superseded
        // fetch can never deliver into the new activation.
        let (tx, rx) = bounded(1);
        self.rx = Some(rx);
        thread::spawn(move || {
            let _ = tx.send(fetch());
        });
    }

    /// Drains the in-flight response, if any. Returns true when state
    /// changed. Failures are logged and leave the collection empty.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = self.rx.as_ref() else {
            return false;
        };
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                self.loading = false;
                match result {
                    Ok(items) => self.items = items,
                    Err(err) => {
                        error!("collection load failed: {err:#}");
                        self.failed = true;
                    }
                }
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                self.loading = false;
                self.failed = true;
                true
            }
        }
    }

    /// Polls until the in-flight load settles or the timeout passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if !self.loading {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn successful_load_replaces_items() {
        let mut loader = CollectionLoader::new();
        loader.activate(|| Ok(vec![1, 2, 3]));
        assert!(loader.loading());
        assert!(loader.wait_idle(WAIT));
        assert_eq!(loader.items(), &[1, 2, 3]);
        assert!(!loader.failed());
    }

    #[test]
    fn failed_load_leaves_items_empty_and_flags() {
        let mut loader: CollectionLoader<i32> = CollectionLoader::new();
        loader.activate(|| bail!("network down"));
        assert!(loader.wait_idle(WAIT));
        assert!(loader.items().is_empty());
        assert!(loader.failed());
        assert!(!loader.loading());
    }

    #[test]
    fn reactivation_discards_previous_items_immediately() {
        let mut loader = CollectionLoader::new();
        loader.activate(|| Ok(vec![1]));
        assert!(loader.wait_idle(WAIT));
        assert_eq!(loader.items(), &[1]);

        loader.activate(|| Ok(vec![2, 3]));
        assert!(loader.items().is_empty());
        assert!(loader.loading());
        assert!(loader.wait_idle(WAIT));
        assert_eq!(loader.items(), &[2, 3]);
    }

    #[test]
    fn superseded_fetch_never_lands() {
        let (hold_tx, hold_rx) = bounded::<()>(1);
        let mut loader = CollectionLoader::new();
        loader.activate(move || {
            let _ = hold_rx.recv_timeout(Duration::from_secs(5));
            Ok(vec![1])
        });
        loader.activate(|| Ok(vec![2]));
        hold_tx.send(()).unwrap();
        assert!(loader.wait_idle(WAIT));
        assert_eq!(loader.items(), &[2]);

        // Give the stale fetch time to finish; its result must not appear.
        thread::sleep(Duration::from_millis(50));
        loader.poll();
        assert_eq!(loader.items(), &[2]);
    }
}
