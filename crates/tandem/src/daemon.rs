//! Process-level bootstrap around the worker.
//!
//! A [`Daemon`] opens the file tracker named by the configuration, runs any
//! `before` hooks against the worker, and then runs the worker loop until a
//! shutdown signal arrives or a cycle fails fatally.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tandem_store::{FileTracker, RecordStore};
use tandem_sync::{Worker, WorkerConfig, WorkerState};
use tokio::sync::watch;

use crate::error::{Error, Result};

/// The worker type a daemon drives.
pub type DaemonWorker<R, L> = Worker<R, L, Arc<FileTracker>>;

type Hook<R, L> = Box<dyn FnOnce(&mut DaemonWorker<R, L>) + Send>;

/// Runs a worker until stopped.
pub struct Daemon<R, L> {
    worker: DaemonWorker<R, L>,
    hooks: Vec<Hook<R, L>>,
}

impl<R, L> Daemon<R, L>
where
    R: RecordStore,
    L: RecordStore,
{
    /// Build a daemon, opening the tracker at `config.tracker_path()`.
    pub fn new(remote: R, local: L, config: WorkerConfig) -> Result<Self> {
        let tracker = Arc::new(FileTracker::open(config.tracker_path())?);
        Ok(Self {
            worker: Worker::new(remote, local, tracker, config),
            hooks: Vec::new(),
        })
    }

    /// Build a daemon from a JSON configuration file.
    pub fn from_config_file(remote: R, local: L, path: impl AsRef<Path>) -> Result<Self> {
        Self::new(remote, local, WorkerConfig::from_file(path)?)
    }

    /// Register a hook that runs once, before the first cycle.
    ///
    /// Hooks run in the order they were added.
    pub fn before(mut self, hook: impl FnOnce(&mut DaemonWorker<R, L>) + Send + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn worker(&self) -> &DaemonWorker<R, L> {
        &self.worker
    }

    pub fn worker_mut(&mut self) -> &mut DaemonWorker<R, L> {
        &mut self.worker
    }

    /// Watch the worker's lifecycle.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.worker.subscribe()
    }

    /// Run until Ctrl-C or a fatal error.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves or a fatal error.
    ///
    /// A shutdown lets the in-flight cycle finish before returning.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        for hook in self.hooks.drain(..) {
            hook(&mut self.worker);
        }

        tracing::info!(
            mappings = self.worker.mappings().len(),
            tracker = %self.worker.config().tracker_path().display(),
            "starting daemon"
        );

        let (stop, stop_rx) = watch::channel(false);
        let run = self.worker.run(stop_rx);
        tokio::pin!(run);
        tokio::pin!(shutdown);

        let result = tokio::select! {
            result = &mut run => result,
            _ = &mut shutdown => {
                tracing::info!("shutdown requested, finishing current cycle");
                stop.send_replace(true);
                run.await
            }
        };

        match result {
            Ok(()) => {
                tracing::info!("daemon stopped");
                Ok(())
            }
            Err(error) => {
                tracing::error!(error = %error, fatal = true, "daemon aborted");
                Err(Error::Sync(error))
            }
        }
    }
}

/// Process exit status for a daemon outcome: 0 on a clean stop, 1 otherwise.
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tandem_core::Mapping;
    use tandem_store::MemoryStore;

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(&Ok(())), 0);
        assert_eq!(
            exit_code(&Err(Error::Logger("already installed".into()))),
            1
        );
    }

    #[tokio::test]
    async fn test_before_hooks_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkerConfig::default().with_tracker_path(dir.path().join(".tandem"));
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first = calls.clone();
        let second = calls.clone();
        let daemon = Daemon::new(
            Arc::new(MemoryStore::remote()),
            Arc::new(MemoryStore::local()),
            config,
        )
        .unwrap()
        .before(move |worker| {
            first.lock().unwrap().push(worker.mappings().len());
            worker.register(Mapping::new("m", "a", "A", [("x", "X")]));
        })
        .before(move |worker| {
            second.lock().unwrap().push(worker.mappings().len());
        });

        assert!(daemon.worker().mappings().is_empty());
        assert!(calls.lock().unwrap().is_empty());

        daemon.run_until(async {}).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![0, 1]);
    }
}
