//! Runtime context of the worker threads.
use crate::ApexTrainerError;
use anyhow::Result;
use log::{info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Owns the worker threads of a training run.
///
/// A runtime is created once with [`Runtime::init`] and handed to the
/// [`ActorPool`](crate::ActorPool), which spawns its actors through it. It holds the
/// stop flag the workers poll and a guard serializing environment construction.
/// [`Runtime::shutdown`] raises the stop flag and joins every worker.
pub struct Runtime {
    stop: Arc<AtomicBool>,
    guard_init_env: Arc<Mutex<()>>,
    threads: Mutex<Vec<(String, JoinHandle<()>)>>,
    grace_period: Duration,
}

impl Runtime {
    /// Creates a runtime without workers.
    pub fn init() -> Self {
        info!("Initialized runtime");
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            guard_init_env: Arc::new(Mutex::new(())),
            threads: Mutex::new(vec![]),
            grace_period: Duration::from_secs(10),
        }
    }

    /// Sets how long [`Runtime::shutdown`] waits for workers before detaching them.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Flag raised on shutdown.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Whether shutdown has started.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Guard held while an environment is built.
    pub fn guard_init_env(&self) -> Arc<Mutex<()>> {
        self.guard_init_env.clone()
    }

    /// Spawns a named worker thread.
    pub fn spawn<F>(&self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(f)
            .map_err(|e| ApexTrainerError::Spawn {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        match self.threads.lock() {
            Ok(mut threads) => threads.push((name, handle)),
            Err(mut poisoned) => poisoned.get_mut().push((name, handle)),
        }
        Ok(())
    }

    /// Number of workers spawned so far.
    pub fn n_threads(&self) -> usize {
        match self.threads.lock() {
            Ok(threads) => threads.len(),
            Err(poisoned) => poisoned.get_ref().len(),
        }
    }

    /// Raises the stop flag and joins the workers.
    ///
    /// Workers still running after the grace period are detached with a warning.
    /// Fails if a worker panicked.
    pub fn shutdown(self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        let threads = match self.threads.into_inner() {
            Ok(threads) => threads,
            Err(poisoned) => poisoned.into_inner(),
        };
        let deadline = Instant::now() + self.grace_period;
        let mut panicked = None;

        for (name, handle) in threads {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("Thread {} panicked", name);
                    panicked = Some(name);
                }
            } else {
                warn!("Detached thread {} after the grace period", name);
            }
        }
        info!("Shut down runtime");

        match panicked {
            Some(name) => Err(ApexTrainerError::Panicked(name).into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn shutdown_stops_and_joins_workers() -> Result<()> {
        let runtime = Runtime::init();
        for i in 0..3 {
            let stop = runtime.stop_flag();
            runtime.spawn(format!("worker-{}", i), move || {
                while !stop.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            })?;
        }
        assert_eq!(runtime.n_threads(), 3);
        runtime.shutdown()
    }

    #[test]
    fn shutdown_reports_panics() -> Result<()> {
        let runtime = Runtime::init();
        runtime.spawn("bad", || panic!("boom"))?;
        let err = runtime.shutdown().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ApexTrainerError>(),
            Some(&ApexTrainerError::Panicked("bad".to_string()))
        );
        Ok(())
    }

    #[test]
    fn hung_worker_is_detached() -> Result<()> {
        let runtime = Runtime::init().grace_period(Duration::from_millis(20));
        runtime.spawn("hung", || thread::sleep(Duration::from_millis(500)))?;
        runtime.shutdown()
    }
}
