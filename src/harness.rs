//! Runner-facing harness around a [`FixturePool`].
//!
//! Host test runners drive the pool through three hook points: run a test
//! body with its fixtures, tear down the Test scope afterwards (whatever the
//! outcome), and tear down the Worker scope once the worker is done.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::FutureExt;

use crate::error::{log_fixture_error, FixtureError};
use crate::fixture::{FixtureParams, FixturePool, Scope};

/// Adapter glue binding one worker's test loop to a fixture pool.
pub struct FixtureHarness {
    pool: FixturePool,
    tests_run: AtomicUsize,
    finished: AtomicBool,
}

impl FixtureHarness {
    pub fn new(pool: FixturePool) -> Self {
        Self {
            pool,
            tests_run: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &FixturePool {
        &self.pool
    }

    pub fn tests_run(&self) -> usize {
        self.tests_run.load(Ordering::SeqCst)
    }

    /// Run one test body with its fixtures, then tear down the Test scope.
    ///
    /// The Test scope is torn down even when resolution fails or the body
    /// panics; a panic is resumed once teardown has finished. A resolution
    /// failure takes precedence over a teardown failure; the teardown failure
    /// is still logged.
    pub async fn run_test<I, S, F, Fut, R>(
        &self,
        test_name: &str,
        dependencies: I,
        body: F,
    ) -> Result<R, FixtureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(FixtureParams) -> Fut,
        Fut: Future<Output = R>,
    {
        self.tests_run.fetch_add(1, Ordering::SeqCst);
        tracing::info!("[FixtureHarness] Running {}", test_name);

        let outcome = AssertUnwindSafe(self.pool.resolve_parameters_and_run(dependencies, body))
            .catch_unwind()
            .await;
        let teardown = self.pool.teardown_scope(Scope::Test).await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => {
                tracing::error!("[FixtureHarness] {} panicked", test_name);
                if let Err(teardown_err) = teardown {
                    log_fixture_error(&teardown_err, test_name);
                }
                panic::resume_unwind(payload);
            }
        };

        match (outcome, teardown) {
            (Ok(output), Ok(())) => Ok(output),
            (Ok(_), Err(teardown_err)) => {
                log_fixture_error(&teardown_err, test_name);
                Err(teardown_err)
            }
            (Err(err), teardown) => {
                log_fixture_error(&err, test_name);
                if let Err(teardown_err) = teardown {
                    log_fixture_error(&teardown_err, test_name);
                }
                Err(err)
            }
        }
    }

    /// Tear down the Worker scope. Call once, after the worker's last test.
    pub async fn finish(&self) -> Result<(), FixtureError> {
        self.finished.store(true, Ordering::SeqCst);
        tracing::info!(
            "[FixtureHarness] Finishing worker after {} test(s)",
            self.tests_run()
        );
        // Test fixtures normally die with their test; sweep stragglers first.
        let test_scope = self.pool.teardown_scope(Scope::Test).await;
        let worker_scope = self.pool.teardown_scope(Scope::Worker).await;

        let failures = [test_scope, worker_scope]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        match FixtureError::from_failures(failures) {
            Some(err) => {
                log_fixture_error(&err, "finish_worker");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

impl Drop for FixtureHarness {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) && !self.pool.live_fixtures().is_empty() {
            tracing::warn!(
                "[FixtureHarness] Dropped with live fixtures {:?}; call finish() to release them",
                self.pool.live_fixtures()
            );
        }
    }
}
