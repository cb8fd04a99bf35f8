//! Live fixture instances and their setup/teardown protocol.
//!
//! A [`Fixture`] is one instantiation of a [`Registration`]. Setup resolves
//! its dependencies through the owning pool, records itself in each
//! dependency's `usages`, then runs the factory. Teardown walks `usages`
//! first so dependents are always released before the values they consumed.
//!
//! Both phases are single-flight: the first caller creates a shared future,
//! every later or concurrent caller awaits the same outcome.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use once_cell::sync::OnceCell;

use crate::error::{log_fixture_error, ErrorCode, FixtureError};
use crate::fixture::factory::ReleaseHandle;
use crate::fixture::introspect::Dependencies;
use crate::fixture::pool::PoolShared;
use crate::fixture::registration::Registration;
use crate::fixture::scope::Scope;
use crate::fixture::value::{FixtureParams, FixtureValue};
use crate::telemetry::LifecycleEvent;

type SharedOutcome = Shared<BoxFuture<'static, Result<(), FixtureError>>>;

/// One live instantiation of a registered fixture.
pub struct Fixture {
    registration: Arc<Registration>,
    pool: Weak<PoolShared>,
    value: OnceCell<FixtureValue>,
    released: AtomicBool,
    release: Mutex<Option<ReleaseHandle>>,
    usages: Mutex<BTreeSet<String>>,
    setup: Mutex<Option<SharedOutcome>>,
    teardown: Mutex<Option<SharedOutcome>>,
}

impl Fixture {
    pub(crate) fn new(registration: Arc<Registration>, pool: Weak<PoolShared>) -> Self {
        Self {
            registration,
            pool,
            value: OnceCell::new(),
            released: AtomicBool::new(false),
            release: Mutex::new(None),
            usages: Mutex::new(BTreeSet::new()),
            setup: Mutex::new(None),
            teardown: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.registration.name()
    }

    pub fn scope(&self) -> Scope {
        self.registration.scope()
    }

    /// Dependency names cached from the registration, in declaration order.
    pub fn dependencies(&self) -> &Dependencies {
        self.registration.dependencies()
    }

    /// Published value; `None` until setup has completed and again once the
    /// fixture has been released.
    pub fn value(&self) -> Option<FixtureValue> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        self.value.get().cloned()
    }

    pub fn is_set_up(&self) -> bool {
        self.value().is_some()
    }

    /// Whether teardown has been requested (it may still be running).
    pub fn is_tearing_down(&self) -> bool {
        lock(&self.teardown).is_some()
    }

    /// Names of fixtures that consumed this one during their setup.
    pub fn usages(&self) -> Vec<String> {
        lock(&self.usages).iter().cloned().collect()
    }

    /// Ensure the fixture is set up. Concurrent and repeated calls share one
    /// attempt; a failed attempt is not retried on this instance.
    pub async fn setup(self: &Arc<Self>) -> Result<(), FixtureError> {
        self.setup_outcome().await
    }

    /// Tear the fixture down after every dependent has been torn down.
    /// Idempotent: the release action runs at most once.
    pub async fn teardown(self: &Arc<Self>) -> Result<(), FixtureError> {
        self.teardown_outcome().await
    }

    pub(crate) fn published_value(&self) -> Result<FixtureValue, FixtureError> {
        self.value().ok_or_else(|| FixtureError::SetupFailed {
            fixture: self.name().to_string(),
            reason: "setup finished without publishing a value".to_string(),
        })
    }

    pub(crate) fn add_usage(&self, dependent: &str) {
        lock(&self.usages).insert(dependent.to_string());
    }

    fn setup_outcome(self: &Arc<Self>) -> SharedOutcome {
        let mut slot = lock(&self.setup);
        slot.get_or_insert_with(|| Arc::clone(self).run_setup().boxed().shared())
            .clone()
    }

    fn teardown_outcome(self: &Arc<Self>) -> SharedOutcome {
        let mut slot = lock(&self.teardown);
        slot.get_or_insert_with(|| Arc::clone(self).run_teardown().boxed().shared())
            .clone()
    }

    async fn run_setup(self: Arc<Self>) -> Result<(), FixtureError> {
        let Some(pool) = self.pool.upgrade() else {
            return Err(FixtureError::SetupFailed {
                fixture: self.name().to_string(),
                reason: "fixture pool was dropped".to_string(),
            });
        };

        pool.record(LifecycleEvent::SetupStarted {
            fixture: self.name().to_string(),
            scope: self.scope(),
        });
        tracing::debug!(
            "[Fixture] Setting up {} ({}) with dependencies {}",
            self.name(),
            self.scope(),
            self.dependencies()
        );

        let result = self.acquire(&pool).await;
        match &result {
            Ok(()) => {
                pool.record(LifecycleEvent::SetupCompleted {
                    fixture: self.name().to_string(),
                    scope: self.scope(),
                });
            }
            Err(err) => {
                // A failed instance must never be observed as live.
                pool.evict(&self);
                pool.record(LifecycleEvent::SetupFailed {
                    fixture: self.name().to_string(),
                    scope: self.scope(),
                    code: err.code(),
                    reason: err.message(),
                });
                log_fixture_error(err, "fixture_setup");
            }
        }
        result
    }

    async fn acquire(&self, pool: &Arc<PoolShared>) -> Result<(), FixtureError> {
        let mut params = FixtureParams::new();
        for name in self.dependencies().iter() {
            let dependency = pool.acquire(name).await?;
            if dependency.is_tearing_down() {
                return Err(FixtureError::SetupFailed {
                    fixture: self.name().to_string(),
                    reason: format!("dependency \"{name}\" is being torn down"),
                });
            }
            dependency.add_usage(self.name());
            params.insert(name, dependency.published_value()?);
        }

        let provision = self
            .registration
            .factory()
            .setup(params)
            .await
            .map_err(|err| FixtureError::SetupFailed {
                fixture: self.name().to_string(),
                reason: format!("{err:#}"),
            })?;

        let (value, release) = provision.into_parts();
        *lock(&self.release) = release;
        let _ = self.value.set(value);
        Ok(())
    }

    async fn run_teardown(self: Arc<Self>) -> Result<(), FixtureError> {
        let pool = self.pool.upgrade();
        if let Some(pool) = &pool {
            pool.record(LifecycleEvent::TeardownStarted {
                fixture: self.name().to_string(),
                scope: self.scope(),
            });
        }

        // Let an in-flight setup settle first so late dependents are seen.
        let setup = lock(&self.setup).clone();
        if let Some(setup) = setup {
            let _ = setup.await;
        }

        let mut failures = Vec::new();

        if let Some(pool) = &pool {
            for name in self.usages() {
                let Some(dependent) = pool.live(&name) else {
                    continue;
                };
                if let Err(err) = dependent.teardown_outcome().await {
                    failures.push(err);
                }
            }
        }

        let release = lock(&self.release).take();
        if let Some(release) = release {
            tracing::debug!("[Fixture] Releasing {}", self.name());
            if let Err(err) = release.release().await {
                failures.push(FixtureError::TeardownFailed {
                    fixture: self.name().to_string(),
                    reason: format!("{err:#}"),
                });
            }
        }
        self.released.store(true, Ordering::SeqCst);

        let outcome = match FixtureError::from_failures(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        };

        if let Some(pool) = &pool {
            pool.evict(&self);
            match &outcome {
                Ok(()) => pool.record(LifecycleEvent::TeardownCompleted {
                    fixture: self.name().to_string(),
                    scope: self.scope(),
                }),
                Err(err) => pool.record(LifecycleEvent::TeardownFailed {
                    fixture: self.name().to_string(),
                    scope: self.scope(),
                    code: err.code(),
                    reason: err.message(),
                }),
            }
        }
        outcome
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("name", &self.name())
            .field("scope", &self.scope())
            .field("dependencies", self.dependencies())
            .field("set_up", &self.is_set_up())
            .field("usages", &self.usages())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
