//! FixturePool: registry of fixture factories plus the live-instance map.
//!
//! The pool resolves requested names into set-up [`Fixture`]s, runs test
//! bodies with their resolved parameters and drives scope-wide teardown.
//!
//! # Concurrency
//! `instances` is the only mutable shared state. Its lock is never held
//! across an `.await`: lookup, cycle check and insertion of a new in-flight
//! instance happen in one critical section, so concurrent requesters for the
//! same name always converge on a single instantiation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures::future::{self, BoxFuture};
use futures::FutureExt;

use crate::config::{EngineConfig, TeardownPolicy};
use crate::error::{log_fixture_error, FixtureError};
use crate::fixture::factory::FixtureFactory;
use crate::fixture::graph;
use crate::fixture::instance::Fixture;
use crate::fixture::introspect::Dependencies;
use crate::fixture::registration::Registration;
use crate::fixture::scope::Scope;
use crate::fixture::value::FixtureParams;
use crate::telemetry::{LifecycleEvent, LifecycleRecorder};

/// State shared between the pool handle and the fixtures it created.
pub(crate) struct PoolShared {
    config: EngineConfig,
    registrations: RwLock<HashMap<String, Arc<Registration>>>,
    instances: Mutex<HashMap<String, Arc<Fixture>>>,
    recorder: LifecycleRecorder,
}

impl PoolShared {
    /// Live fixture for `name`, creating and setting one up when needed.
    pub(crate) fn acquire(
        self: &Arc<Self>,
        name: &str,
    ) -> BoxFuture<'static, Result<Arc<Fixture>, FixtureError>> {
        let fixture = match self.live_or_create(name) {
            Ok(fixture) => fixture,
            Err(err) => {
                log_fixture_error(&err, "setup_fixture");
                return future::ready(Err(err)).boxed();
            }
        };

        async move {
            fixture.setup().await?;
            Ok(fixture)
        }
        .boxed()
    }

    fn live_or_create(self: &Arc<Self>, name: &str) -> Result<Arc<Fixture>, FixtureError> {
        let mut instances = self.lock_instances();
        if let Some(fixture) = instances.get(name) {
            return Ok(Arc::clone(fixture));
        }

        let registration = {
            let registrations = self.read_registrations();
            let registration =
                registrations
                    .get(name)
                    .cloned()
                    .ok_or_else(|| FixtureError::UnknownFixture {
                        name: name.to_string(),
                    })?;
            if let Some(cycle) = graph::find_cycle(&registrations, name) {
                return Err(FixtureError::CyclicDependency { cycle });
            }
            registration
        };

        let fixture = Arc::new(Fixture::new(registration, Arc::downgrade(self)));
        instances.insert(name.to_string(), Arc::clone(&fixture));
        Ok(fixture)
    }

    pub(crate) fn live(&self, name: &str) -> Option<Arc<Fixture>> {
        self.lock_instances().get(name).cloned()
    }

    /// Remove `fixture` from the live map unless a newer instance replaced it.
    pub(crate) fn evict(&self, fixture: &Arc<Fixture>) {
        let mut instances = self.lock_instances();
        if instances
            .get(fixture.name())
            .is_some_and(|current| Arc::ptr_eq(current, fixture))
        {
            instances.remove(fixture.name());
        }
    }

    fn is_current(&self, fixture: &Arc<Fixture>) -> bool {
        self.lock_instances()
            .get(fixture.name())
            .is_some_and(|current| Arc::ptr_eq(current, fixture))
    }

    pub(crate) fn record(&self, event: LifecycleEvent) {
        self.recorder.record(event);
    }

    fn lock_instances(&self) -> MutexGuard<'_, HashMap<String, Arc<Fixture>>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_registrations(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Registration>>> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registrations(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Registration>>> {
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry and lifecycle driver for fixtures.
///
/// Cloning is cheap and every clone refers to the same registry and live
/// instances. A pool is constructed explicitly and handed to the code that
/// runs tests; there is no process-wide default pool.
///
/// # Example
/// ```ignore
/// let pool = FixturePool::new();
/// pool.register_worker_fixture("a", |_: FixtureParams| async { Ok(Provision::new(1_i32)) })?;
/// pool.register_fixture(
///     "b",
///     depends_on(["a"], |params| async move {
///         Ok(Provision::new(*params.get::<i32>("a")? + 1))
///     }),
/// )?;
/// let sum = pool
///     .resolve_parameters_and_run(["a", "b"], |params| async move {
///         *params.get::<i32>("a").unwrap() + *params.get::<i32>("b").unwrap()
///     })
///     .await?;
/// pool.teardown_scope(Scope::Test).await?;
/// ```
#[derive(Clone)]
pub struct FixturePool {
    shared: Arc<PoolShared>,
}

impl FixturePool {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let recorder = LifecycleRecorder::from_config(&config.telemetry);
        Self {
            shared: Arc::new(PoolShared {
                config,
                registrations: RwLock::new(HashMap::new()),
                instances: Mutex::new(HashMap::new()),
                recorder,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn recorder(&self) -> &LifecycleRecorder {
        &self.shared.recorder
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Register (or silently replace) the factory for `name`.
    ///
    /// Live instances keep the registration they were created from; the new
    /// factory is used the next time `name` is instantiated.
    ///
    /// # Errors
    /// `InvalidDependencies` when the name is blank or the factory declares a
    /// blank or repeated dependency.
    pub fn register(
        &self,
        name: impl Into<String>,
        scope: Scope,
        factory: impl FixtureFactory,
    ) -> Result<(), FixtureError> {
        let registration = Registration::new(name, scope, factory)?;
        tracing::debug!(
            "[FixturePool] Registered {} ({}) depending on {}",
            registration.name(),
            registration.scope(),
            registration.dependencies()
        );
        self.shared
            .write_registrations()
            .insert(registration.name().to_string(), Arc::new(registration));
        Ok(())
    }

    /// Register a fixture that lives for a single test.
    pub fn register_fixture(
        &self,
        name: impl Into<String>,
        factory: impl FixtureFactory,
    ) -> Result<(), FixtureError> {
        self.register(name, Scope::Test, factory)
    }

    /// Register a fixture shared by every test run by this worker.
    pub fn register_worker_fixture(
        &self,
        name: impl Into<String>,
        factory: impl FixtureFactory,
    ) -> Result<(), FixtureError> {
        self.register(name, Scope::Worker, factory)
    }

    pub fn registration(&self, name: &str) -> Option<Arc<Registration>> {
        self.shared.read_registrations().get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.shared.read_registrations().contains_key(name)
    }

    /// Registered fixture names, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.read_registrations().keys().cloned().collect();
        names.sort();
        names
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Return the live fixture for `name`, instantiating it (and, transitively,
    /// its dependencies) when it is not live yet.
    ///
    /// # Errors
    /// - `UnknownFixture` when `name` (or a dependency) is not registered
    /// - `CyclicDependency` when the registration graph loops back on itself
    /// - `SetupFailed` when a factory along the way fails
    pub async fn setup_fixture(&self, name: &str) -> Result<Arc<Fixture>, FixtureError> {
        self.shared.acquire(name).await
    }

    /// Set up every fixture in `dependencies`, in order, and collect their values.
    ///
    /// A fixture whose teardown has already started is refused with
    /// `SetupFailed` rather than handed out mid-release.
    pub async fn resolve(&self, dependencies: &Dependencies) -> Result<FixtureParams, FixtureError> {
        let mut params = FixtureParams::new();
        for name in dependencies.iter() {
            let fixture = self.setup_fixture(name).await?;
            if fixture.is_tearing_down() {
                return Err(FixtureError::SetupFailed {
                    fixture: name.to_string(),
                    reason: "fixture is being torn down".to_string(),
                });
            }
            params.insert(name, fixture.published_value()?);
        }
        Ok(params)
    }

    /// Resolve `dependencies` and run `body` with the resulting parameters.
    ///
    /// The body's own output is returned untouched; only resolution failures
    /// are reported through the `Err` branch.
    pub async fn resolve_parameters_and_run<I, S, F, Fut, R>(
        &self,
        dependencies: I,
        body: F,
    ) -> Result<R, FixtureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(FixtureParams) -> Fut,
        Fut: Future<Output = R>,
    {
        let dependencies = Dependencies::declared(dependencies)?;
        let params = self.resolve(&dependencies).await?;
        Ok(body(params).await)
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    /// Tear down every live fixture declared with `scope`.
    ///
    /// Dependents are torn down before their dependencies by each fixture's
    /// own teardown, so the sweep order does not matter. Fixtures removed as
    /// a side effect of an earlier teardown in the same sweep are skipped.
    ///
    /// # Errors
    /// The collected teardown failures, as a single error or `Multiple`.
    pub async fn teardown_scope(&self, scope: Scope) -> Result<(), FixtureError> {
        let mut targets: Vec<Arc<Fixture>> = self
            .shared
            .lock_instances()
            .values()
            .filter(|fixture| fixture.scope() == scope)
            .cloned()
            .collect();
        targets.sort_by(|a, b| a.name().cmp(b.name()));

        self.shared.record(LifecycleEvent::ScopeTeardownStarted {
            scope,
            live: targets.len(),
        });
        tracing::debug!(
            "[FixturePool] Tearing down {} {} fixture(s)",
            targets.len(),
            scope
        );

        let policy = self.shared.config.teardown.policy;
        let mut failures = Vec::new();
        for fixture in targets {
            if !self.shared.is_current(&fixture) {
                continue;
            }
            if let Err(err) = fixture.teardown().await {
                log_fixture_error(&err, "teardown_scope");
                failures.extend(err.failures().into_iter().cloned());
                if policy == TeardownPolicy::StopOnFirstFailure {
                    tracing::warn!(
                        "[FixturePool] Stopping {} teardown after first failure",
                        scope
                    );
                    break;
                }
            }
        }

        self.shared.record(LifecycleEvent::ScopeTeardownCompleted {
            scope,
            failures: failures.len(),
        });

        match FixtureError::from_failures(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// Names of live (set up or in-flight) fixtures, sorted.
    pub fn live_fixtures(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.lock_instances().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.shared.lock_instances().contains_key(name)
    }

    /// The live instance for `name`, without instantiating it.
    pub fn live_fixture(&self, name: &str) -> Option<Arc<Fixture>> {
        self.shared.live(name)
    }
}

impl Default for FixturePool {
    fn default() -> Self {
        Self::new()
    }
}
