//! Fixture factories and the two-phase acquire/release protocol.
//!
//! A factory's `setup` resolves to a [`Provision`]: the value to publish plus
//! an optional [`ReleaseHandle`]. The pool keeps the handle for the fixture's
//! whole live lifetime and runs it exactly once during teardown.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::fixture::value::{FixtureParams, FixtureValue};

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Deferred cleanup for a published fixture value.
pub struct ReleaseHandle {
    release: ReleaseFn,
}

impl ReleaseHandle {
    pub fn new<F, Fut>(release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            release: Box::new(move || release().boxed()),
        }
    }

    /// Run the cleanup. Consumes the handle so it can only run once.
    pub async fn release(self) -> anyhow::Result<()> {
        (self.release)().await
    }
}

impl fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReleaseHandle")
    }
}

/// What a factory hands back to the pool once setup succeeds.
#[derive(Debug)]
pub struct Provision {
    value: FixtureValue,
    release: Option<ReleaseHandle>,
}

impl Provision {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc(value: FixtureValue) -> Self {
        Self {
            value,
            release: None,
        }
    }

    /// Attach the cleanup that runs when the fixture is torn down.
    pub fn with_release<F, Fut>(mut self, release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.release = Some(ReleaseHandle::new(release));
        self
    }

    pub fn value(&self) -> &FixtureValue {
        &self.value
    }

    pub fn into_parts(self) -> (FixtureValue, Option<ReleaseHandle>) {
        (self.value, self.release)
    }
}

/// Async producer registered for a fixture name.
///
/// Implemented for every `Fn(FixtureParams) -> impl Future<Output =
/// anyhow::Result<Provision>>` closure. Such closures declare no inputs; wrap
/// them with [`depends_on`] to name the fixtures they consume.
pub trait FixtureFactory: Send + Sync + 'static {
    /// Acquire the fixture value from its resolved dependencies.
    fn setup(&self, params: FixtureParams) -> BoxFuture<'static, anyhow::Result<Provision>>;

    /// Fixture names this factory consumes, in declaration order.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }
}

impl<F, Fut> FixtureFactory for F
where
    F: Fn(FixtureParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Provision>> + Send + 'static,
{
    fn setup(&self, params: FixtureParams) -> BoxFuture<'static, anyhow::Result<Provision>> {
        (self)(params).boxed()
    }
}

/// A factory together with the names of the fixtures it consumes.
pub struct Declared<F> {
    dependencies: Vec<String>,
    factory: F,
}

/// Declare the fixtures `factory` consumes.
///
/// ```ignore
/// pool.register_fixture(
///     "session",
///     depends_on(["server"], |params: FixtureParams| async move {
///         let server = params.get::<Server>("server")?;
///         Ok(Provision::new(server.connect().await?))
///     }),
/// )?;
/// ```
pub fn depends_on<I, S, F, Fut>(dependencies: I, factory: F) -> Declared<F>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Fn(FixtureParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Provision>> + Send + 'static,
{
    Declared {
        dependencies: dependencies.into_iter().map(Into::into).collect(),
        factory,
    }
}

impl<F, Fut> FixtureFactory for Declared<F>
where
    F: Fn(FixtureParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Provision>> + Send + 'static,
{
    fn setup(&self, params: FixtureParams) -> BoxFuture<'static, anyhow::Result<Provision>> {
        (self.factory)(params).boxed()
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }
}
