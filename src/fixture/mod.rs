//! Fixture dependency injection and lifecycle engine.
//!
//! Test code registers named factories with a [`FixturePool`]. Each factory
//! names the fixtures it consumes; the pool resolves that graph lazily,
//! instantiates every fixture at most once per live period and tears
//! fixtures down dependents-first when their [`Scope`] ends.

pub mod factory;
mod graph;
pub mod instance;
pub mod introspect;
pub mod pool;
pub mod registration;
pub mod scope;
pub mod value;

pub use factory::{depends_on, Declared, FixtureFactory, Provision, ReleaseHandle};
pub use instance::Fixture;
pub use introspect::Dependencies;
pub use pool::FixturePool;
pub use registration::Registration;
pub use scope::Scope;
pub use value::{FixtureParams, FixtureValue};
