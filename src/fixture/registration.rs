use std::fmt;
use std::sync::Arc;

use crate::error::FixtureError;
use crate::fixture::factory::FixtureFactory;
use crate::fixture::introspect::{self, Dependencies};
use crate::fixture::scope::Scope;

/// A registered factory: immutable once stored in the pool.
pub struct Registration {
    name: String,
    scope: Scope,
    dependencies: Dependencies,
    factory: Arc<dyn FixtureFactory>,
}

impl Registration {
    /// Introspect `factory` once and freeze its dependency list.
    pub fn new(
        name: impl Into<String>,
        scope: Scope,
        factory: impl FixtureFactory,
    ) -> Result<Self, FixtureError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FixtureError::InvalidDependencies {
                reason: "fixture names cannot be empty".to_string(),
            });
        }
        let dependencies = introspect::names(&factory)?;
        Ok(Self {
            name,
            scope,
            dependencies,
            factory: Arc::new(factory),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub(crate) fn factory(&self) -> &Arc<dyn FixtureFactory> {
        &self.factory
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
