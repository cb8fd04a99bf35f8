//! Type-erased fixture values and the parameter mapping handed to factories
//! and test bodies.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::FixtureError;

/// A published fixture value, shared by every consumer of the fixture.
pub type FixtureValue = Arc<dyn Any + Send + Sync>;

/// Mapping from each resolved fixture name to its published value.
#[derive(Clone, Default)]
pub struct FixtureParams {
    values: BTreeMap<String, FixtureValue>,
}

impl FixtureParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: FixtureValue) {
        self.values.insert(name.into(), value);
    }

    /// Typed access to a resolved fixture.
    ///
    /// # Errors
    /// - `MissingParameter` when `name` was not among the declared dependencies
    /// - `TypeMismatch` when the published value is not a `T`
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, FixtureError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| FixtureError::MissingParameter {
                name: name.to_string(),
            })?;

        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| FixtureError::TypeMismatch {
                fixture: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Untyped access to a resolved fixture.
    pub fn raw(&self, name: &str) -> Option<&FixtureValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Resolved names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for FixtureParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}
