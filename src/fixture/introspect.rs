//! Dependency introspection.
//!
//! Factories and test bodies name the fixtures they consume up front. The
//! introspector turns that declaration into a validated, ordered
//! [`Dependencies`] list once, so resolution never re-reads the factory.

use std::collections::HashSet;
use std::fmt;

use crate::error::FixtureError;
use crate::fixture::factory::FixtureFactory;

/// Ordered, duplicate-free fixture names consumed by a factory or test body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    names: Vec<String>,
}

impl Dependencies {
    pub fn none() -> Self {
        Self::default()
    }

    /// Validate an explicit declaration, preserving declaration order.
    ///
    /// # Errors
    /// `InvalidDependencies` when a name is blank or declared twice.
    pub fn declared<I, S>(names: I) -> Result<Self, FixtureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for name in names {
            let name: String = name.into();
            if name.trim().is_empty() {
                return Err(FixtureError::InvalidDependencies {
                    reason: "dependency names cannot be empty".to_string(),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(FixtureError::InvalidDependencies {
                    reason: format!("dependency \"{}\" declared more than once", name),
                });
            }
            ordered.push(name);
        }
        Ok(Self { names: ordered })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl fmt::Display for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}

/// Fixture names `factory` consumes, in declaration order.
pub fn names(factory: &dyn FixtureFactory) -> Result<Dependencies, FixtureError> {
    Dependencies::declared(factory.dependencies())
}
