// Fixture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Fixture error code constants
///
/// Single source of truth for the numeric codes surfaced to host runners.
///
/// Error code range: 3001-3010
pub struct FixtureErrorCodes {}

impl FixtureErrorCodes {
    /// Requested fixture name was never registered
    pub const UNKNOWN_FIXTURE: i32 = 3001;

    /// Factory failed before providing a value
    pub const SETUP_FAILED: i32 = 3002;

    /// Release action failed during teardown
    pub const TEARDOWN_FAILED: i32 = 3003;

    /// Registration graph contains a dependency cycle
    pub const CYCLIC_DEPENDENCY: i32 = 3004;

    /// Declared dependency list is malformed
    pub const INVALID_DEPENDENCIES: i32 = 3005;

    /// Parameter lookup for a name that was not resolved
    pub const MISSING_PARAMETER: i32 = 3006;

    /// Parameter value has a different concrete type
    pub const TYPE_MISMATCH: i32 = 3007;

    /// Several independent failures collected during one operation
    pub const MULTIPLE: i32 = 3008;

    /// Fixture plan failed validation
    pub const INVALID_PLAN: i32 = 3009;

    /// Engine configuration failed validation
    pub const INVALID_CONFIG: i32 = 3010;
}

/// Log a fixture error with structured context
///
/// Emits the numeric code, the component and the message together so that
/// failures reported by the host runner can be correlated with engine logs.
pub fn log_fixture_error(err: &FixtureError, context: &str) {
    error!(
        "Fixture error in {}: code={}, component=FixturePool, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Fixture engine errors
///
/// Covers name resolution, factory setup, release during teardown and the
/// validation performed on declared dependencies and fixture plans.
///
/// Error code range: 3001-3010
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureError {
    /// Requested name has no registration
    UnknownFixture { name: String },

    /// Factory failed before providing a value
    SetupFailed { fixture: String, reason: String },

    /// Release action failed after teardown was requested
    TeardownFailed { fixture: String, reason: String },

    /// Dependency cycle, listed from the first repeated fixture back to itself
    CyclicDependency { cycle: Vec<String> },

    /// Declared dependency names are empty or repeated
    InvalidDependencies { reason: String },

    /// Parameter requested that was not among the resolved names
    MissingParameter { name: String },

    /// Parameter exists but holds a different type
    TypeMismatch {
        fixture: String,
        expected: &'static str,
    },

    /// Several failures collected while continuing past the first one
    Multiple { failures: Vec<FixtureError> },

    /// Fixture plan rejected during validation
    InvalidPlan { reason: String },

    /// Engine configuration rejected during validation
    InvalidConfig { reason: String },
}

impl FixtureError {
    /// Collapse collected failures: none, one as-is, or several as `Multiple`.
    ///
    /// Nested `Multiple` values are flattened so callers always see a flat list.
    pub fn from_failures(failures: Vec<FixtureError>) -> Option<FixtureError> {
        let mut flat = Vec::with_capacity(failures.len());
        for failure in failures {
            match failure {
                FixtureError::Multiple { failures } => flat.extend(failures),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(FixtureError::Multiple { failures: flat }),
        }
    }

    /// Individual failures carried by this error.
    pub fn failures(&self) -> Vec<&FixtureError> {
        match self {
            FixtureError::Multiple { failures } => failures.iter().collect(),
            other => vec![other],
        }
    }
}

impl ErrorCode for FixtureError {
    fn code(&self) -> i32 {
        match self {
            FixtureError::UnknownFixture { .. } => FixtureErrorCodes::UNKNOWN_FIXTURE,
            FixtureError::SetupFailed { .. } => FixtureErrorCodes::SETUP_FAILED,
            FixtureError::TeardownFailed { .. } => FixtureErrorCodes::TEARDOWN_FAILED,
            FixtureError::CyclicDependency { .. } => FixtureErrorCodes::CYCLIC_DEPENDENCY,
            FixtureError::InvalidDependencies { .. } => FixtureErrorCodes::INVALID_DEPENDENCIES,
            FixtureError::MissingParameter { .. } => FixtureErrorCodes::MISSING_PARAMETER,
            FixtureError::TypeMismatch { .. } => FixtureErrorCodes::TYPE_MISMATCH,
            FixtureError::Multiple { .. } => FixtureErrorCodes::MULTIPLE,
            FixtureError::InvalidPlan { .. } => FixtureErrorCodes::INVALID_PLAN,
            FixtureError::InvalidConfig { .. } => FixtureErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            FixtureError::UnknownFixture { name } => {
                format!("Fixture \"{}\" is not registered", name)
            }
            FixtureError::SetupFailed { fixture, reason } => {
                format!("Setup of fixture \"{}\" failed: {}", fixture, reason)
            }
            FixtureError::TeardownFailed { fixture, reason } => {
                format!("Teardown of fixture \"{}\" failed: {}", fixture, reason)
            }
            FixtureError::CyclicDependency { cycle } => {
                format!("Dependency cycle detected: {}", cycle.join(" -> "))
            }
            FixtureError::InvalidDependencies { reason } => {
                format!("Invalid dependency declaration: {}", reason)
            }
            FixtureError::MissingParameter { name } => {
                format!("Parameter \"{}\" was not resolved for this call", name)
            }
            FixtureError::TypeMismatch { fixture, expected } => {
                format!("Fixture \"{}\" does not hold a value of type {}", fixture, expected)
            }
            FixtureError::Multiple { failures } => {
                let messages: Vec<String> = failures.iter().map(|f| f.message()).collect();
                format!("{} failures: {}", failures.len(), messages.join("; "))
            }
            FixtureError::InvalidPlan { reason } => {
                format!("Invalid fixture plan: {}", reason)
            }
            FixtureError::InvalidConfig { reason } => {
                format!("Invalid engine configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixtureError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for FixtureError {}
