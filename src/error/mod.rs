// Error types for the fixture engine
//
// This module defines the error type raised by fixture resolution, setup and
// teardown, with numeric codes so host runners can report failures uniformly.

mod fixture;

pub use fixture::{log_fixture_error, FixtureError, FixtureErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting by the host
/// test runner.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
