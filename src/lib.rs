// Fixture Pool - dependency injection and lifecycle engine for test fixtures
// Lazily resolves fixture graphs and tears them down dependents-first per scope

// Module declarations
pub mod config;
pub mod error;
pub mod fixture;
pub mod harness;
pub mod plan;
pub mod telemetry;

// Re-exports for convenience
pub use config::{EngineConfig, TeardownPolicy};
pub use error::{ErrorCode, FixtureError};
pub use fixture::{
    depends_on, Dependencies, Fixture, FixtureFactory, FixtureParams, FixturePool, FixtureValue,
    Provision, ReleaseHandle, Scope,
};
pub use harness::FixtureHarness;

use tracing::level_filters::LevelFilter;

/// Install a global `tracing` subscriber writing to stderr.
///
/// `level` is one of trace, debug, info, warn or error; anything else falls
/// back to info. Repeated calls are ignored.
pub fn init_tracing(level: &str) {
    let filter = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_repeatable() {
        init_tracing("debug");
        init_tracing("not-a-level");
    }
}
