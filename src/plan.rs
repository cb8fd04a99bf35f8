//! Declarative fixture plans.
//!
//! A plan describes a fixture graph (names, scopes, dependencies, JSON values
//! and optional failure injection) plus a list of tests that consume it. Plans
//! are validated on load, installed into a [`FixturePool`] and executed
//! through a [`FixtureHarness`], producing a serialisable [`PlanReport`].

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, FixtureError};
use crate::fixture::{depends_on, FixtureParams, FixturePool, Provision, Scope};
use crate::harness::FixtureHarness;
use crate::telemetry::RecordedEvent;

/// Plan format version understood by this crate.
pub const PLAN_VERSION: u32 = 1;

/// Machine-readable fixture plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixturePlan {
    pub version: u32,
    pub fixtures: Vec<PlannedFixture>,
    #[serde(default)]
    pub tests: Vec<PlannedTest>,
}

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePoint {
    Setup,
    Teardown,
}

/// One fixture declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedFixture {
    pub name: String,
    pub scope: Scope,
    #[serde(default)]
    pub deps: Vec<String>,
    /// Published value; when omitted the fixture publishes an object holding
    /// its dependencies' values (or `null` without dependencies).
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub fail: Option<FailurePoint>,
}

/// One test body: the fixtures it consumes and, optionally, the values it expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedTest {
    pub name: String,
    #[serde(default)]
    pub uses: Vec<String>,
    #[serde(default)]
    pub expect: Option<BTreeMap<String, Value>>,
}

/// Error summary embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportedError {
    pub code: i32,
    pub message: String,
}

impl From<&FixtureError> for ReportedError {
    fn from(err: &FixtureError) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
        }
    }
}

/// Outcome of one planned test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestReport {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
}

/// Result of running a whole plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanReport {
    pub passed: bool,
    pub tests: Vec<TestReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_teardown: Option<ReportedError>,
    pub events: Vec<RecordedEvent>,
}

impl FixturePlan {
    /// Parse plan contents from JSON and validate invariants.
    pub fn from_json(data: &str) -> Result<Self, FixtureError> {
        let plan: FixturePlan = serde_json::from_str(data)
            .map_err(|err| plan_error(format!("failed to parse fixture plan JSON: {err}")))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FixtureError> {
        let contents = std::fs::read_to_string(&path).map_err(|err| {
            plan_error(format!(
                "failed to read fixture plan {}: {err}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&contents)
    }

    pub fn fixture(&self, name: &str) -> Option<&PlannedFixture> {
        self.fixtures.iter().find(|fixture| fixture.name == name)
    }

    fn validate(&self) -> Result<(), FixtureError> {
        if self.version == 0 || self.version > PLAN_VERSION {
            return Err(plan_error(format!(
                "unsupported plan version {} (expected 1..={})",
                self.version, PLAN_VERSION
            )));
        }

        let mut names = HashSet::new();
        for fixture in &self.fixtures {
            if fixture.name.trim().is_empty() {
                return Err(plan_error("fixture name cannot be empty"));
            }
            if !names.insert(fixture.name.as_str()) {
                return Err(plan_error(format!(
                    "duplicate fixture name detected: {}",
                    fixture.name
                )));
            }
        }

        for fixture in &self.fixtures {
            for dep in &fixture.deps {
                if !names.contains(dep.as_str()) {
                    return Err(plan_error(format!(
                        "fixture {} depends on undeclared fixture {}",
                        fixture.name, dep
                    )));
                }
            }
        }

        let mut test_names = HashSet::new();
        for test in &self.tests {
            if !test_names.insert(test.name.as_str()) {
                return Err(plan_error(format!(
                    "duplicate test name detected: {}",
                    test.name
                )));
            }
            for used in &test.uses {
                if !names.contains(used.as_str()) {
                    return Err(plan_error(format!(
                        "test {} uses undeclared fixture {}",
                        test.name, used
                    )));
                }
            }
        }
        Ok(())
    }

    /// Register every planned fixture into `pool`.
    pub fn install(&self, pool: &FixturePool) -> Result<(), FixtureError> {
        for planned in &self.fixtures {
            let name = planned.name.clone();
            let value = planned.value.clone();
            let fail = planned.fail;
            let deps = planned.deps.clone();

            let factory = depends_on(planned.deps.clone(), move |params: FixtureParams| {
                let name = name.clone();
                let value = value.clone();
                let deps = deps.clone();
                async move {
                    if fail == Some(FailurePoint::Setup) {
                        return Err(anyhow!("injected setup failure in {name}"));
                    }
                    let published = match value {
                        Some(value) => value,
                        None if deps.is_empty() => Value::Null,
                        None => Value::Object(collect_values(&params, &deps)?.into_iter().collect()),
                    };
                    let provision = Provision::new(published);
                    Ok(if fail == Some(FailurePoint::Teardown) {
                        provision.with_release(move || async move {
                            Err(anyhow!("injected teardown failure in {name}"))
                        })
                    } else {
                        provision
                    })
                }
            });
            pool.register(planned.name.clone(), planned.scope, factory)?;
        }
        Ok(())
    }

    /// Run every planned test through `harness`, then finish the worker.
    pub async fn run(&self, harness: &FixtureHarness) -> PlanReport {
        let mut tests = Vec::with_capacity(self.tests.len());
        for test in &self.tests {
            let uses = test.uses.clone();
            let outcome = harness
                .run_test(&test.name, test.uses.iter().cloned(), |params| async move {
                    collect_values(&params, &uses)
                })
                .await;

            tests.push(match outcome {
                Ok(Ok(params)) => {
                    let mismatches = test
                        .expect
                        .as_ref()
                        .map(|expected| diff_values(expected, &params))
                        .unwrap_or_default();
                    TestReport {
                        name: test.name.clone(),
                        passed: mismatches.is_empty(),
                        params,
                        mismatches,
                        error: None,
                    }
                }
                Ok(Err(err)) | Err(err) => TestReport {
                    name: test.name.clone(),
                    passed: false,
                    params: BTreeMap::new(),
                    mismatches: Vec::new(),
                    error: Some(ReportedError::from(&err)),
                },
            });
        }

        let worker_teardown = harness.finish().await.err();
        let passed = worker_teardown.is_none() && tests.iter().all(|test| test.passed);

        PlanReport {
            passed,
            tests,
            worker_teardown: worker_teardown.as_ref().map(ReportedError::from),
            events: harness.pool().recorder().snapshot().recent,
        }
    }
}

fn collect_values(
    params: &FixtureParams,
    names: &[String],
) -> Result<BTreeMap<String, Value>, FixtureError> {
    names
        .iter()
        .map(|name| {
            let value = params.get::<Value>(name)?;
            Ok((name.clone(), (*value).clone()))
        })
        .collect()
}

fn diff_values(expected: &BTreeMap<String, Value>, actual: &BTreeMap<String, Value>) -> Vec<String> {
    expected
        .iter()
        .filter_map(|(name, want)| match actual.get(name) {
            Some(got) if got == want => None,
            Some(got) => Some(format!("{name}: expected {want}, got {got}")),
            None => Some(format!("{name}: expected {want}, but it was not resolved")),
        })
        .collect()
}

fn plan_error(reason: impl Into<String>) -> FixtureError {
    FixtureError::InvalidPlan {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests;
