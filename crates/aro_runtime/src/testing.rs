//! Runner for `* Test` feature sets.

use std::fmt;

use aro_engine::Engine;
use tracing::debug;

/// The result of one test feature set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestResult {
    /// Feature set name.
    pub name: String,
    /// The failure message, if the test failed.
    pub failure: Option<String>,
}

impl TestResult {
    /// Returns true if the test passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Results of every test in a program, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestReport {
    /// One entry per test feature set.
    pub results: Vec<TestResult>,
}

impl TestReport {
    /// Number of passing tests.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Number of failing tests.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// Returns true if no test failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            match &result.failure {
                None => writeln!(f, "test {} ... ok", result.name)?,
                Some(reason) => writeln!(f, "test {} ... FAILED\n    {reason}", result.name)?,
            }
        }
        write!(f, "{} passed; {} failed", self.passed(), self.failed())
    }
}

/// Runs every test feature set in a fresh root context.
///
/// Tests run one after another; a failure does not stop the others.
pub async fn run_tests(engine: &Engine) -> TestReport {
    let mut report = TestReport::default();
    for test in engine.feature_sets().iter().filter(|fs| fs.is_test()) {
        let ctx = engine.root_context(test);
        let failure = engine.run(test, ctx).await.err().map(|e| e.to_string());
        debug!(test = %test.name, passed = failure.is_none(), "test finished");
        report.results.push(TestResult {
            name: test.name.clone(),
            failure,
        });
    }
    report
}
