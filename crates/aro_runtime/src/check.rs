//! Static checking of a whole compilation unit.
//!
//! Every file is lexed and parsed on its own, then the merged program is
//! analyzed once. Problems from all stages are reported together so a user
//! sees every mistake in one pass.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use aro_language::{
    AnalyzerConfig, ContractLookup, Program, Severity, Span, analyze, parse_program,
};

use crate::source::SourceFile;

/// One problem found while checking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Problem {
    /// The file it was found in, when it can be attributed to one.
    pub path: Option<PathBuf>,
    /// Error or warning.
    pub severity: Severity,
    /// Location within the file.
    pub span: Span,
    /// What went wrong.
    pub message: String,
}

impl Problem {
    /// Returns true for error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}:", path.display())?;
            if self.span != Span::none() {
                write!(f, "{}:", self.span)?;
            }
            f.write_str(" ")?;
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// The merged program and everything wrong with it.
#[derive(Clone, Debug, Default)]
pub struct CheckReport {
    /// Every feature set that parsed, across all files.
    pub program: Program,
    /// Syntax errors and diagnostics, in file order.
    pub problems: Vec<Problem>,
}

impl CheckReport {
    /// Returns true if anything prevents execution.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(Problem::is_error)
    }

    /// Returns the blocking problems.
    pub fn errors(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| p.is_error())
    }

    /// Returns the non-blocking problems.
    pub fn warnings(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| !p.is_error())
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for problem in &self.problems {
            writeln!(f, "{problem}")?;
        }
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors().count(),
            self.warnings().count()
        )
    }
}

/// Parses every file and analyzes the merged program.
///
/// A file with syntax errors contributes nothing to the program; analysis
/// still runs over the rest.
#[must_use]
pub fn check_sources(
    files: &[SourceFile],
    contracts: &dyn ContractLookup,
    config: &AnalyzerConfig,
) -> CheckReport {
    let mut report = CheckReport::default();
    let mut origins: HashMap<String, PathBuf> = HashMap::new();

    for file in files {
        match parse_program(&file.text) {
            Ok(program) => {
                for fs in &program.feature_sets {
                    origins
                        .entry(fs.name.clone())
                        .or_insert_with(|| file.path.clone());
                }
                report.program.extend(program);
            }
            Err(errors) => {
                report
                    .problems
                    .extend(errors.messages().into_iter().map(|(span, message)| Problem {
                        path: Some(file.path.clone()),
                        severity: Severity::Error,
                        span,
                        message,
                    }));
            }
        }
    }

    let analysis = analyze(&report.program, contracts, config);
    report
        .problems
        .extend(analysis.diagnostics.into_iter().map(|d| Problem {
            path: d.feature_set.as_ref().and_then(|fs| origins.get(fs).cloned()),
            severity: d.severity,
            span: d.span,
            message: d.message,
        }));
    report
}
