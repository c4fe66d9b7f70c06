//! Numeric observability for estimator evaluation.
//!
//! Evaluation is infallible: kernel sums can still overflow, underflow to
//! zero or produce NaN for extreme inputs, and the adaptive estimator floors
//! tiny pilot densities. These events are handed to a [`NumericObserver`]
//! that the caller passes in explicitly. There is no process-wide setting.

use std::fmt;
use std::sync::Mutex;

/// What went wrong numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericIssueKind {
    /// An evaluated density was NaN or infinite.
    NonFinite,
    /// A pilot density fell below the floor and was raised to it.
    PilotFloored,
}

/// A single numeric event, located by estimator and position.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericIssue {
    pub estimator: &'static str,
    pub kind: NumericIssueKind,
    /// Index of the query (or sample point, for pilot flooring).
    pub index: usize,
    /// The query point (or sample point) involved.
    pub location: f64,
    /// The offending value before any correction.
    pub value: f64,
}

impl fmt::Display for NumericIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NumericIssueKind::NonFinite => write!(
                f,
                "{}: non-finite density {} at query #{} (y = {})",
                self.estimator, self.value, self.index, self.location
            ),
            NumericIssueKind::PilotFloored => write!(
                f,
                "{}: pilot density {:e} at sample #{} (x = {}) raised to the floor",
                self.estimator, self.value, self.index, self.location
            ),
        }
    }
}

/// Receives numeric issues raised while building or evaluating an estimator.
pub trait NumericObserver: Sync {
    fn observe(&self, issue: &NumericIssue);
}

/// Discards every issue.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreNumericIssues;

impl NumericObserver for IgnoreNumericIssues {
    fn observe(&self, _: &NumericIssue) {}
}

/// Routes every issue to `log::warn!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNumericIssues;

impl NumericObserver for LogNumericIssues {
    fn observe(&self, issue: &NumericIssue) {
        log::warn!("{issue}");
    }
}

/// Keeps every issue in memory. Safe to share across threads.
#[derive(Debug, Default)]
pub struct CollectNumericIssues {
    issues: Mutex<Vec<NumericIssue>>,
}

impl CollectNumericIssues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything observed so far.
    pub fn issues(&self) -> Vec<NumericIssue> {
        match self.issues.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.issues.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NumericObserver for CollectNumericIssues {
    fn observe(&self, issue: &NumericIssue) {
        match self.issues.lock() {
            Ok(mut guard) => guard.push(issue.clone()),
            Err(poisoned) => poisoned.into_inner().push(issue.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(kind: NumericIssueKind) -> NumericIssue {
        NumericIssue {
            estimator: "kde",
            kind,
            index: 3,
            location: 1.5,
            value: f64::NAN,
        }
    }

    #[test]
    fn collector_accumulates_issues_in_order() {
        let collector = CollectNumericIssues::new();
        assert!(collector.is_empty());
        collector.observe(&issue(NumericIssueKind::NonFinite));
        collector.observe(&issue(NumericIssueKind::PilotFloored));
        let seen = collector.issues();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, NumericIssueKind::NonFinite);
        assert_eq!(seen[1].kind, NumericIssueKind::PilotFloored);
    }

    #[test]
    fn display_names_estimator_and_position() {
        let text = issue(NumericIssueKind::NonFinite).to_string();
        assert!(text.contains("kde"));
        assert!(text.contains("#3"));
    }

    #[test]
    fn ignoring_and_logging_observers_accept_issues() {
        IgnoreNumericIssues.observe(&issue(NumericIssueKind::NonFinite));
        LogNumericIssues.observe(&issue(NumericIssueKind::PilotFloored));
    }
}
