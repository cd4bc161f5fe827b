//! Outcome of one assembly run.
use crate::error::AssemblyError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One recorded failure.
///
/// `target` is the index of the affected target in the assembled slice;
/// `None` marks issues that apply to an operation as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub message: String,
    #[serde(skip)]
    pub error: AssemblyError,
}

/// Counts and issues collected while assembling a batch of targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub target_type: String,
    pub targets: usize,
    /// Container lookup calls made.
    pub lookups: usize,
    /// Field writes performed.
    pub writes: usize,
    pub issues: Vec<Issue>,
}

impl AssemblyReport {
    pub fn new(target_type: impl Into<String>, targets: usize) -> Self {
        Self {
            target_type: target_type.into(),
            targets,
            ..Self::default()
        }
    }

    pub fn record(
        &mut self,
        severity: Severity,
        error: AssemblyError,
        target: Option<usize>,
        operation: Option<&str>,
    ) {
        let code = error.code();
        match severity {
            Severity::Warning => {
                tracing::warn!(code, ?target, operation, %error, "assembly issue")
            }
            Severity::Error => {
                tracing::error!(code, ?target, operation, %error, "assembly issue")
            }
        }
        self.issues.push(Issue {
            severity,
            code,
            target,
            operation: operation.map(str::to_string),
            message: error.to_string(),
            error,
        });
    }

    pub fn warn(&mut self, error: AssemblyError, target: Option<usize>, operation: &str) {
        self.record(Severity::Warning, error, target, Some(operation));
    }

    pub fn error(&mut self, error: AssemblyError, target: Option<usize>, operation: &str) {
        self.record(Severity::Error, error, target, Some(operation));
    }

    /// True when nothing at all went wrong.
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    /// Issues recorded against target `index`, plus operation-wide ones.
    pub fn issues_for(&self, index: usize) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(move |issue| issue.target.is_none() || issue.target == Some(index))
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.issues.iter().map(|issue| issue.code).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_failure(key: Option<&str>) -> AssemblyError {
        AssemblyError::ContainerLookup {
            container: "users".to_string(),
            key: key.map(str::to_string),
            reason: "down".to_string(),
        }
    }

    #[test]
    fn severities_split_partial_success_from_failure() {
        let mut report = AssemblyReport::new("User", 2);
        assert!(report.is_complete());

        report.warn(lookup_failure(Some("1")), Some(0), "id@users");
        assert!(!report.is_complete());
        assert!(!report.has_errors());

        report.error(lookup_failure(None), None, "id@users");
        assert!(report.has_errors());
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.codes(), vec!["CONTAINER_LOOKUP", "CONTAINER_LOOKUP"]);
    }

    #[test]
    fn issues_for_includes_operation_wide_issues() {
        let mut report = AssemblyReport::new("User", 2);
        report.warn(lookup_failure(Some("1")), Some(0), "id@users");
        report.warn(lookup_failure(Some("2")), Some(1), "id@users");
        report.error(lookup_failure(None), None, "id@users");
        assert_eq!(report.issues_for(1).count(), 2);
    }

    #[test]
    fn serializes_without_error_payload() {
        let mut report = AssemblyReport::new("User", 1);
        report.warn(lookup_failure(Some("1")), Some(0), "id@users");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["issues"][0]["code"], "CONTAINER_LOOKUP");
        assert_eq!(value["issues"][0]["severity"], "warning");
        assert!(value["issues"][0].get("error").is_none());
    }
}
