//! Run report
//!
//! Per-case outcome plus run summary, rendered as text for terminals or JSON
//! for tooling.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use crate::probe::Capability;
use crate::Error;

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    /// An expectation, wait or page-contract check did not hold
    Failed,
    /// The harness itself broke: transport, script, panic
    Errored,
    Skipped,
}

impl CaseStatus {
    /// Classify an error raised inside a case
    pub fn for_error(error: &Error) -> Self {
        match error {
            Error::Assertion(_)
            | Error::Timeout { .. }
            | Error::ElementNotFound { .. }
            | Error::ElementNotInteractable { .. }
            | Error::Navigation { .. } => CaseStatus::Failed,
            _ => CaseStatus::Errored,
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "✅",
            CaseStatus::Failed => "❌",
            CaseStatus::Errored => "💥",
            CaseStatus::Skipped => "⏭️",
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn as_millis_opt<S: Serializer>(duration: &Option<Duration>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match duration {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

/// Why a case did not pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Bound of the wait that ran out
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis_opt", skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl Diagnostic {
    pub fn from_message(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
            ..Default::default()
        }
    }
}

impl From<&Error> for Diagnostic {
    fn from(error: &Error) -> Self {
        let mut diagnostic = Diagnostic {
            kind: error.kind().to_string(),
            message: error.to_string(),
            selector: error.selector().filter(|s| !s.is_empty()).map(str::to_string),
            ..Default::default()
        };
        match error {
            Error::Assertion(failure) => {
                diagnostic.expected = Some(failure.expected.clone());
                diagnostic.actual = Some(failure.actual.clone());
            }
            Error::Timeout {
                elapsed, last_observed, ..
            } => {
                diagnostic.elapsed = Some(*elapsed);
                diagnostic.actual = last_observed.clone();
            }
            _ => {}
        }
        diagnostic
    }
}

/// Result of one test case
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub suite: String,
    pub name: String,
    pub status: CaseStatus,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl CaseReport {
    pub fn id(&self) -> String {
        format!("{}::{}", self.suite, self.name)
    }
}

/// Counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn of(cases: &[CaseReport]) -> Self {
        cases.iter().fold(
            Summary {
                total: cases.len(),
                ..Default::default()
            },
            |mut summary, case| {
                match case.status {
                    CaseStatus::Passed => summary.passed += 1,
                    CaseStatus::Failed => summary.failed += 1,
                    CaseStatus::Errored => summary.errored += 1,
                    CaseStatus::Skipped => summary.skipped += 1,
                }
                summary
            },
        )
    }
}

/// Report of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub base_url: String,
    pub capabilities: Vec<Capability>,
    pub summary: Summary,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        base_url: String,
        capabilities: Vec<Capability>,
        mut cases: Vec<CaseReport>,
    ) -> Self {
        // Completion order depends on scheduling; report in suite order
        cases.sort_by(|a, b| a.suite.cmp(&b.suite).then_with(|| a.name.cmp(&b.name)));
        Self {
            started_at,
            finished_at: Utc::now(),
            base_url,
            capabilities,
            summary: Summary::of(&cases),
            cases,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.summary.failed == 0 && self.summary.errored == 0
    }

    /// 0 when nothing failed or errored, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    pub fn case(&self, suite: &str, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.suite == suite && c.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable report: one line per case, failure details, then the summary
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mut suite = "";

        for case in &self.cases {
            if case.suite != suite {
                suite = case.suite.as_str();
                let _ = writeln!(out, "\n{}", suite);
            }
            let _ = writeln!(
                out,
                "  {} {} ({} ms)",
                case.status.icon(),
                case.name,
                case.duration.as_millis()
            );
            if let Some(reason) = &case.skip_reason {
                let _ = writeln!(out, "      skipped: {}", reason);
            }
            if let Some(d) = &case.diagnostic {
                let _ = writeln!(out, "      {}", d.message);
                if let Some(selector) = &d.selector {
                    let _ = writeln!(out, "      selector: {}", selector);
                }
                if let Some(expected) = &d.expected {
                    let _ = writeln!(out, "      expected: {}", expected);
                }
                if let Some(actual) = &d.actual {
                    let _ = writeln!(out, "      actual:   {}", actual);
                }
                if let Some(path) = &d.screenshot {
                    let _ = writeln!(out, "      screenshot: {}", path.display());
                }
            }
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "\n{} passed, {} failed, {} errored, {} skipped ({} total) in {:.1}s",
            s.passed,
            s.failed,
            s.errored,
            s.skipped,
            s.total,
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::AssertionFailure;

    fn case(suite: &str, name: &str, status: CaseStatus) -> CaseReport {
        CaseReport {
            suite: suite.to_string(),
            name: name.to_string(),
            status,
            started_at: Utc::now(),
            duration: Duration::from_millis(120),
            skip_reason: None,
            diagnostic: None,
        }
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            CaseStatus::for_error(&Error::timeout("selector .name-card", Duration::from_secs(5))),
            CaseStatus::Failed
        );
        assert_eq!(
            CaseStatus::for_error(&Error::navigation("http://localhost:8000/x/", "status 404")),
            CaseStatus::Failed
        );
        assert_eq!(CaseStatus::for_error(&Error::element_not_found("#prevBtn")), CaseStatus::Failed);
        assert_eq!(CaseStatus::for_error(&Error::cdp("socket reset")), CaseStatus::Errored);
        assert_eq!(CaseStatus::for_error(&Error::session_closed("stopped")), CaseStatus::Errored);
    }

    #[test]
    fn test_diagnostic_from_assertion() {
        let err = Error::from(AssertionFailure {
            context: "#prevBtn opacity".to_string(),
            expected: "< 1".to_string(),
            actual: "1.0".to_string(),
            message: "not less than bound".to_string(),
        });
        let d = Diagnostic::from(&err);
        assert_eq!(d.kind, "assertion");
        assert_eq!(d.selector.as_deref(), Some("#prevBtn opacity"));
        assert_eq!(d.expected.as_deref(), Some("< 1"));
        assert_eq!(d.actual.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_diagnostic_from_timeout_keeps_bound() {
        let err = Error::timeout_with_last(
            "url matching /naamani/2/",
            Duration::from_millis(5000),
            Some("http://localhost:8000/naamani/1/".to_string()),
        );
        let d = Diagnostic::from(&err);
        assert_eq!(d.elapsed, Some(Duration::from_millis(5000)));
        assert_eq!(d.actual.as_deref(), Some("http://localhost:8000/naamani/1/"));

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["elapsed_ms"], 5000);
        assert!(json.get("expected").is_none());
    }

    #[test]
    fn test_summary_and_exit_code() {
        let report = RunReport::new(
            Utc::now(),
            "http://localhost:8000".to_string(),
            vec![],
            vec![
                case("styling", "mantra_background", CaseStatus::Passed),
                case("editing", "cancel_restores_text", CaseStatus::Skipped),
                case("navigation", "homepage_title", CaseStatus::Passed),
            ],
        );
        assert_eq!(report.summary.passed, 2);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.cases[0].suite, "editing");

        let failing = RunReport::new(
            Utc::now(),
            String::new(),
            vec![],
            vec![case("navigation", "next_button", CaseStatus::Failed)],
        );
        assert_eq!(failing.exit_code(), 1);
    }

    #[test]
    fn test_render_text() {
        let mut failed = case("navigation", "prev_disabled_on_first", CaseStatus::Failed);
        failed.diagnostic = Some(Diagnostic {
            selector: Some("#prevBtn".to_string()),
            expected: Some("true".to_string()),
            actual: Some("false".to_string()),
            ..Diagnostic::from_message("assertion", "#prevBtn: condition is false")
        });
        let report = RunReport::new(Utc::now(), String::new(), vec![], vec![failed]);

        let text = report.render_text();
        assert!(text.contains("navigation\n"));
        assert!(text.contains("❌ prev_disabled_on_first"));
        assert!(text.contains("selector: #prevBtn"));
        assert!(text.contains("0 passed, 1 failed"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["cases"][0]["status"], "failed");
        assert_eq!(json["cases"][0]["duration_ms"], 120);
    }
}
