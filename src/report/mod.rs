//! Per-unit and per-batch outcome reporting.
//!
//! A *unit* is one image (extraction, splitting) or one label file
//! (reconstruction). Recoverable problems inside a unit are collected as
//! [`UnitIssue`]s; a failed unit is recorded and the batch moves on.

use serde::Serialize;
use std::fmt;

/// A batch summary for one pipeline operation.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub operation: String,
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            units: Vec::new(),
        }
    }

    pub fn push(&mut self, unit: UnitReport) {
        self.units.push(unit);
    }

    pub fn count(&self, outcome: UnitOutcome) -> usize {
        self.units.iter().filter(|u| u.outcome == outcome).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count(UnitOutcome::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }

    pub fn issue_count(&self, code: IssueCode) -> usize {
        self.units
            .iter()
            .flat_map(|u| u.issues.iter())
            .filter(|i| i.code == code)
            .count()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} unit(s): {} succeeded, {} degraded, {} skipped, {} failed",
            self.operation,
            self.units.len(),
            self.count(UnitOutcome::Succeeded),
            self.count(UnitOutcome::Degraded),
            self.count(UnitOutcome::Skipped),
            self.count(UnitOutcome::Failed),
        )?;

        for unit in self.units.iter().filter(|u| u.outcome != UnitOutcome::Succeeded) {
            writeln!(f, "  {} [{}]", unit.unit, unit.outcome)?;
            for issue in &unit.issues {
                writeln!(f, "    - {}", issue)?;
            }
        }

        Ok(())
    }
}

/// What happened to one unit.
#[derive(Clone, Debug, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub outcome: UnitOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub issues: Vec<UnitIssue>,
}

impl UnitReport {
    /// A processed unit; the outcome is `Degraded` if any issue is a warning.
    pub fn processed(
        unit: impl Into<String>,
        output: Option<String>,
        issues: Vec<UnitIssue>,
    ) -> Self {
        let outcome = if issues.iter().any(|i| i.severity == IssueSeverity::Warning) {
            UnitOutcome::Degraded
        } else {
            UnitOutcome::Succeeded
        };
        Self {
            unit: unit.into(),
            outcome,
            output,
            issues,
        }
    }

    pub fn skipped(unit: impl Into<String>, issue: UnitIssue) -> Self {
        Self {
            unit: unit.into(),
            outcome: UnitOutcome::Skipped,
            output: None,
            issues: vec![issue],
        }
    }

    pub fn failed(unit: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            outcome: UnitOutcome::Failed,
            output: None,
            issues: vec![UnitIssue {
                severity: IssueSeverity::Error,
                code,
                line: None,
                message: message.into(),
            }],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    Succeeded,
    /// Output was written but some fields or lines were dropped or relabeled.
    Degraded,
    Skipped,
    Failed,
}

impl fmt::Display for UnitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitOutcome::Succeeded => "succeeded",
            UnitOutcome::Degraded => "degraded",
            UnitOutcome::Skipped => "skipped",
            UnitOutcome::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A single recoverable (or unit-fatal) condition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitIssue {
    pub severity: IssueSeverity,
    pub code: IssueCode,
    /// 1-based line number for label-file issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl UnitIssue {
    pub fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            code,
            line: None,
            message: message.into(),
        }
    }

    pub fn info(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Info,
            code,
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for UnitIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{:?} (line {}): {}", self.code, line, self.message),
            None => write!(f, "{:?}: {}", self.code, self.message),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Output lost or changed information.
    Warning,
    /// A note that does not change the output's meaning.
    Info,
    /// The unit produced no output.
    Error,
}

/// Stable issue codes for programmatic consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// A detected field's label is not in the registry; the field was skipped.
    UnknownLabel,
    /// A detected field had no polygon points; the field was skipped.
    EmptyPolygon,
    /// A label line had the wrong token count or unparsable numbers.
    MalformedAnnotationLine,
    /// A class index is outside the registry; the index was used as the label.
    UnknownClassIndex,
    InvalidGeometry,
    MissingLabelFile,
    /// A label file exists but could not be read as text.
    UnreadableLabelFile,
    MissingAnalysis,
    UnreadableImage,
    AnalysisInvalid,
    WriteFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_outcome_tracks_warnings() {
        let clean = UnitReport::processed("a", None, vec![]);
        assert_eq!(clean.outcome, UnitOutcome::Succeeded);

        let noted = UnitReport::processed(
            "b",
            None,
            vec![UnitIssue::info(IssueCode::EmptyPolygon, "no points")],
        );
        assert_eq!(noted.outcome, UnitOutcome::Succeeded);

        let degraded = UnitReport::processed(
            "c",
            None,
            vec![UnitIssue::warning(IssueCode::UnknownLabel, "Tip")],
        );
        assert_eq!(degraded.outcome, UnitOutcome::Degraded);
    }

    #[test]
    fn batch_counts_and_display() {
        let mut report = BatchReport::new("to-labelme");
        report.push(UnitReport::processed("0.jpg", None, vec![]));
        report.push(UnitReport::skipped(
            "1.jpg",
            UnitIssue::info(IssueCode::MissingLabelFile, "no labels"),
        ));
        report.push(UnitReport::failed("2.jpg", IssueCode::InvalidGeometry, "negative width"));

        assert_eq!(report.count(UnitOutcome::Succeeded), 1);
        assert_eq!(report.count(UnitOutcome::Skipped), 1);
        assert!(report.has_failures());
        assert_eq!(report.issue_count(IssueCode::InvalidGeometry), 1);

        let text = report.to_string();
        assert!(text.starts_with(
            "to-labelme: 3 unit(s): 1 succeeded, 0 degraded, 1 skipped, 1 failed"
        ));
        assert!(text.contains("2.jpg [failed]"));
        assert!(!text.contains("0.jpg"));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = BatchReport::new("extract");
        report.push(UnitReport::processed(
            "0.jpg",
            Some("0.txt".to_string()),
            vec![UnitIssue::warning(IssueCode::MalformedAnnotationLine, "bad").at_line(3)],
        ));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"operation\":\"extract\""));
        assert!(json.contains("\"outcome\":\"degraded\""));
        assert!(json.contains("\"code\":\"malformed_annotation_line\""));
        assert!(json.contains("\"line\":3"));
    }
}
