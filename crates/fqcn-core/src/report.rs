//! Report rendering
//!
//! Every result record renders as JSON or YAML through `serde`, or as a
//! compact human-readable summary through [`TextReport`].

use crate::convert::ConversionResult;
use crate::error::ReportError;
use crate::validate::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

impl ReportFormat {
    /// Render a record in this format
    ///
    /// # Errors
    /// `ReportError` if serialization fails
    pub fn render<T: Serialize + TextReport + ?Sized>(self, record: &T) -> Result<String, ReportError> {
        match self {
            Self::Text => Ok(record.to_text()),
            Self::Json => {
                let mut out = serde_json::to_string_pretty(record)?;
                out.push('\n');
                Ok(out)
            }
            Self::Yaml => Ok(serde_yaml::to_string(record)?),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Human-readable rendering of a record
pub trait TextReport {
    /// Render as text, newline-terminated
    fn to_text(&self) -> String;
}

impl TextReport for ConversionResult {
    fn to_text(&self) -> String {
        let mut out = String::new();
        let path = self.file_path.display();
        if self.success {
            let _ = writeln!(out, "{path}: {} change(s)", self.changes_made);
            for change in &self.changes {
                let _ = writeln!(
                    out,
                    "  {}:{}  {} -> {}",
                    change.line, change.column, change.from, change.to
                );
            }
            if let Some(backup) = &self.backup_path {
                let _ = writeln!(out, "  backup: {}", backup.display());
            }
        } else {
            let _ = writeln!(out, "{path}: FAILED");
        }
        for error in &self.errors {
            let _ = writeln!(out, "  error: {error}");
        }
        for warning in &self.warnings {
            let _ = writeln!(out, "  warning: {warning}");
        }
        out
    }
}

impl TextReport for ValidationResult {
    fn to_text(&self) -> String {
        let mut out = String::new();
        let status = if self.valid { "valid" } else { "INVALID" };
        let _ = writeln!(
            out,
            "{}: {status} (score {:.2}, {}/{} qualified)",
            self.file_path.display(),
            self.score,
            self.already_qualified,
            self.total_modules
        );
        for issue in &self.issues {
            let _ = write!(
                out,
                "  {}:{} {}: {}",
                issue.line, issue.column, issue.severity, issue.message
            );
            if issue.suggestion.is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, " ({})", issue.suggestion);
            }
        }
        out
    }
}

impl<T: TextReport> TextReport for [T] {
    fn to_text(&self) -> String {
        self.iter().map(TextReport::to_text).collect()
    }
}

impl<T: TextReport> TextReport for Vec<T> {
    fn to_text(&self) -> String {
        self.as_slice().to_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::KeyChange;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sample() -> ConversionResult {
        ConversionResult {
            file_path: PathBuf::from("tasks/main.yml"),
            success: true,
            changes_made: 1,
            changes: vec![KeyChange {
                line: 2,
                column: 3,
                from: "copy".to_string(),
                to: "ansible.builtin.copy".to_string(),
            }],
            errors: Vec::new(),
            warnings: Vec::new(),
            before_text: "- copy: {}\n".to_string(),
            after_text: "- ansible.builtin.copy: {}\n".to_string(),
            elapsed: Duration::from_millis(3),
            backup_path: None,
        }
    }

    #[test]
    fn format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("yml".parse::<ReportFormat>().unwrap(), ReportFormat::Yaml);
        assert!("html".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::default().to_string(), "text");
    }

    #[test]
    fn text_rendering() {
        let text = ReportFormat::Text.render(&sample()).unwrap();
        assert_eq!(text, "tasks/main.yml: 1 change(s)\n  2:3  copy -> ansible.builtin.copy\n");
    }

    #[test]
    fn json_rendering_has_fields() {
        let json = ReportFormat::Json.render(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["changes_made"], 1);
        assert_eq!(value["file_path"], "tasks/main.yml");
        assert!(value["backup_path"].is_null());
    }

    #[test]
    fn yaml_rendering_of_list() {
        let yaml = ReportFormat::Yaml.render(&vec![sample(), sample()]).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value.as_sequence().unwrap().len(), 2);
    }
}
