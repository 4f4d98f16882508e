//! Batch report rendering

use crate::aggregate::{BatchKind, BatchResult, FileReport};
use fqcn_core::TextReport;
use std::fmt::Write as _;

impl TextReport for FileReport {
    fn to_text(&self) -> String {
        match self {
            Self::Conversion(r) => r.to_text(),
            Self::Validation(r) => r.to_text(),
        }
    }
}

impl TextReport for BatchResult {
    fn to_text(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            let show = match file {
                FileReport::Conversion(r) => !r.success || r.has_changes() || !r.warnings.is_empty(),
                FileReport::Validation(r) => !r.issues.is_empty(),
            };
            if show {
                out.push_str(&file.to_text());
            }
        }
        if !self.files.is_empty() {
            out.push('\n');
        }

        for project in &self.projects {
            let status = if project.success { "ok" } else { "FAILED" };
            let _ = writeln!(
                out,
                "{status:>6}  {} ({} file(s), {} failed, compliance {:.2})",
                project.path.display(),
                project.totals.files_processed,
                project.totals.failed,
                project.compliance_score
            );
        }

        let t = &self.totals;
        let verb = match (self.kind, self.dry_run) {
            (BatchKind::Convert, true) => "would convert",
            (BatchKind::Convert, false) => "converted",
            (BatchKind::Validate, _) => "validated",
        };
        let _ = writeln!(out, "\nSummary ({})", self.run_id);
        let _ = writeln!(out, "  projects:      {}", self.projects.len());
        let _ = writeln!(out, "  files {verb}: {}", t.files_processed);
        let _ = writeln!(out, "  failed:        {}", t.failed);
        if t.skipped > 0 {
            let _ = writeln!(out, "  skipped:       {}", t.skipped);
        }
        match self.kind {
            BatchKind::Convert => {
                let _ = writeln!(out, "  changes:       {}", t.changes_made);
            }
            BatchKind::Validate => {
                let _ = writeln!(out, "  invalid:       {}", t.invalid);
                let _ = writeln!(
                    out,
                    "  modules:       {} qualified / {} total",
                    t.already_qualified, t.total_modules
                );
                let _ = writeln!(out, "  compliance:    {:.2}", self.compliance_score);
            }
        }
        let _ = writeln!(out, "  success rate:  {:.1}%", self.success_rate * 100.0);
        if self.aborted {
            out.push_str("  run aborted after first failure\n");
        }
        out
    }
}
