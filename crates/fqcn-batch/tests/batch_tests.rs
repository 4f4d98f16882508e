//! Batch driver integration tests

use fqcn_batch::{BatchConfig, BatchDriver, BatchMode, BatchResult, FileReport};
use fqcn_core::{ConversionOptions, ReportFormat, TaskAnalyzer, ValidationOptions};
use fqcn_test_utils::{count_files_with_suffix, sample_table, three_projects, write_project, PLAYBOOK, USER_TASK};
use proptest::prelude::*;
use tempfile::TempDir;

fn run(root: &std::path::Path, workers: usize, mode: &BatchMode) -> BatchResult {
    let table = sample_table();
    let config = BatchConfig::default().with_workers(workers);
    BatchDriver::new(&table, TaskAnalyzer::new(), config)
        .run_dir(root, mode)
        .unwrap()
}

#[test]
fn failure_in_one_project_does_not_stop_siblings() {
    let dir = three_projects();
    let result = run(dir.path(), 4, &BatchMode::Convert(ConversionOptions::default()));

    assert_eq!(result.projects.len(), 3);
    assert_eq!(result.failed_conversions(), 1);
    assert!(!result.aborted);
    assert!(result.projects[0].success);
    assert!(!result.projects[1].success);
    assert!(result.projects[2].success);

    // user task (1) + playbook group and user (2)
    assert_eq!(result.totals.changes_made, 3);
    assert_eq!(count_files_with_suffix(dir.path(), ".fqcn.bak"), 2);

    let failed: Vec<_> = result.failures().map(FileReport::file_path).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].ends_with("project2/roles/app/tasks/broken.yml"));
}

#[test]
fn totals_match_across_worker_counts() {
    let dir = three_projects();
    let mode = BatchMode::Convert(ConversionOptions::dry_run());
    let baseline = run(dir.path(), 1, &mode);
    for workers in [2, 8] {
        let result = run(dir.path(), workers, &mode);
        assert_eq!(result.totals, baseline.totals);
        let a: Vec<_> = result.projects.iter().map(|p| p.totals).collect();
        let b: Vec<_> = baseline.projects.iter().map(|p| p.totals).collect();
        assert_eq!(a, b);
        let paths: Vec<_> = result.files.iter().map(FileReport::file_path).collect();
        let expected: Vec<_> = baseline.files.iter().map(FileReport::file_path).collect();
        assert_eq!(paths, expected);
    }
    assert_eq!(count_files_with_suffix(dir.path(), ".fqcn.bak"), 0);
}

#[test]
fn validation_batch_reports_compliance() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), "one", USER_TASK);
    write_project(dir.path(), "two", PLAYBOOK);
    let result = run(dir.path(), 2, &BatchMode::Validate(ValidationOptions::default()));

    assert_eq!(result.totals.still_short, 3);
    assert_eq!(result.totals.already_qualified, 0);
    assert_eq!(result.totals.invalid, 2);
    assert!(result.is_success());
    assert!(!result.is_compliant());

    let json = ReportFormat::Json.render(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["kind"], "validate");
    assert_eq!(value["files"][0]["kind"], "validation");
    assert_eq!(value["totals"]["still_short"], 3);
}

#[test]
fn text_report_summarizes() {
    let dir = three_projects();
    let result = run(dir.path(), 2, &BatchMode::Convert(ConversionOptions::dry_run()));
    let text = ReportFormat::Text.render(&result).unwrap();
    assert!(text.contains("would convert"));
    assert!(text.contains("FAILED"));
    assert!(text.contains("failed:        1"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_worker_count_does_not_change_totals(
        shapes in proptest::collection::vec(0usize..3, 1..6),
        workers in 1usize..9,
    ) {
        let dir = TempDir::new().unwrap();
        for (i, shape) in shapes.iter().enumerate() {
            let tasks = match shape {
                0 => USER_TASK,
                1 => PLAYBOOK,
                _ => fqcn_test_utils::BROKEN,
            };
            write_project(dir.path(), &format!("p{i}"), tasks);
        }
        let mode = BatchMode::Validate(ValidationOptions::default());
        let sequential = run(dir.path(), 1, &mode);
        let parallel = run(dir.path(), workers, &mode);
        prop_assert_eq!(sequential.totals, parallel.totals);
    }
}
