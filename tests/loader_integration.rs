//! Integration tests for loading monthly CSV files into a dataset.

mod common;

use solar_report::analysis::analyze;
use solar_report::analysis::types::DataWarning;
use solar_report::config::AnalysisConfig;
use solar_report::io::loader::{discover_files, load_files};

#[test]
fn written_months_load_back_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let june = common::noisy_month(7, 2025, 6, 6.0);
    let july = common::noisy_month(8, 2025, 7, 6.0);
    common::write_month_csv(dir.path(), "solar_hourly", 2025, 7, &july);
    common::write_month_csv(dir.path(), "solar_hourly", 2025, 6, &june);

    let files = discover_files(dir.path(), "solar_hourly").expect("read dir");
    let outcome = load_files(&files);
    assert!(outcome.file_errors.is_empty());
    assert!(outcome.warnings.is_empty());

    let mut expected = june;
    expected.extend(july);
    assert_eq!(outcome.records, expected);
    assert_eq!(
        outcome.files,
        ["solar_hourly_2025-06.csv", "solar_hourly_2025-07.csv"]
    );
}

#[test]
fn loaded_dataset_has_every_day_complete() {
    let dir = tempfile::tempdir().expect("tempdir");
    let june = common::noisy_month(11, 2025, 6, 5.0);
    common::write_month_csv(dir.path(), "solar_hourly", 2025, 6, &june);
    let files = discover_files(dir.path(), "solar_hourly").expect("read dir");
    let ds = load_files(&files).into_dataset();
    assert_eq!(ds.days.len(), 30);
    assert_eq!(ds.complete_days().count(), 30);
    assert_eq!(ds.months.len(), 1);
    assert_eq!(ds.record_count(), 720);
}

#[test]
fn header_mismatch_rejects_one_month_and_keeps_the_rest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let june = common::noisy_month(3, 2025, 6, 6.0);
    let july = common::noisy_month(4, 2025, 7, 6.0);
    let june_path = common::write_month_csv(dir.path(), "solar_hourly", 2025, 6, &june);
    common::write_month_csv(dir.path(), "solar_hourly", 2025, 7, &july);

    let content = std::fs::read_to_string(&june_path).expect("read back");
    let broken = content.replacen("Avg_SOC_Pct", "SOC", 1);
    std::fs::write(&june_path, broken).expect("rewrite");

    let files = discover_files(dir.path(), "solar_hourly").expect("read dir");
    let ds = load_files(&files).into_dataset();
    assert_eq!(ds.files, ["solar_hourly_2025-07.csv"]);
    assert_eq!(ds.rejected_files.len(), 1);
    assert!(ds.rejected_files[0].reason.contains("Avg_SOC_Pct"));
    assert_eq!(ds.months.len(), 1);

    let result = analyze(&ds, &AnalysisConfig::new(6.0));
    assert!(result.monthly_totals.is_computed());
    assert_eq!(result.rejected_files.len(), 1);
}

#[test]
fn unparsable_numeric_rows_are_dropped_with_a_warning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let june = common::noisy_month(5, 2025, 6, 6.0);
    let path = common::write_month_csv(dir.path(), "solar_hourly", 2025, 6, &june);

    // corrupt the Readings field of the 10:00 row on the first day
    let content = std::fs::read_to_string(&path).expect("read back");
    let broken: Vec<String> = content
        .lines()
        .map(|l| {
            if l.starts_with("2025-06-01,10:00,") {
                l.replacen(",12,", ",twelve,", 1)
            } else {
                l.to_string()
            }
        })
        .collect();
    std::fs::write(&path, broken.join("\n")).expect("rewrite");

    let ds = load_files(&[path]).into_dataset();
    assert_eq!(ds.record_count(), 719);
    assert!(ds.warnings.iter().any(|w| matches!(
        w,
        DataWarning::DroppedRow { line: 12, .. }
    )));
    // 23 rows still make the first day complete
    assert_eq!(ds.complete_days().count(), 30);
}
