use std::path::Path;

use followup_tools::config::PipelineConfig;
use followup_tools::io::{excel_read, survival};
use followup_tools::model::Endpoint;
use followup_tools::pipeline::{self, RunOptions};
use followup_tools::tabulate::{FOLLOWUP_SHEET, TIME_POINT_SHEET, WIDE_COLUMNS};
use rust_xlsxwriter::{Workbook, Worksheet};
use tempfile::tempdir;

fn write_rows(worksheet: &mut Worksheet, rows: &[&[&str]]) {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            worksheet
                .write_string(row_idx as u32, col_idx as u16, *cell)
                .expect("cell written");
        }
    }
}

/// Three-sheet cohort workbook: a baseline roster plus two follow-up visits.
/// P003 carries no enrollment date anywhere and must be skipped.
fn write_cohort_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    let baseline = workbook.add_worksheet();
    baseline.set_name("basic_info").expect("sheet name");
    write_rows(
        baseline,
        &[
            &[
                "patient_id",
                "patient_name",
                "birthday",
                "enrollment_date",
                "age",
                "gender",
                "group_name",
            ],
            &["P001", "Alice", "1956-03-15", "2020-01-01", "64", "1", "PCI"],
            &["P002", "Bob", "", "2020-02-01", "58", "2", "PCI"],
            &["P003", "Carol", "", "", "70", "2", "PCI"],
        ],
    );

    let six_months = workbook.add_worksheet();
    six_months.set_name("6M Followup").expect("sheet name");
    write_rows(
        six_months,
        &[
            &["patient_id", "visit_date", "event_type", "cardiovascular_event"],
            &["P001", "2020-07-01", "", ""],
            &["P002", "2020-08-01", "5,6", "1"],
            &["P003", "2020-08-15", "", ""],
        ],
    );

    let twelve_months = workbook.add_worksheet();
    twelve_months.set_name("12个月随访").expect("sheet name");
    write_rows(
        twelve_months,
        &[
            &["patient_id", "visit_date", "death_date"],
            &["P001", "2021-01-05", "2021-01-02"],
            &["P002", "2021-02-01", ""],
        ],
    );

    workbook.save(path).expect("input workbook saved");
}

#[test]
fn pipeline_exports_wide_long_and_survival_tables() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("PCI_followup.xlsx");
    write_cohort_workbook(&input);

    let mut config = PipelineConfig::default();
    config.output.output_dir = temp_dir.path().join("out");

    let summary = pipeline::run(&RunOptions {
        input,
        endpoint: Endpoint::Death,
        config,
        group_label: None,
        wide_only: false,
    })
    .expect("pipeline run");

    assert_eq!(summary.total_patients, 2);
    assert_eq!(summary.patients_with_events, 2);
    assert_eq!(summary.skipped_patients, 1);
    assert_eq!(summary.event_distribution.get("death"), Some(&1));
    assert_eq!(summary.event_distribution.get("angina"), Some(&1));
    assert!(
        summary
            .workbook_path
            .file_name()
            .map(|name| name.to_string_lossy().contains("pci"))
            .unwrap_or(false)
    );
    assert!(summary.summary_path.exists());

    let rows = survival::read_survival_csv(&summary.survival_path).expect("survival read");
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].patient_id, "P001");
    assert_eq!(rows[0].event_occurred, 1);
    assert_eq!(rows[0].survival_time_days, 367);
    assert_eq!(rows[0].endpoint_event, "death");
    assert_eq!(rows[0].gender.as_deref(), Some("男"));
    assert_eq!(rows[0].age, Some(64));

    assert_eq!(rows[1].patient_id, "P002");
    assert_eq!(rows[1].event_occurred, 0);
    assert_eq!(rows[1].survival_time_days, 366);

    let sheets = excel_read::read_workbook(&summary.workbook_path).expect("output read");
    let wide = sheets
        .iter()
        .find(|sheet| sheet.name == FOLLOWUP_SHEET)
        .expect("wide sheet");
    assert_eq!(wide.headers, WIDE_COLUMNS);
    assert_eq!(wide.rows.len(), 2);

    let long = sheets
        .iter()
        .find(|sheet| sheet.name == TIME_POINT_SHEET)
        .expect("long sheet");
    assert_eq!(long.rows.len(), 4);
}

#[test]
fn survival_outcomes_survive_a_csv_round_trip() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("CAG_followup.xlsx");
    write_cohort_workbook(&input);

    let mut config = PipelineConfig::default();
    config.output.output_dir = temp_dir.path().join("out");

    let summary = pipeline::run(&RunOptions {
        input,
        endpoint: Endpoint::Mace,
        config,
        group_label: None,
        wide_only: true,
    })
    .expect("pipeline run");

    let rows = survival::read_survival_csv(&summary.survival_path).expect("survival read");
    let copy_path = temp_dir.path().join("survival_copy.csv");
    survival::write_survival_csv(&copy_path, &rows).expect("survival rewritten");
    let restored = survival::read_survival_csv(&copy_path).expect("survival reread");

    assert_eq!(rows, restored);

    let sheets = excel_read::read_workbook(&summary.workbook_path).expect("output read");
    assert!(sheets.iter().any(|sheet| sheet.name == FOLLOWUP_SHEET));
    assert!(!sheets.iter().any(|sheet| sheet.name == TIME_POINT_SHEET));
}
