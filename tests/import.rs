use calamine::DataType;
use chrono::NaiveDate;
use followup_tools::config::PipelineConfig;
use followup_tools::import::{LongitudinalImporter, parse_code};
use followup_tools::io::excel_read::{
    Sheet, cell_to_date, cell_to_string, excel_serial_to_date, parse_date_str,
};
use followup_tools::model::EventType;

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("test date")
}

fn sheet(name: &str, headers: &[&str], rows: &[&[&str]]) -> Sheet {
    Sheet {
        name: name.to_string(),
        headers: headers.iter().map(|header| header.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            DataType::Empty
                        } else {
                            DataType::String(cell.to_string())
                        }
                    })
                    .collect()
            })
            .collect(),
    }
}

#[test]
fn sheet_names_resolve_to_months() {
    let config = PipelineConfig::default();
    let importer = LongitudinalImporter::new(&config).expect("importer");

    assert_eq!(importer.time_point_months("第三个月随访"), Some(3));
    assert_eq!(importer.time_point_months("一个月随访"), Some(1));
    assert_eq!(importer.time_point_months("三个月随访"), Some(3));
    assert_eq!(importer.time_point_months("六个月随访"), Some(6));
    assert_eq!(importer.time_point_months("第12个月随访"), Some(12));
    assert_eq!(importer.time_point_months("24个月"), Some(24));
    assert_eq!(importer.time_point_months("6M Followup"), Some(6));
    assert_eq!(importer.time_point_months("baseline"), None);
}

#[test]
fn event_codes_decode_and_unknown_codes_drop() {
    let config = PipelineConfig::default();
    let importer = LongitudinalImporter::new(&config).expect("importer");

    assert_eq!(
        importer.parse_event_codes("5,6"),
        vec![EventType::Angina, EventType::Hospitalization]
    );
    assert_eq!(importer.parse_event_codes("1.0"), vec![EventType::Death]);
    assert_eq!(importer.parse_event_codes("9, x"), Vec::<EventType>::new());
    assert_eq!(
        importer.parse_event_codes("2，3"),
        vec![EventType::Mi, EventType::Revascularization]
    );
}

#[test]
fn import_merges_sheets_and_skips_patients_without_enrollment() {
    let config = PipelineConfig::default();
    let importer = LongitudinalImporter::new(&config).expect("importer");

    let sheets = vec![
        sheet(
            "baseline",
            &["patient_id", "enrollment_date", "age", "gender"],
            &[
                &["P1", "2020-01-01", "64", "1"],
                &["P2", "", "58", "2"],
            ],
        ),
        sheet(
            "12个月随访",
            &["patient_id", "visit_date"],
            &[&["P1", "2020-12-30"], &["P2", "2021-01-02"]],
        ),
    ];

    let outcome = importer.import(&sheets).expect("import");
    assert_eq!(outcome.patients.len(), 1);
    assert_eq!(outcome.stats.skipped_patients, 1);

    let record = &outcome.patients[0];
    assert_eq!(record.patient_id, "P1");
    assert_eq!(record.enrollment_date, date("2020-01-01"));
    assert_eq!(record.age, Some(64));
    assert_eq!(record.gender.as_deref(), Some("男"));
    assert_eq!(record.latest_followup_months, Some(12));
    assert_eq!(record.latest_followup_date, Some(date("2020-12-30")));
    assert_eq!(record.days_to_latest_followup, Some(364));
}

#[test]
fn codebook_column_names_resolve() {
    let config = PipelineConfig::default();
    let importer = LongitudinalImporter::new(&config).expect("importer");

    let sheets = vec![
        sheet("基本信息", &["subjid", "groupdate"], &[&["P9", "2020-01-01"]]),
        sheet(
            "第三个月随访",
            &["subjid", "随访日期1", "死亡时间1"],
            &[&["P9", "2020-04-01", "2020-03-20"]],
        ),
    ];

    let outcome = importer.import(&sheets).expect("import");
    assert_eq!(outcome.patients.len(), 1);

    let visit = &outcome.patients[0].time_points[0];
    assert_eq!(visit.months, 3);
    assert_eq!(visit.visit_date, Some(date("2020-04-01")));
    assert_eq!(visit.death_date, Some(date("2020-03-20")));
}

#[test]
fn enrollment_date_falls_back_to_followup_sheets() {
    let config = PipelineConfig::default();
    let importer = LongitudinalImporter::new(&config).expect("importer");

    let sheets = vec![
        sheet("baseline", &["patient_id", "age"], &[&["P1", "70"]]),
        sheet(
            "6M",
            &["patient_id", "enrollment_date", "visit_date"],
            &[&["P1", "2020-01-01", "2020-07-01"]],
        ),
    ];

    let outcome = importer.import(&sheets).expect("import");
    assert_eq!(outcome.patients[0].enrollment_date, date("2020-01-01"));
    assert_eq!(outcome.patients[0].age, Some(70));
}

#[test]
fn unparseable_dates_are_counted_and_left_absent() {
    let config = PipelineConfig::default();
    let importer = LongitudinalImporter::new(&config).expect("importer");

    let sheets = vec![
        sheet(
            "baseline",
            &["patient_id", "enrollment_date"],
            &[&["P1", "2020-01-01"]],
        ),
        sheet(
            "12个月随访",
            &["patient_id", "visit_date"],
            &[&["P1", "soon"]],
        ),
    ];

    let outcome = importer.import(&sheets).expect("import");
    assert_eq!(outcome.stats.invalid_dates, 1);
    assert_eq!(outcome.patients[0].time_points[0].visit_date, None);
    assert_eq!(outcome.patients[0].latest_followup_date, None);
}

#[test]
fn date_strings_parse_across_known_layouts() {
    for raw in [
        "2021-06-15",
        "2021/06/15",
        "15-06-2021",
        "15/06/2021",
        "20210615",
        "2021-06-15 00:00:00",
        "2021-06-15T08:30:00",
    ] {
        assert_eq!(parse_date_str(raw), Some(date("2021-06-15")), "{raw}");
    }
    assert_eq!(parse_date_str("not a date"), None);
    assert_eq!(parse_date_str(""), None);
}

#[test]
fn excel_serials_map_through_the_1900_epoch() {
    assert_eq!(excel_serial_to_date(25569.0), Some(date("1970-01-01")));
    assert_eq!(excel_serial_to_date(0.0), None);
    assert_eq!(excel_serial_to_date(1_000_000.0), None);

    assert_eq!(
        cell_to_date(Some(&DataType::Float(25569.0))),
        Some(date("1970-01-01"))
    );
    assert_eq!(
        cell_to_date(Some(&DataType::String("2020-02-29".to_string()))),
        Some(date("2020-02-29"))
    );
}

#[test]
fn coded_cells_render_without_trailing_decimals() {
    assert_eq!(cell_to_string(Some(&DataType::Float(1.0))), "1");
    assert_eq!(cell_to_string(Some(&DataType::Float(2.5))), "2.5");
    assert_eq!(cell_to_string(Some(&DataType::Empty)), "");
    assert_eq!(cell_to_string(Some(&DataType::String(" x ".to_string()))), "x");

    assert_eq!(parse_code("1.0"), Some(1));
    assert_eq!(parse_code(" 6 "), Some(6));
    assert_eq!(parse_code("1.5"), None);
    assert_eq!(parse_code("x"), None);
}
