use std::fmt::Display;

use chrono::NaiveDate;

use crate::model::{EventType, FirstOccurrence, FollowupRecord, PatientRecord, ProcedureRecord};

/// Sheet name of the wide per-patient table.
pub const FOLLOWUP_SHEET: &str = "Followup Data";
/// Sheet name of the long per-visit table.
pub const TIME_POINT_SHEET: &str = "Time Points";

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// All tables required to materialise the output workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputWorkbook {
    pub tables: Vec<OutputTable>,
}

/// Fixed column schema of the wide table. [`wide_row`] must stay in step
/// with this list.
pub const WIDE_COLUMNS: &[&str] = &[
    "patient_id",
    "patient_name",
    "birthday",
    "age",
    "gender",
    "group_name",
    "enrollment_date",
    "latest_followup_date",
    "latest_followup_months",
    "days_to_latest_followup",
    "first_event_type",
    "first_event_date",
    "first_event_time_point",
    "first_event_months",
    "days_to_first_event",
    "first_death_date",
    "first_death_time_point",
    "days_to_first_death",
    "first_mi_date",
    "first_mi_time_point",
    "days_to_first_mi",
    "first_angina_date",
    "first_angina_time_point",
    "days_to_first_angina",
    "first_heart_failure_date",
    "first_heart_failure_time_point",
    "days_to_first_heart_failure",
    "first_revascularization_date",
    "first_revascularization_time_point",
    "days_to_first_revascularization",
    "first_hospitalization_date",
    "first_hospitalization_time_point",
    "days_to_first_hospitalization",
    "has_coronary_ct",
    "first_coronary_ct_date",
    "first_coronary_ct_time_point",
    "has_coronary_angiography",
    "first_coronary_angiography_date",
    "first_coronary_angiography_time_point",
    "has_coronary_intervention",
    "first_coronary_intervention_date",
    "first_coronary_intervention_time_point",
    "has_coronary_bypass",
    "first_coronary_bypass_date",
    "first_coronary_bypass_time_point",
    "has_revascularization_treatment",
    "first_revascularization_treatment_date",
    "first_revascularization_treatment_time_point",
    "first_revascularization_treatment_type",
    "first_revascularization_treatment_detail",
    "has_death",
    "has_cardiovascular_event",
    "has_lost_to_followup",
    "total_followup_status",
    "event_occurred",
    "survival_time_days",
    "endpoint_event",
    "processing_timestamp",
];

/// Builds the output workbook: the wide per-patient table, optionally
/// followed by the long per-visit table.
pub fn build_output_workbook(
    records: &[FollowupRecord],
    patients: &[PatientRecord],
    include_long_sheet: bool,
) -> OutputWorkbook {
    let mut tables = vec![wide_table(records)];
    if include_long_sheet {
        tables.push(long_table(patients));
    }
    OutputWorkbook { tables }
}

fn wide_table(records: &[FollowupRecord]) -> OutputTable {
    OutputTable {
        sheet_name: FOLLOWUP_SHEET.to_string(),
        columns: WIDE_COLUMNS.iter().map(|name| name.to_string()).collect(),
        rows: records.iter().map(wide_row).collect(),
    }
}

fn wide_row(record: &FollowupRecord) -> Vec<String> {
    let mut cells = Vec::with_capacity(WIDE_COLUMNS.len());
    cells.push(record.patient_id.clone());
    cells.push(opt(record.patient_name.as_ref()));
    cells.push(date(record.birthday));
    cells.push(opt(record.age.as_ref()));
    cells.push(opt(record.gender.as_ref()));
    cells.push(opt(record.group_name.as_ref()));
    cells.push(record.enrollment_date.to_string());
    cells.push(date(record.latest_followup_date));
    cells.push(opt(record.latest_followup_months.as_ref()));
    cells.push(opt(record.days_to_latest_followup.as_ref()));
    cells.push(opt(record.first_event_type.as_ref()));
    cells.push(date(record.first_event_date));
    cells.push(opt(record.first_event_time_point.as_ref()));
    cells.push(opt(record.first_event_months.as_ref()));
    cells.push(opt(record.days_to_first_event.as_ref()));
    for event_type in [
        EventType::Death,
        EventType::Mi,
        EventType::Angina,
        EventType::HeartFailure,
        EventType::Revascularization,
        EventType::Hospitalization,
    ] {
        push_first_event(&mut cells, record.first_event(event_type));
    }
    push_procedure(&mut cells, &record.coronary_ct);
    push_procedure(&mut cells, &record.coronary_angiography);
    push_procedure(&mut cells, &record.coronary_intervention);
    push_procedure(&mut cells, &record.coronary_bypass);
    push_procedure(&mut cells, &record.revascularization_treatment);
    cells.push(opt(record.revascularization_treatment_type.as_ref()));
    cells.push(opt(record.revascularization_treatment_detail.as_ref()));
    cells.push(boolean(record.has_death));
    cells.push(boolean(record.has_cardiovascular_event));
    cells.push(boolean(record.has_lost_to_followup));
    cells.push(record.followup_status.as_str().to_string());
    cells.push(record.event_occurred.to_string());
    cells.push(record.survival_time_days.to_string());
    cells.push(record.endpoint_event.as_str().to_string());
    cells.push(record.processing_timestamp.format("%Y-%m-%dT%H:%M:%S").to_string());
    cells
}

fn long_table(patients: &[PatientRecord]) -> OutputTable {
    let columns = [
        "patient_id",
        "time_point",
        "months",
        "visit_date",
        "is_lost_to_followup",
        "loss_reason",
        "death_date",
        "death_reason",
        "event_types",
        "coronary_intervention",
        "intervention_date",
        "coronary_ct",
        "coronary_bypass",
        "bypass_date",
        "revascularization_treatment",
        "revascularization_type",
        "revascularization_date",
        "revascularization_detail",
        "current_symptoms",
        "current_diagnosis",
    ];

    let mut rows = Vec::new();
    for patient in patients {
        for time_point in &patient.time_points {
            let event_types = time_point
                .event_types
                .iter()
                .map(EventType::as_str)
                .collect::<Vec<_>>()
                .join(",");
            rows.push(vec![
                patient.patient_id.clone(),
                time_point.time_point.clone(),
                time_point.months.to_string(),
                date(time_point.visit_date),
                boolean(time_point.is_lost_to_followup),
                opt(time_point.loss_reason.as_ref()),
                date(time_point.death_date),
                opt(time_point.death_reason.as_ref()),
                event_types,
                opt(time_point.coronary_intervention.as_ref()),
                date(time_point.intervention_date),
                opt(time_point.coronary_ct.as_ref()),
                opt(time_point.coronary_bypass.as_ref()),
                date(time_point.bypass_date),
                opt(time_point.revascularization_treatment.as_ref()),
                opt(time_point.revascularization_type.as_ref()),
                date(time_point.revascularization_date),
                opt(time_point.revascularization_detail.as_ref()),
                opt(time_point.current_symptoms.as_ref()),
                opt(time_point.current_diagnosis.as_ref()),
            ]);
        }
    }

    OutputTable {
        sheet_name: TIME_POINT_SHEET.to_string(),
        columns: columns.iter().map(|name| name.to_string()).collect(),
        rows,
    }
}

fn push_first_event(cells: &mut Vec<String>, first: Option<&FirstOccurrence>) {
    cells.push(first.map(|f| f.date.to_string()).unwrap_or_default());
    cells.push(first.map(|f| f.time_point.clone()).unwrap_or_default());
    cells.push(
        first
            .map(|f| f.days_from_enrollment.to_string())
            .unwrap_or_default(),
    );
}

fn push_procedure(cells: &mut Vec<String>, procedure: &ProcedureRecord) {
    cells.push(boolean(procedure.observed));
    cells.push(date(procedure.date));
    cells.push(opt(procedure.time_point.as_ref()));
}

fn opt<T: Display>(value: Option<&T>) -> String {
    value.map(|inner| inner.to_string()).unwrap_or_default()
}

fn date(value: Option<NaiveDate>) -> String {
    value.map(|inner| inner.to_string()).unwrap_or_default()
}

fn boolean(value: bool) -> String {
    if value { "true".into() } else { "false".into() }
}
