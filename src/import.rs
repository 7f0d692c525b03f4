use calamine::DataType;
use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{InvalidDateHandling, PipelineConfig};
use crate::error::{Result, ToolError};
use crate::io::excel_read::{Sheet, cell_to_date, cell_to_string};
use crate::model::{EventType, PatientRecord, TimePointData};

/// Merges the per-time-point follow-up sheets of one workbook into
/// longitudinal patient records, resolving candidate column names per the
/// configuration.
pub struct LongitudinalImporter<'a> {
    config: &'a PipelineConfig,
    months_pattern: Regex,
}

/// Row-level problems tallied while importing; reported at end of run.
#[derive(Debug, Default, Clone)]
pub struct ImportStats {
    /// Patients dropped because no sheet yielded an enrollment date.
    pub skipped_patients: usize,
    /// Cells that should hold dates but did not parse.
    pub invalid_dates: usize,
    /// Sheets whose names carry no recognizable time point.
    pub ignored_sheets: Vec<String>,
}

pub struct ImportOutcome {
    pub patients: Vec<PatientRecord>,
    pub stats: ImportStats,
}

impl<'a> LongitudinalImporter<'a> {
    pub fn new(config: &'a PipelineConfig) -> Result<Self> {
        // Matches "12个月", "第三月随访", "6M" style sheet names.
        let months_pattern = Regex::new(r"(\d+)\s*(?:个?月|[Mm]\b)")?;
        Ok(Self {
            config,
            months_pattern,
        })
    }

    /// Imports all patients found in the roster sheet, merging their rows
    /// across every follow-up sheet. Patients without an enrollment date are
    /// skipped and counted.
    pub fn import(&self, sheets: &[Sheet]) -> Result<ImportOutcome> {
        let Some(roster) = sheets.first() else {
            return Err(ToolError::InvalidWorkbook(
                "workbook contains no readable sheets".into(),
            ));
        };

        let patient_ids = self.patient_ids(roster)?;
        info!(patients = patient_ids.len(), "found patient roster");

        let basic_info = self.basic_info_sheet(sheets);
        let mut stats = ImportStats::default();
        let followups = self.followup_sheets(sheets, &mut stats);
        if followups.is_empty() {
            return Err(ToolError::InvalidWorkbook(
                "no sheet name carries a recognizable follow-up time point".into(),
            ));
        }

        let mut patients = Vec::with_capacity(patient_ids.len());
        for patient_id in patient_ids {
            match self.build_record(&patient_id, basic_info, &followups, &mut stats) {
                Ok(record) => patients.push(record),
                Err(ToolError::MissingEnrollment(id)) => {
                    warn!(patient = %id, "no enrollment date in any sheet, skipping patient");
                    stats.skipped_patients += 1;
                }
                Err(other) => return Err(other),
            }
        }

        info!(
            imported = patients.len(),
            skipped = stats.skipped_patients,
            invalid_dates = stats.invalid_dates,
            "import complete"
        );
        Ok(ImportOutcome { patients, stats })
    }

    /// Months since enrollment encoded in a sheet name, via the configured
    /// aliases first and the numeric pattern second.
    pub fn time_point_months(&self, sheet_name: &str) -> Option<u32> {
        for (fragment, months) in &self.config.time_points.aliases {
            if sheet_name.contains(fragment.as_str()) {
                return Some(*months);
            }
        }
        self.months_pattern
            .captures(sheet_name)
            .and_then(|captures| captures.get(1))
            .and_then(|digits| digits.as_str().parse().ok())
    }

    fn followup_sheets<'s>(
        &self,
        sheets: &'s [Sheet],
        stats: &mut ImportStats,
    ) -> Vec<(u32, &'s Sheet)> {
        let mut followups = Vec::new();
        for sheet in sheets {
            match self.time_point_months(&sheet.name) {
                Some(months) => followups.push((months, sheet)),
                None => {
                    debug!(sheet = %sheet.name, "no time point in sheet name, ignoring");
                    stats.ignored_sheets.push(sheet.name.clone());
                }
            }
        }
        followups.sort_by_key(|(months, _)| *months);
        followups
    }

    /// The baseline demographics sheet: first sheet whose name contains a
    /// configured fragment, else the roster sheet.
    fn basic_info_sheet<'s>(&self, sheets: &'s [Sheet]) -> &'s Sheet {
        for sheet in sheets {
            let lowered = sheet.name.to_lowercase();
            for fragment in &self.config.fields.basic_info_sheet {
                if lowered.contains(&fragment.to_lowercase()) {
                    debug!(sheet = %sheet.name, "using baseline demographics sheet");
                    return sheet;
                }
            }
        }
        warn!(
            sheet = %sheets[0].name,
            "no baseline demographics sheet found, falling back to the first sheet"
        );
        &sheets[0]
    }

    /// Unique patient identifiers, in order of first appearance.
    fn patient_ids(&self, roster: &Sheet) -> Result<Vec<String>> {
        let Some(id_column) = roster.column_index(&self.config.fields.patient_id) else {
            return Err(ToolError::InvalidWorkbook(format!(
                "sheet '{}' has no patient identifier column",
                roster.name
            )));
        };

        let mut ids = Vec::new();
        for row in &roster.rows {
            let id = cell_to_string(row.get(id_column));
            if id.is_empty() || ids.contains(&id) {
                continue;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn find_patient_row<'s>(&self, sheet: &'s Sheet, patient_id: &str) -> Option<&'s [DataType]> {
        let id_column = sheet.column_index(&self.config.fields.patient_id)?;
        sheet
            .rows
            .iter()
            .find(|row| cell_to_string(row.get(id_column)) == patient_id)
            .map(|row| row.as_slice())
    }

    fn build_record(
        &self,
        patient_id: &str,
        basic_info: &Sheet,
        followups: &[(u32, &Sheet)],
        stats: &mut ImportStats,
    ) -> Result<PatientRecord> {
        let fields = &self.config.fields;

        let mut patient_name = None;
        let mut birthday = None;
        let mut enrollment_date = None;
        let mut age = None;
        let mut gender = None;
        let mut group_name = None;

        if let Some(row) = self.find_patient_row(basic_info, patient_id) {
            patient_name = basic_info.text(row, &fields.patient_name);
            birthday = self.date_field(basic_info, row, &fields.birthday, "birthday", stats);
            enrollment_date = self.date_field(
                basic_info,
                row,
                &fields.enrollment_date,
                "enrollment_date",
                stats,
            );
            age = basic_info
                .text(row, &fields.age)
                .and_then(|text| text.parse().ok());
            gender = basic_info.text(row, &fields.gender).map(decode_gender);
            group_name = basic_info.text(row, &fields.group_name);
        } else {
            debug!(patient = %patient_id, sheet = %basic_info.name, "no baseline row");
        }

        let mut time_points = Vec::new();
        for (months, sheet) in followups {
            let Some(row) = self.find_patient_row(sheet, patient_id) else {
                continue;
            };
            // Older workbooks keep the enrollment date on the follow-up
            // sheets instead of a baseline sheet.
            if enrollment_date.is_none() {
                enrollment_date = self.date_field(
                    sheet,
                    row,
                    &fields.enrollment_date,
                    "enrollment_date",
                    stats,
                );
            }
            time_points.push(self.extract_time_point(sheet, row, *months, stats));
        }

        let Some(enrollment_date) = enrollment_date else {
            return Err(ToolError::MissingEnrollment(patient_id.to_string()));
        };

        let mut record = PatientRecord {
            patient_id: patient_id.to_string(),
            patient_name,
            enrollment_date,
            birthday,
            age,
            gender,
            group_name,
            time_points,
            latest_followup_date: None,
            latest_followup_months: None,
            days_to_latest_followup: None,
        };
        record.update_latest_followup();
        Ok(record)
    }

    fn extract_time_point(
        &self,
        sheet: &Sheet,
        row: &[DataType],
        months: u32,
        stats: &mut ImportStats,
    ) -> TimePointData {
        let fields = &self.config.fields;

        let event_types = sheet
            .text(row, &fields.adverse_event_code)
            .map(|codes| self.parse_event_codes(&codes))
            .unwrap_or_default();

        TimePointData {
            time_point: sheet.name.clone(),
            months,
            visit_date: self.date_field(sheet, row, &fields.visit_date, "visit_date", stats),
            is_lost_to_followup: sheet
                .text(row, &fields.loss_to_followup)
                .is_some_and(|flag| is_truthy(&flag)),
            loss_reason: sheet.text(row, &fields.loss_reason),
            death_date: self.date_field(sheet, row, &fields.death_date, "death_date", stats),
            death_reason: sheet.text(row, &fields.death_reason),
            cardiovascular_event: sheet.text(row, &fields.cardiovascular_event),
            event_types,
            coronary_intervention: sheet.text(row, &fields.coronary_intervention),
            intervention_date: self.date_field(
                sheet,
                row,
                &fields.intervention_date,
                "intervention_date",
                stats,
            ),
            coronary_ct: sheet.text(row, &fields.coronary_ct),
            coronary_bypass: sheet.text(row, &fields.coronary_bypass),
            bypass_date: self.date_field(sheet, row, &fields.bypass_date, "bypass_date", stats),
            revascularization_treatment: sheet.text(row, &fields.revascularization_treatment),
            revascularization_type: sheet.text(row, &fields.revascularization_type),
            revascularization_date: self.date_field(
                sheet,
                row,
                &fields.revascularization_date,
                "revascularization_date",
                stats,
            ),
            revascularization_detail: sheet.text(row, &fields.revascularization_detail),
            current_symptoms: sheet.text(row, &fields.symptoms),
            current_diagnosis: sheet.text(row, &fields.diagnosis),
        }
    }

    /// Decodes the comma-separated adverse-event codes ("5,6") into event
    /// types. Unknown codes are logged and dropped.
    pub fn parse_event_codes(&self, codes: &str) -> Vec<EventType> {
        let mut event_types = Vec::new();
        for part in codes.split([',', '，']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some(code) = parse_code(part) else {
                debug!(code = %part, "unparseable adverse event code");
                continue;
            };
            match self.config.event_for_code(code) {
                Some(event_type) => event_types.push(event_type),
                None => debug!(code, "adverse event code not in configuration"),
            }
        }
        event_types
    }

    /// Date cell lookup honoring the configured invalid-date handling.
    fn date_field(
        &self,
        sheet: &Sheet,
        row: &[DataType],
        candidates: &[String],
        field: &str,
        stats: &mut ImportStats,
    ) -> Option<NaiveDate> {
        let cell = sheet.value(row, candidates)?;
        let parsed = cell_to_date(Some(cell));
        if parsed.is_none() {
            stats.invalid_dates += 1;
            if self.config.processing.invalid_date_handling == InvalidDateHandling::Skip {
                warn!(
                    sheet = %sheet.name,
                    field,
                    value = %cell_to_string(Some(cell)),
                    "unparseable date, treating as absent"
                );
            }
        }
        parsed
    }
}

/// Numeric code from a cell rendered as text; "1.0" and "1" both map to 1.
pub fn parse_code(value: &str) -> Option<u8> {
    let parsed: f64 = value.trim().parse().ok()?;
    if parsed.fract() != 0.0 || !(0.0..=255.0).contains(&parsed) {
        return None;
    }
    Some(parsed as u8)
}

/// Flag cells follow the codebook convention 1 = yes, 2 = no; free-text
/// cells count as set when non-empty.
fn is_truthy(value: &str) -> bool {
    match parse_code(value) {
        Some(code) => code == 1,
        None => !value.trim().is_empty(),
    }
}

/// Codebook gender: 1 = male (男), 2 = female (女); anything else verbatim.
fn decode_gender(value: String) -> String {
    match parse_code(&value) {
        Some(1) => "男".to_string(),
        Some(2) => "女".to_string(),
        _ => value,
    }
}
