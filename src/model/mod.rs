use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier assigned to a patient. The source workbooks use free-form
/// subject identifiers, so the plain string representation is kept for ease
/// of interoperability with the exported tables.
pub type PatientId = String;

/// Clinical event categories tracked across follow-up time points.
///
/// The first six variants correspond to the numeric codes used in the
/// follow-up codebook (1 through 6). The remaining variants are derived from
/// dedicated workbook columns rather than the coded event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Death,
    Mi,
    Revascularization,
    HeartFailure,
    Angina,
    Hospitalization,
    CoronaryBypass,
    CoronaryIntervention,
    /// Generic adverse cardiovascular event recorded when the event flag is
    /// set but the specific code column is absent or unreadable.
    Cardiovascular,
}

impl EventType {
    /// Stable string form used in exported tables and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Death => "death",
            EventType::Mi => "mi",
            EventType::Revascularization => "revascularization",
            EventType::HeartFailure => "heart_failure",
            EventType::Angina => "angina",
            EventType::Hospitalization => "hospitalization",
            EventType::CoronaryBypass => "coronary_bypass",
            EventType::CoronaryIntervention => "coronary_intervention",
            EventType::Cardiovascular => "cardiovascular_event",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "death" => Ok(EventType::Death),
            "mi" => Ok(EventType::Mi),
            "revascularization" => Ok(EventType::Revascularization),
            "heart_failure" => Ok(EventType::HeartFailure),
            "angina" => Ok(EventType::Angina),
            "hospitalization" => Ok(EventType::Hospitalization),
            "coronary_bypass" => Ok(EventType::CoronaryBypass),
            "coronary_intervention" => Ok(EventType::CoronaryIntervention),
            "cardiovascular_event" => Ok(EventType::Cardiovascular),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

/// Survival-analysis endpoint selected for a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Death,
    /// Composite endpoint: death, myocardial infarction, or
    /// revascularization, whichever occurs first.
    Mace,
    Mi,
    Angina,
    HeartFailure,
    Revascularization,
    Hospitalization,
    AnyEvent,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Death => "death",
            Endpoint::Mace => "mace",
            Endpoint::Mi => "mi",
            Endpoint::Angina => "angina",
            Endpoint::HeartFailure => "heart_failure",
            Endpoint::Revascularization => "revascularization",
            Endpoint::Hospitalization => "hospitalization",
            Endpoint::AnyEvent => "any_event",
        }
    }

    /// Event types that satisfy this endpoint.
    pub fn member_types(&self) -> &'static [EventType] {
        match self {
            Endpoint::Death => &[EventType::Death],
            Endpoint::Mace => &[
                EventType::Death,
                EventType::Mi,
                EventType::Revascularization,
            ],
            Endpoint::Mi => &[EventType::Mi],
            Endpoint::Angina => &[EventType::Angina],
            Endpoint::HeartFailure => &[EventType::HeartFailure],
            Endpoint::Revascularization => &[EventType::Revascularization],
            Endpoint::Hospitalization => &[EventType::Hospitalization],
            Endpoint::AnyEvent => &[
                EventType::Death,
                EventType::Mi,
                EventType::Revascularization,
                EventType::HeartFailure,
                EventType::Angina,
                EventType::Hospitalization,
                EventType::CoronaryBypass,
                EventType::CoronaryIntervention,
                EventType::Cardiovascular,
            ],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follow-up observations recorded at a single named time point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimePointData {
    /// Full sheet name the observations came from, e.g. "12个月随访".
    pub time_point: String,
    /// Months since enrollment the time point nominally represents.
    pub months: u32,
    pub visit_date: Option<NaiveDate>,
    pub is_lost_to_followup: bool,
    pub loss_reason: Option<String>,
    pub death_date: Option<NaiveDate>,
    pub death_reason: Option<String>,
    /// Raw cardiovascular-event flag cell (codebook: 1 = event, 2 = none).
    pub cardiovascular_event: Option<String>,
    /// Event types decoded from the comma-separated adverse-event codes.
    pub event_types: Vec<EventType>,
    pub coronary_intervention: Option<String>,
    pub intervention_date: Option<NaiveDate>,
    pub coronary_ct: Option<String>,
    pub coronary_bypass: Option<String>,
    pub bypass_date: Option<NaiveDate>,
    pub revascularization_treatment: Option<String>,
    pub revascularization_type: Option<String>,
    pub revascularization_date: Option<NaiveDate>,
    pub revascularization_detail: Option<String>,
    pub current_symptoms: Option<String>,
    pub current_diagnosis: Option<String>,
}

/// A patient merged across all follow-up sheets of one workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    pub patient_id: PatientId,
    pub patient_name: Option<String>,
    pub enrollment_date: NaiveDate,
    pub birthday: Option<NaiveDate>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub group_name: Option<String>,
    /// Time points sorted by months since enrollment.
    pub time_points: Vec<TimePointData>,
    pub latest_followup_date: Option<NaiveDate>,
    pub latest_followup_months: Option<u32>,
    pub days_to_latest_followup: Option<i64>,
}

impl PatientRecord {
    /// Recomputes the latest follow-up fields from the highest-months time
    /// point that carries a visit date.
    pub fn update_latest_followup(&mut self) {
        self.time_points.sort_by_key(|tp| tp.months);
        for time_point in self.time_points.iter().rev() {
            if let Some(visit_date) = time_point.visit_date {
                self.latest_followup_date = Some(visit_date);
                self.latest_followup_months = Some(time_point.months);
                self.days_to_latest_followup =
                    Some((visit_date - self.enrollment_date).num_days());
                return;
            }
        }
        self.latest_followup_date = None;
        self.latest_followup_months = None;
        self.days_to_latest_followup = None;
    }
}

/// First observed occurrence of one event type for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstOccurrence {
    pub date: NaiveDate,
    pub time_point: String,
    pub days_from_enrollment: i64,
}

/// First observed coronary procedure of one kind for one patient.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureRecord {
    pub observed: bool,
    pub date: Option<NaiveDate>,
    pub time_point: Option<String>,
}

/// Completeness classification of a patient's follow-up history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupStatus {
    NoData,
    LostToFollowup,
    Complete,
    Adequate,
    Incomplete,
    Unknown,
}

impl FollowupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowupStatus::NoData => "no_data",
            FollowupStatus::LostToFollowup => "lost_to_followup",
            FollowupStatus::Complete => "complete",
            FollowupStatus::Adequate => "adequate",
            FollowupStatus::Incomplete => "incomplete",
            FollowupStatus::Unknown => "unknown",
        }
    }
}

/// Wide output row: one patient's demographics, per-type first events,
/// coronary procedure history, and survival outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowupRecord {
    pub patient_id: PatientId,
    pub patient_name: Option<String>,
    pub enrollment_date: NaiveDate,
    pub birthday: Option<NaiveDate>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub group_name: Option<String>,

    pub latest_followup_date: Option<NaiveDate>,
    pub latest_followup_months: Option<u32>,
    pub days_to_latest_followup: Option<i64>,

    /// Earliest event of any type; same-day ties resolved by configured
    /// priority.
    pub first_event_type: Option<EventType>,
    pub first_event_date: Option<NaiveDate>,
    pub first_event_time_point: Option<String>,
    pub first_event_months: Option<u32>,
    pub days_to_first_event: Option<i64>,

    /// First occurrence per event type, keyed by the core event categories.
    pub first_events: BTreeMap<EventType, FirstOccurrence>,

    pub coronary_ct: ProcedureRecord,
    pub coronary_angiography: ProcedureRecord,
    pub coronary_intervention: ProcedureRecord,
    pub coronary_bypass: ProcedureRecord,
    pub revascularization_treatment: ProcedureRecord,
    pub revascularization_treatment_type: Option<String>,
    pub revascularization_treatment_detail: Option<String>,

    pub has_death: bool,
    pub has_cardiovascular_event: bool,
    pub has_lost_to_followup: bool,
    pub followup_status: FollowupStatus,

    /// 1 when the selected endpoint fired, 0 when censored.
    pub event_occurred: u8,
    pub survival_time_days: i64,
    pub endpoint_event: Endpoint,

    pub processing_timestamp: NaiveDateTime,
}

impl FollowupRecord {
    /// Helper for exports: first occurrence of one event type, if any.
    pub fn first_event(&self, event_type: EventType) -> Option<&FirstOccurrence> {
        self.first_events.get(&event_type)
    }
}

/// One row of the survival-analysis CSV handed to R/SPSS downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalRow {
    pub patient_id: PatientId,
    pub survival_time_days: i64,
    pub event_occurred: u8,
    pub endpoint_event: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub group_name: Option<String>,
    pub enrollment_date: NaiveDate,
}

impl SurvivalRow {
    pub fn from_followup(record: &FollowupRecord) -> Self {
        Self {
            patient_id: record.patient_id.clone(),
            survival_time_days: record.survival_time_days,
            event_occurred: record.event_occurred,
            endpoint_event: record.endpoint_event.as_str().to_string(),
            age: record.age,
            gender: record.gender.clone(),
            group_name: record.group_name.clone(),
            enrollment_date: record.enrollment_date,
        }
    }
}
