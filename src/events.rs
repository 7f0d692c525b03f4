use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::import::parse_code;
use crate::model::{
    Endpoint, EventType, FirstOccurrence, FollowupRecord, FollowupStatus, PatientRecord,
    ProcedureRecord, TimePointData,
};

/// Classifies follow-up observations into events and computes, per patient,
/// the first occurrence of each event type, the overall first event, and the
/// survival outcome for the selected endpoint.
pub struct EventProcessor<'a> {
    config: &'a PipelineConfig,
    endpoint: Endpoint,
}

/// One classified event observation, anchored to its time point.
#[derive(Debug, Clone)]
struct Observation {
    event_type: EventType,
    date: NaiveDate,
    time_point: String,
    months: u32,
    days_from_enrollment: i64,
}

#[derive(Debug, Default)]
struct ProcedureTracking {
    ct: ProcedureRecord,
    angiography: ProcedureRecord,
    intervention: ProcedureRecord,
    bypass: ProcedureRecord,
    revascularization: ProcedureRecord,
    revascularization_type: Option<String>,
    revascularization_detail: Option<String>,
}

impl<'a> EventProcessor<'a> {
    pub fn new(config: &'a PipelineConfig, endpoint: Endpoint) -> Self {
        Self { config, endpoint }
    }

    pub fn process_batch(&self, patients: &[PatientRecord]) -> Vec<FollowupRecord> {
        info!(patients = patients.len(), endpoint = %self.endpoint, "processing events");
        patients
            .iter()
            .map(|patient| self.process_patient(patient))
            .collect()
    }

    /// Builds the wide follow-up record for one patient.
    pub fn process_patient(&self, patient: &PatientRecord) -> FollowupRecord {
        let observations = self.collect_observations(patient);

        // First occurrence per event type: minimum date among observations
        // classified to that type. Observations arrive in time-point order,
        // so a strict comparison keeps the earliest sighting on equal dates.
        let mut first_events: BTreeMap<EventType, FirstOccurrence> = BTreeMap::new();
        for observation in &observations {
            let candidate = FirstOccurrence {
                date: observation.date,
                time_point: observation.time_point.clone(),
                days_from_enrollment: observation.days_from_enrollment,
            };
            first_events
                .entry(observation.event_type)
                .and_modify(|current| {
                    if observation.date < current.date {
                        *current = candidate.clone();
                    }
                })
                .or_insert(candidate);
        }

        // Overall first event: earliest date wins; same-day ties resolved by
        // configured priority (lower = more severe).
        let overall_first = observations
            .iter()
            .min_by_key(|observation| {
                (
                    observation.date,
                    self.config.priority(observation.event_type),
                )
            })
            .cloned();

        let procedures = self.track_procedures(patient);
        let (event_occurred, survival_time_days) = self.endpoint_outcome(patient, &first_events);

        let has_death = first_events.contains_key(&EventType::Death);
        let has_cardiovascular_event = !observations.is_empty();
        let has_lost_to_followup = patient
            .time_points
            .iter()
            .any(|time_point| time_point.is_lost_to_followup);

        FollowupRecord {
            patient_id: patient.patient_id.clone(),
            patient_name: patient.patient_name.clone(),
            enrollment_date: patient.enrollment_date,
            birthday: patient.birthday,
            age: patient.age,
            gender: patient.gender.clone(),
            group_name: patient.group_name.clone(),
            latest_followup_date: patient.latest_followup_date,
            latest_followup_months: patient.latest_followup_months,
            days_to_latest_followup: patient.days_to_latest_followup,
            first_event_type: overall_first.as_ref().map(|o| o.event_type),
            first_event_date: overall_first.as_ref().map(|o| o.date),
            first_event_time_point: overall_first.as_ref().map(|o| o.time_point.clone()),
            first_event_months: overall_first.as_ref().map(|o| o.months),
            days_to_first_event: overall_first.as_ref().map(|o| o.days_from_enrollment),
            first_events,
            coronary_ct: procedures.ct,
            coronary_angiography: procedures.angiography,
            coronary_intervention: procedures.intervention,
            coronary_bypass: procedures.bypass,
            revascularization_treatment: procedures.revascularization,
            revascularization_treatment_type: procedures.revascularization_type,
            revascularization_treatment_detail: procedures.revascularization_detail,
            has_death,
            has_cardiovascular_event,
            has_lost_to_followup,
            followup_status: followup_status(patient),
            event_occurred,
            survival_time_days,
            endpoint_event: self.endpoint,
            processing_timestamp: Utc::now().naive_utc(),
        }
    }

    /// Classifies every time point and validates the day deltas against the
    /// enrollment date. Events dated before enrollment or beyond the sanity
    /// bound are data errors and dropped.
    fn collect_observations(&self, patient: &PatientRecord) -> Vec<Observation> {
        let mut observations = Vec::new();
        for time_point in &patient.time_points {
            for (event_type, date) in identify_events(time_point) {
                let days_from_enrollment = (date - patient.enrollment_date).num_days();
                if days_from_enrollment < 0 {
                    warn!(
                        patient = %patient.patient_id,
                        event = %event_type,
                        %date,
                        "event predates enrollment, dropping"
                    );
                    continue;
                }
                if days_from_enrollment > self.config.processing.max_days_from_enrollment {
                    warn!(
                        patient = %patient.patient_id,
                        event = %event_type,
                        days = days_from_enrollment,
                        "event date implausibly far from enrollment, dropping"
                    );
                    continue;
                }
                debug!(
                    patient = %patient.patient_id,
                    event = %event_type,
                    time_point = %time_point.time_point,
                    %date,
                    "event observed"
                );
                observations.push(Observation {
                    event_type,
                    date,
                    time_point: time_point.time_point.clone(),
                    months: time_point.months,
                    days_from_enrollment,
                });
            }
        }
        observations
    }

    /// Survival outcome for the selected endpoint: `(1, days to endpoint)`
    /// when it fired, otherwise censored at the latest follow-up date.
    fn endpoint_outcome(
        &self,
        patient: &PatientRecord,
        first_events: &BTreeMap<EventType, FirstOccurrence>,
    ) -> (u8, i64) {
        let endpoint_date = self
            .endpoint
            .member_types()
            .iter()
            .filter_map(|event_type| first_events.get(event_type))
            .map(|first| first.date)
            .min();

        match endpoint_date {
            Some(date) => (1, (date - patient.enrollment_date).num_days()),
            None => {
                let censored = patient
                    .latest_followup_date
                    .map(|latest| (latest - patient.enrollment_date).num_days())
                    .unwrap_or(0);
                (0, censored)
            }
        }
    }

    /// First occurrences of coronary procedures, in time-point order.
    fn track_procedures(&self, patient: &PatientRecord) -> ProcedureTracking {
        let mut tracking = ProcedureTracking::default();

        for time_point in &patient.time_points {
            let Some(visit_date) = time_point.visit_date else {
                continue;
            };

            if flag_is_set(time_point.coronary_intervention.as_deref()) {
                let date = time_point.intervention_date.unwrap_or(visit_date);
                record_procedure(&mut tracking.intervention, date, &time_point.time_point);
                // An intervention implies angiography was performed.
                record_procedure(&mut tracking.angiography, date, &time_point.time_point);
            }

            if flag_is_set(time_point.coronary_ct.as_deref()) {
                record_procedure(&mut tracking.ct, visit_date, &time_point.time_point);
            }

            if flag_is_set(time_point.coronary_bypass.as_deref()) {
                let date = time_point.bypass_date.unwrap_or(visit_date);
                record_procedure(&mut tracking.bypass, date, &time_point.time_point);
            }

            if flag_is_set(time_point.revascularization_treatment.as_deref())
                && !tracking.revascularization.observed
            {
                let date = time_point.revascularization_date.unwrap_or(visit_date);
                record_procedure(&mut tracking.revascularization, date, &time_point.time_point);
                tracking.revascularization_type = time_point.revascularization_type.clone();
                tracking.revascularization_detail = time_point.revascularization_detail.clone();
            }
        }

        tracking
    }
}

/// All events observable at one time point.
///
/// A death date dominates: nothing after death is recorded at that time
/// point. Coded adverse events are dated at the visit; the bare
/// cardiovascular flag only yields a generic event when no code resolved.
/// Bypass and intervention flags carry their own dates when present.
fn identify_events(time_point: &TimePointData) -> Vec<(EventType, NaiveDate)> {
    if let Some(death_date) = time_point.death_date {
        return vec![(EventType::Death, death_date)];
    }

    let mut events = Vec::new();

    if let Some(visit_date) = time_point.visit_date {
        for event_type in &time_point.event_types {
            events.push((*event_type, visit_date));
        }

        if events.is_empty() && flag_is_set(time_point.cardiovascular_event.as_deref()) {
            events.push((EventType::Cardiovascular, visit_date));
        }
    }

    if flag_is_set(time_point.coronary_bypass.as_deref()) {
        if let Some(date) = time_point.bypass_date.or(time_point.visit_date) {
            events.push((EventType::CoronaryBypass, date));
        }
    }

    if flag_is_set(time_point.coronary_intervention.as_deref()) {
        if let Some(date) = time_point.intervention_date.or(time_point.visit_date) {
            events.push((EventType::CoronaryIntervention, date));
        }
    }

    events
}

/// Follow-up completeness per the latest reached time point: five years of
/// follow-up counts as complete, one year as adequate.
fn followup_status(patient: &PatientRecord) -> FollowupStatus {
    if patient.time_points.is_empty() {
        return FollowupStatus::NoData;
    }
    if patient
        .time_points
        .iter()
        .any(|time_point| time_point.is_lost_to_followup)
    {
        return FollowupStatus::LostToFollowup;
    }
    match patient.latest_followup_months {
        Some(months) if months >= 60 => FollowupStatus::Complete,
        Some(months) if months >= 12 => FollowupStatus::Adequate,
        Some(_) => FollowupStatus::Incomplete,
        None => FollowupStatus::Unknown,
    }
}

/// Codebook flag column: 1 = yes.
fn flag_is_set(value: Option<&str>) -> bool {
    value.and_then(parse_code) == Some(1)
}

/// Fills a procedure slot on its first sighting; later sightings are ignored.
fn record_procedure(record: &mut ProcedureRecord, date: NaiveDate, time_point: &str) {
    if record.observed {
        return;
    }
    record.observed = true;
    record.date = Some(date);
    record.time_point = Some(time_point.to_string());
}
