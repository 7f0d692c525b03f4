use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};
use crate::model::EventType;

/// Pipeline configuration loaded from a YAML file.
///
/// Every section has a complete built-in default mirroring the column layout
/// of the export system the source workbooks come from, so the tool runs
/// without any configuration file at all. A YAML file only needs to name the
/// sections it wants to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub fields: FieldCandidates,
    pub events: BTreeMap<EventType, EventRule>,
    pub time_points: TimePointAliases,
    pub processing: ProcessingOptions,
    pub output: OutputOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fields: FieldCandidates::default(),
            events: default_event_rules(),
            time_points: TimePointAliases::default(),
            processing: ProcessingOptions::default(),
            output: OutputOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants a usable configuration must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.fields.patient_id.is_empty() {
            return Err(ToolError::InvalidConfig(
                "fields.patient_id must list at least one candidate column".into(),
            ));
        }
        if self.fields.enrollment_date.is_empty() {
            return Err(ToolError::InvalidConfig(
                "fields.enrollment_date must list at least one candidate column".into(),
            ));
        }
        if self.events.is_empty() {
            return Err(ToolError::InvalidConfig(
                "events must define at least one event type".into(),
            ));
        }
        let mut seen_priorities = BTreeMap::new();
        for (event_type, rule) in &self.events {
            if let Some(previous) = seen_priorities.insert(rule.priority, *event_type) {
                return Err(ToolError::InvalidConfig(format!(
                    "events '{previous}' and '{event_type}' share priority {}",
                    rule.priority
                )));
            }
        }
        Ok(())
    }

    /// Resolves a numeric follow-up code to its configured event type.
    pub fn event_for_code(&self, code: u8) -> Option<EventType> {
        self.events
            .iter()
            .find(|(_, rule)| rule.code == Some(code))
            .map(|(event_type, _)| *event_type)
    }

    /// Tie-break rank for an event type; unconfigured types sort last.
    pub fn priority(&self, event_type: EventType) -> u32 {
        self.events
            .get(&event_type)
            .map(|rule| rule.priority)
            .unwrap_or(u32::MAX)
    }
}

/// Per-event-type classification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRule {
    /// Numeric code in the "which adverse event" follow-up column, when the
    /// codebook assigns one.
    pub code: Option<u8>,
    /// Severity rank used to break same-day ties; lower is more severe.
    pub priority: u32,
}

fn rule(code: Option<u8>, priority: u32) -> EventRule {
    EventRule { code, priority }
}

fn default_event_rules() -> BTreeMap<EventType, EventRule> {
    BTreeMap::from([
        (EventType::Death, rule(Some(1), 1)),
        (EventType::Mi, rule(Some(2), 2)),
        (EventType::Revascularization, rule(Some(3), 3)),
        (EventType::HeartFailure, rule(Some(4), 4)),
        (EventType::Angina, rule(Some(5), 5)),
        (EventType::Hospitalization, rule(Some(6), 6)),
        (EventType::CoronaryBypass, rule(None, 7)),
        (EventType::CoronaryIntervention, rule(None, 8)),
        (EventType::Cardiovascular, rule(None, 9)),
    ])
}

/// Ordered candidate column names per canonical field. The first candidate
/// present in a sheet wins. Defaults carry both the export-system column
/// names used by the real workbooks and plain English fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldCandidates {
    pub patient_id: Vec<String>,
    pub patient_name: Vec<String>,
    pub birthday: Vec<String>,
    pub enrollment_date: Vec<String>,
    pub age: Vec<String>,
    pub gender: Vec<String>,
    pub group_name: Vec<String>,
    pub visit_date: Vec<String>,
    pub death_date: Vec<String>,
    pub death_reason: Vec<String>,
    pub loss_to_followup: Vec<String>,
    pub loss_reason: Vec<String>,
    pub cardiovascular_event: Vec<String>,
    pub adverse_event_code: Vec<String>,
    pub coronary_intervention: Vec<String>,
    pub intervention_date: Vec<String>,
    pub coronary_ct: Vec<String>,
    pub coronary_bypass: Vec<String>,
    pub bypass_date: Vec<String>,
    pub revascularization_treatment: Vec<String>,
    pub revascularization_type: Vec<String>,
    pub revascularization_date: Vec<String>,
    pub revascularization_detail: Vec<String>,
    pub symptoms: Vec<String>,
    pub diagnosis: Vec<String>,
    /// Substrings identifying the baseline demographics sheet.
    pub basic_info_sheet: Vec<String>,
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for FieldCandidates {
    fn default() -> Self {
        Self {
            patient_id: names(&["subjid", "patient_id"]),
            patient_name: names(&["stname", "patient_name", "姓名"]),
            birthday: names(&[
                "sys_dateofbirth",
                "dateofbirth",
                "birthday",
                "birth_date",
                "出生日期",
            ]),
            enrollment_date: names(&["groupdate", "enrollment_date"]),
            age: names(&["sys_currentage", "age"]),
            gender: names(&["stsex", "gender", "性别"]),
            group_name: names(&["groupname", "group_name"]),
            visit_date: names(&["随访日期1", "visit_date"]),
            death_date: names(&["死亡时间1", "death_date"]),
            death_reason: names(&["死亡原因1", "death_reason"]),
            loss_to_followup: names(&["随访缺失1", "loss_to_followup"]),
            loss_reason: names(&["失访原因1", "loss_reason"]),
            cardiovascular_event: names(&[
                "随访期间心血管不良事件1",
                "随访期间主要心血管不良事件1",
                "cardiovascular_event",
            ]),
            adverse_event_code: names(&[
                "如有不良事件，何事件1",
                "心血管事件1",
                "adverse_event_type",
                "event_type",
            ]),
            coronary_intervention: names(&[
                "冠脉造影,冠脉CT或介入治疗1",
                "coronary_intervention",
            ]),
            intervention_date: names(&[
                "冠脉造影,冠脉CT或介入治疗时间1",
                "intervention_date",
            ]),
            coronary_ct: names(&["冠脉CT1", "coronary_ct"]),
            coronary_bypass: names(&["后续冠脉搭桥1", "coronary_bypass"]),
            bypass_date: names(&["冠脉搭桥日期1", "bypass_date"]),
            revascularization_treatment: names(&[
                "自最近一次联系后进行血运重建治疗1",
                "revascularization_treatment",
            ]),
            revascularization_type: names(&["如是，何治疗1", "revascularization_type"]),
            revascularization_date: names(&["治疗时间1", "revascularization_date"]),
            revascularization_detail: names(&["治疗详细说明", "revascularization_detail"]),
            symptoms: names(&["随访1 目前症状", "symptoms"]),
            diagnosis: names(&["随访1 目前诊断", "diagnosis"]),
            basic_info_sheet: names(&["基本信息", "basic_info", "baseline"]),
        }
    }
}

/// Explicit sheet-name fragments mapped to months since enrollment. Applied
/// before the numeric pattern so Chinese numeral forms resolve correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimePointAliases {
    pub aliases: BTreeMap<String, u32>,
}

impl Default for TimePointAliases {
    fn default() -> Self {
        Self {
            // Bare numeral keys also cover the "第一个月" style names since
            // matching is by substring.
            aliases: BTreeMap::from([
                ("一个月".to_string(), 1),
                ("三个月".to_string(), 3),
                ("六个月".to_string(), 6),
            ]),
        }
    }
}

/// How a cell that should hold a date but does not parse is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidDateHandling {
    /// Treat the field as absent and log a warning.
    Skip,
    /// Treat the field as absent silently.
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingOptions {
    pub invalid_date_handling: InvalidDateHandling,
    /// Sanity bound on days between enrollment and any event date. Events
    /// beyond it are treated as data-entry errors and dropped.
    pub max_days_from_enrollment: i64,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            invalid_date_handling: InvalidDateHandling::Skip,
            max_days_from_enrollment: 36_500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputOptions {
    pub output_dir: PathBuf,
    pub filename_prefix: String,
    /// Whether to add the long-format "Time Points" sheet next to the wide
    /// per-patient sheet.
    pub include_long_sheet: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            filename_prefix: "longitudinal".to_string(),
            include_long_sheet: true,
        }
    }
}
