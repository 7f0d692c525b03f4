use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::PipelineConfig;
use crate::error::{Result, ToolError};
use crate::events::EventProcessor;
use crate::import::LongitudinalImporter;
use crate::io::{excel_read, excel_write, survival};
use crate::model::{Endpoint, SurvivalRow};
use crate::tabulate;

/// Inputs of one processing run.
pub struct RunOptions {
    pub input: PathBuf,
    pub endpoint: Endpoint,
    pub config: PipelineConfig,
    /// Cohort label used in output filenames; detected from the input
    /// filename when absent.
    pub group_label: Option<String>,
    /// Suppress the long-format sheet regardless of configuration.
    pub wide_only: bool,
}

/// What a run produced, also written as the JSON summary file.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total_patients: usize,
    pub patients_with_events: usize,
    pub skipped_patients: usize,
    pub invalid_dates: usize,
    pub ignored_sheets: Vec<String>,
    /// First-event type → patient count; censored patients under "no_event".
    pub event_distribution: BTreeMap<String, usize>,
    pub endpoint: Endpoint,
    pub workbook_path: PathBuf,
    pub survival_path: PathBuf,
    pub summary_path: PathBuf,
}

/// Cohort label detected from the input filename, mirroring the study's
/// file-naming convention (PSM exports hold CAG patients).
pub fn detect_group_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_default();
    if stem.contains("PCI") {
        "pci".to_string()
    } else if stem.contains("CAG") || stem.contains("PSM") {
        "cag".to_string()
    } else {
        "patients".to_string()
    }
}

/// Runs the full pipeline: load workbook → merge longitudinal records →
/// classify events → export wide/long Excel, survival CSV, and JSON summary.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %options.input.display(), endpoint = %options.endpoint)
)]
pub fn run(options: &RunOptions) -> Result<RunSummary> {
    if !options.input.exists() {
        return Err(ToolError::MissingInput(options.input.clone()));
    }

    let sheets = excel_read::read_workbook(&options.input)?;
    info!(sheets = sheets.len(), "workbook loaded");

    let importer = LongitudinalImporter::new(&options.config)?;
    let outcome = importer.import(&sheets)?;

    let processor = EventProcessor::new(&options.config, options.endpoint);
    let records = processor.process_batch(&outcome.patients);

    let mut event_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for record in &records {
        let key = record
            .first_event_type
            .map(|event_type| event_type.as_str().to_string())
            .unwrap_or_else(|| "no_event".to_string());
        *event_distribution.entry(key).or_insert(0) += 1;
    }

    let output_dir = &options.config.output.output_dir;
    fs::create_dir_all(output_dir)?;
    let group = options
        .group_label
        .clone()
        .unwrap_or_else(|| detect_group_label(&options.input));
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let prefix = &options.config.output.filename_prefix;
    let workbook_path = output_dir.join(format!("{prefix}_{group}_output_{timestamp}.xlsx"));
    let survival_path = output_dir.join(format!("survival_{group}_{timestamp}.csv"));
    let summary_path = output_dir.join(format!("summary_{group}_{timestamp}.json"));

    let include_long_sheet = options.config.output.include_long_sheet && !options.wide_only;
    let workbook = tabulate::build_output_workbook(&records, &outcome.patients, include_long_sheet);
    debug!(sheet_count = workbook.tables.len(), "output workbook constructed");
    excel_write::write_workbook(&workbook_path, &workbook)?;

    let survival_rows: Vec<SurvivalRow> = records.iter().map(SurvivalRow::from_followup).collect();
    survival::write_survival_csv(&survival_path, &survival_rows)?;

    let summary = RunSummary {
        total_patients: records.len(),
        patients_with_events: records
            .iter()
            .filter(|record| record.first_event_type.is_some())
            .count(),
        skipped_patients: outcome.stats.skipped_patients,
        invalid_dates: outcome.stats.invalid_dates,
        ignored_sheets: outcome.stats.ignored_sheets.clone(),
        event_distribution,
        endpoint: options.endpoint,
        workbook_path,
        survival_path,
        summary_path: summary_path.clone(),
    };
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;

    info!(
        patients = summary.total_patients,
        with_events = summary.patients_with_events,
        skipped = summary.skipped_patients,
        "run complete"
    );
    Ok(summary)
}
