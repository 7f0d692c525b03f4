use std::fs;

use followup_tools::ToolError;
use followup_tools::config::PipelineConfig;
use followup_tools::model::EventType;
use tempfile::tempdir;

#[test]
fn built_in_defaults_form_a_valid_configuration() {
    let config = PipelineConfig::default();
    config.validate().expect("default configuration valid");

    assert_eq!(config.event_for_code(1), Some(EventType::Death));
    assert_eq!(config.event_for_code(5), Some(EventType::Angina));
    assert_eq!(config.event_for_code(99), None);
    assert!(config.priority(EventType::Death) < config.priority(EventType::Hospitalization));
    assert!(config.fields.patient_id.iter().any(|name| name == "subjid"));
}

#[test]
fn yaml_file_overrides_only_the_named_sections() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("pipeline.yaml");
    fs::write(
        &path,
        "output:\n  filename_prefix: cohort\nprocessing:\n  invalid_date_handling: \"null\"\n",
    )
    .expect("config written");

    let config = PipelineConfig::from_path(&path).expect("config loaded");
    assert_eq!(config.output.filename_prefix, "cohort");
    assert!(config.output.include_long_sheet);
    assert!(config.fields.patient_id.iter().any(|name| name == "subjid"));
    assert_eq!(config.event_for_code(2), Some(EventType::Mi));
}

#[test]
fn duplicate_priorities_are_rejected() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("pipeline.yaml");
    fs::write(
        &path,
        "events:\n  death:\n    code: 1\n    priority: 1\n  mi:\n    code: 2\n    priority: 1\n",
    )
    .expect("config written");

    match PipelineConfig::from_path(&path) {
        Err(ToolError::InvalidConfig(message)) => {
            assert!(message.contains("priority"), "{message}");
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn unknown_top_level_keys_are_rejected() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("pipeline.yaml");
    fs::write(&path, "outputs:\n  filename_prefix: cohort\n").expect("config written");

    assert!(matches!(
        PipelineConfig::from_path(&path),
        Err(ToolError::Yaml(_))
    ));
}

#[test]
fn missing_configuration_file_is_reported() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("absent.yaml");
    assert!(matches!(
        PipelineConfig::from_path(&path),
        Err(ToolError::MissingInput(_))
    ));
}
