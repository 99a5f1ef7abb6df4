//! Run command tests

use std::fs;
use std::path::Path;

use tabflow::cli::commands::run::{ResumeChoice, RunArgs, handle_run};
use tabflow::cli::error::CliError;
use tempfile::TempDir;

const JOB: &str = r#"
name = "cli-run"

[output]
mode = "split_column"
column = "team"

[[steps]]
kind = "drop_columns"
columns = ["secret"]
"#;

fn setup(root: &Path) -> std::path::PathBuf {
    let config = root.join("tabflow.toml");
    fs::write(&config, JOB).unwrap();
    fs::create_dir_all(root.join("input")).unwrap();
    fs::write(root.join("input/a.csv"), "id,team,secret\n1,red,x\n2,blue,y\n").unwrap();
    fs::write(root.join("input/b.csv"), "id,team,secret\n3,red,z\n").unwrap();
    config
}

fn args(config: &Path, resume: ResumeChoice) -> RunArgs {
    RunArgs {
        config: config.to_path_buf(),
        resume,
        progress: false,
        log_level: "info".to_string(),
        log_file: true,
    }
}

#[test]
fn test_cli_run_processes_and_logs() {
    let root = TempDir::new().unwrap();
    let config = setup(root.path());

    let summary = handle_run(&args(&config, ResumeChoice::Resume)).unwrap();
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(
        fs::read_to_string(root.path().join("output/red/a.csv")).unwrap(),
        "id,team\n1,red\n"
    );
    assert_eq!(
        fs::read_to_string(root.path().join("output/red/b.csv")).unwrap(),
        "id,team\n3,red\n"
    );

    let log = fs::read_to_string(root.path().join(".tabflow/logs/cli-run.log")).unwrap();
    assert!(log.contains("File complete"));
    assert!(log.contains("Run finished"));
}

#[test]
fn test_cli_run_resume_and_fresh() {
    let root = TempDir::new().unwrap();
    let config = setup(root.path());
    handle_run(&args(&config, ResumeChoice::Resume)).unwrap();

    let resumed = handle_run(&args(&config, ResumeChoice::Resume)).unwrap();
    assert_eq!(resumed.files_skipped, 2);
    assert_eq!(resumed.files_processed, 0);

    let fresh = handle_run(&args(&config, ResumeChoice::Fresh)).unwrap();
    assert_eq!(fresh.files_skipped, 0);
    assert_eq!(fresh.files_processed, 2);
    // Reprocessing replaces rather than appends
    assert_eq!(
        fs::read_to_string(root.path().join("output/red/a.csv")).unwrap(),
        "id,team\n1,red\n"
    );
}

#[test]
fn test_cli_run_reports_failed_files() {
    let root = TempDir::new().unwrap();
    let config = setup(root.path());
    fs::write(root.path().join("input/c.csv"), "id\n4\n").unwrap();

    let summary = handle_run(&args(&config, ResumeChoice::Resume)).unwrap();
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_failed, 1);
    assert!(summary.errors[0].contains("team"));
}

#[test]
fn test_cli_run_missing_config() {
    let root = TempDir::new().unwrap();
    let result = handle_run(&args(&root.path().join("nope.toml"), ResumeChoice::Ask));
    assert!(matches!(result, Err(CliError::FileNotFound(_))));
}
