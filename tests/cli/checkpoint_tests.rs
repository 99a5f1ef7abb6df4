//! Init, status and reset command tests

use std::fs;

use tabflow::cli::commands::checkpoint::{handle_init, handle_reset, handle_status};
use tabflow::cli::commands::run::{ResumeChoice, RunArgs, handle_run};
use tabflow::cli::error::CliError;
use tabflow::config::JobConfig;
use tempfile::TempDir;

#[test]
fn test_cli_init_writes_sample_once() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("jobs/tabflow.toml");

    handle_init(&path, false).unwrap();
    let config = JobConfig::load(&path).unwrap();
    assert_eq!(config.name, "people");

    assert!(matches!(
        handle_init(&path, false),
        Err(CliError::AlreadyExists(_))
    ));
    handle_init(&path, true).unwrap();
}

#[test]
fn test_cli_status_and_reset() {
    let root = TempDir::new().unwrap();
    let config = root.path().join("tabflow.toml");
    fs::write(&config, "name = \"status\"\n").unwrap();
    fs::create_dir_all(root.path().join("input")).unwrap();
    fs::write(root.path().join("input/a.csv"), "id\n1\n").unwrap();

    let status = handle_status(&config).unwrap();
    assert!(status.completed.is_empty());
    assert_eq!(status.pending.len(), 1);

    handle_run(&RunArgs {
        config: config.clone(),
        resume: ResumeChoice::Resume,
        progress: false,
        log_level: "warn".to_string(),
        log_file: false,
    })
    .unwrap();
    fs::write(root.path().join("input/b.csv"), "id\n2\n").unwrap();

    let status = handle_status(&config).unwrap();
    assert_eq!(status.completed.len(), 1);
    assert!(status.completed[0].ends_with("a.csv"));
    assert_eq!(status.pending, vec![root.path().join("input/b.csv")]);

    assert!(handle_reset(&config, true).unwrap());
    assert!(!status.checkpoint.exists());
    assert_eq!(handle_status(&config).unwrap().pending.len(), 2);
    assert!(!handle_reset(&config, true).unwrap());
}
