//! Combine command tests

use std::fs;

use tabflow::cli::commands::combine::{CombineArgs, handle_combine};
use tabflow::cli::commands::run::ResumeChoice;
use tabflow::source::EncodingChoice;
use tempfile::TempDir;

fn args(root: &std::path::Path, resume: ResumeChoice) -> CombineArgs {
    CombineArgs {
        input_dir: root.join("in"),
        output_dir: root.join("out"),
        name: "combine".to_string(),
        state_dir: None,
        encoding: EncodingChoice::Auto,
        resume,
        log_level: "warn".to_string(),
    }
}

#[test]
fn test_cli_combine_each_directory_once() {
    let root = TempDir::new().unwrap();
    let jan = root.path().join("in/jan");
    let feb = root.path().join("in/feb");
    fs::create_dir_all(&jan).unwrap();
    fs::create_dir_all(&feb).unwrap();
    fs::write(jan.join("1.csv"), "id,amount\n1,10\n").unwrap();
    fs::write(jan.join("2.csv"), "amount,id,extra\n20,2,z\n").unwrap();
    fs::write(feb.join("1.csv"), "id,amount\n3,30\n").unwrap();

    let summary = handle_combine(&args(root.path(), ResumeChoice::Resume)).unwrap();
    assert_eq!(summary.files_processed, 2);
    assert_eq!(
        fs::read_to_string(root.path().join("out/jan.csv")).unwrap(),
        "id,amount\n1,10\n2,20\n"
    );
    assert_eq!(
        fs::read_to_string(root.path().join("out/feb.csv")).unwrap(),
        "id,amount\n3,30\n"
    );
    // The checkpoint lives in in/.tabflow and is not itself combined
    assert!(root.path().join("in/.tabflow/combine.checkpoint.json").exists());

    let again = handle_combine(&args(root.path(), ResumeChoice::Resume)).unwrap();
    assert_eq!(again.files_skipped, 2);
    assert_eq!(again.files_processed, 0);
}

#[test]
fn test_cli_combine_empty_directory_fails_alone() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("in/empty")).unwrap();
    fs::create_dir_all(root.path().join("in/full")).unwrap();
    fs::write(root.path().join("in/full/a.csv"), "id\n1\n").unwrap();

    let summary = handle_combine(&args(root.path(), ResumeChoice::Fresh)).unwrap();
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.files_processed, 1);
    assert!(root.path().join("out/full.csv").exists());
}
