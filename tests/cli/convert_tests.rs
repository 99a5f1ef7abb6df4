//! Convert and count command tests

use std::fs;

use tabflow::cli::commands::convert::{ConvertArgs, handle_convert};
use tabflow::cli::commands::count::handle_count;
use tabflow::cli::error::CliError;
use tabflow::source::{EncodingChoice, SourceFormat};
use tempfile::TempDir;

fn args(inputs: Vec<std::path::PathBuf>, output_dir: std::path::PathBuf) -> ConvertArgs {
    ConvertArgs {
        inputs,
        output_dir,
        format: SourceFormat::Auto,
        encoding: EncodingChoice::Auto,
        chunk_size: 2,
    }
}

#[test]
fn test_cli_convert_json_lines_and_legacy_csv() {
    let root = TempDir::new().unwrap();
    let jsonl = root.path().join("events.jsonl");
    let legacy = root.path().join("legacy.csv");
    fs::write(
        &jsonl,
        "{\"id\":1,\"who\":{\"name\":\"a\"}}\n{\"id\":2}\n{broken\n{\"id\":3,\"who\":{\"name\":\"c\"}}\n",
    )
    .unwrap();
    fs::write(&legacy, b"city\nM\xfcnchen\n").unwrap();
    let out = root.path().join("out");

    let converted = handle_convert(&args(vec![jsonl, legacy], out.clone())).unwrap();
    assert_eq!(converted.len(), 2);
    assert_eq!(converted[0].rows, 3);
    assert_eq!(converted[0].malformed_records, 1);
    assert_eq!(
        fs::read_to_string(out.join("events.csv")).unwrap(),
        "id,who.name\n1,a\n2,\n3,c\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("legacy.csv")).unwrap(),
        "city\nMünchen\n"
    );
}

#[test]
fn test_cli_convert_refuses_to_overwrite_input() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("a.csv");
    fs::write(&input, "id\n1\n").unwrap();

    let result = handle_convert(&args(vec![input.clone()], root.path().to_path_buf()));
    assert!(matches!(result, Err(CliError::InvalidArgument(_))));

    // Same file reached through a different spelling of the directory
    fs::create_dir(root.path().join("sub")).unwrap();
    let roundabout = root.path().join("sub").join("..");
    let result = handle_convert(&args(vec![input.clone()], roundabout));
    assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    assert_eq!(fs::read_to_string(&input).unwrap(), "id\n1\n");

    let missing = handle_convert(&args(vec![root.path().join("nope.csv")], root.path().join("out")));
    assert!(matches!(missing, Err(CliError::FileNotFound(_))));
}

#[test]
fn test_cli_count() {
    let root = TempDir::new().unwrap();
    let csv = root.path().join("rows.csv");
    fs::write(&csv, "id,note\n1,\"two\nlines\"\n2,x\n").unwrap();
    assert_eq!(
        handle_count(&csv, SourceFormat::Auto, EncodingChoice::Auto).unwrap(),
        2
    );

    let jsonl = root.path().join("rows.jsonl");
    fs::write(&jsonl, "{}\n\n{}\n{}\n").unwrap();
    assert_eq!(
        handle_count(&jsonl, SourceFormat::Auto, EncodingChoice::Auto).unwrap(),
        3
    );
}
