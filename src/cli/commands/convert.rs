//! Convert command implementation: JSON lines or legacy-encoded CSV to UTF-8 CSV

use std::path::{Path, PathBuf};

use crate::checkpoint::file_id;
use crate::cli::error::CliError;
use crate::error::PipelineError;
use crate::segment::Segment;
use crate::sink::{OutputSink, SingleFileSink, output_file_name};
use crate::source::{self, EncodingChoice, SourceFormat, SourceOptions};

#[derive(Debug, Clone)]
pub struct ConvertArgs {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub format: SourceFormat,
    pub encoding: EncodingChoice,
    pub chunk_size: usize,
}

/// Rows and repairs for one converted file
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub output: PathBuf,
    pub rows: u64,
    pub malformed_records: u64,
    pub replacements: u64,
}

fn convert_file(
    input: &Path,
    dest: PathBuf,
    options: &SourceOptions,
) -> Result<Converted, PipelineError> {
    let mut chunks = source::open(input, options)?;
    let mut sink = SingleFileSink::new(dest.clone());
    sink.begin()?;
    let mut rows = 0;
    for segment in chunks.by_ref() {
        rows += sink.write_segment(&segment?)?;
    }
    if rows == 0 && !chunks.columns().is_empty() {
        sink.write_segment(&Segment::new(chunks.columns().to_vec()))?;
    }
    sink.finish()?;
    Ok(Converted {
        output: dest,
        rows,
        malformed_records: chunks.skipped_records(),
        replacements: chunks.decode_replacements(),
    })
}

/// Handle the convert command
pub fn handle_convert(args: &ConvertArgs) -> Result<Vec<Converted>, CliError> {
    if args.chunk_size == 0 {
        return Err(CliError::InvalidArgument("--chunk-size must be at least 1".to_string()));
    }
    let options = SourceOptions {
        chunk_size: args.chunk_size,
        format: args.format,
        encoding: args.encoding,
        ..SourceOptions::default()
    };

    let mut converted = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        if !input.is_file() {
            return Err(CliError::FileNotFound(input.clone()));
        }
        let dest = args.output_dir.join(output_file_name(input));
        if file_id(&dest) == file_id(input) {
            return Err(CliError::InvalidArgument(format!(
                "{} would overwrite its own input",
                dest.display()
            )));
        }
        let result = convert_file(input, dest, &options)?;
        println!(
            "{} -> {} ({} rows)",
            input.display(),
            result.output.display(),
            result.rows
        );
        if result.malformed_records > 0 {
            println!("  skipped {} malformed record(s)", result.malformed_records);
        }
        if result.replacements > 0 {
            println!("  replaced {} undecodable byte sequence(s)", result.replacements);
        }
        converted.push(result);
    }
    Ok(converted)
}
