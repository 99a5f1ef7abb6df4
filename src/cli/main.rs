//! CLI binary entry point for tabflow

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tabflow::cli::commands::checkpoint::{handle_init, handle_reset, handle_status};
#[cfg(feature = "cli")]
use tabflow::cli::commands::combine::{CombineArgs, handle_combine};
#[cfg(feature = "cli")]
use tabflow::cli::commands::convert::{ConvertArgs, handle_convert};
#[cfg(feature = "cli")]
use tabflow::cli::commands::count::handle_count;
#[cfg(feature = "cli")]
use tabflow::cli::commands::run::{ResumeChoice, RunArgs, handle_run};
#[cfg(feature = "cli")]
use tabflow::cli::error::CliError;
#[cfg(feature = "cli")]
use tabflow::config::CONFIG_FILENAME;
#[cfg(feature = "cli")]
use tabflow::source::{DEFAULT_CHUNK_SIZE, EncodingChoice, SourceFormat};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Resumable batch transformations for large CSV and JSON-lines files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run a job over every pending input file
    Run {
        /// Job file
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
        /// Keep completion records from an earlier run without asking
        #[arg(long, conflicts_with = "fresh")]
        resume: bool,
        /// Discard completion records from an earlier run without asking
        #[arg(long)]
        fresh: bool,
        /// Do not draw progress bars
        #[arg(long)]
        no_progress: bool,
        /// Log level when RUST_LOG is unset
        #[arg(long, default_value = "info")]
        log_level: String,
        /// Log to the console only
        #[arg(long)]
        no_log_file: bool,
    },
    /// Write a sample job file
    Init {
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List completed and pending inputs of a job
    Status {
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
    },
    /// Forget every completion record of a job
    Reset {
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Count data records in a file without loading it
    Count {
        file: PathBuf,
        /// auto, csv or json
        #[arg(long, default_value = "auto")]
        format: SourceFormat,
        /// auto or an encoding label such as windows-1252
        #[arg(long, default_value = "auto")]
        encoding: EncodingChoice,
    },
    /// Convert JSON-lines or legacy-encoded CSV files to UTF-8 CSV
    Convert {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "auto")]
        format: SourceFormat,
        #[arg(long, default_value = "auto")]
        encoding: EncodingChoice,
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Concatenate the CSV files of each sub-directory into one file per directory
    Combine {
        input_dir: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Checkpoint name
        #[arg(long, default_value = "combine")]
        name: String,
        /// Checkpoint directory (default: <INPUT_DIR>/.tabflow)
        #[arg(long)]
        state_dir: Option<PathBuf>,
        #[arg(long, default_value = "auto")]
        encoding: EncodingChoice,
        #[arg(long, conflicts_with = "fresh")]
        resume: bool,
        #[arg(long)]
        fresh: bool,
        #[arg(long, default_value = "info")]
        log_level: String,
    },
}

#[cfg(feature = "cli")]
fn resume_choice(resume: bool, fresh: bool) -> ResumeChoice {
    match (resume, fresh) {
        (true, _) => ResumeChoice::Resume,
        (_, true) => ResumeChoice::Fresh,
        _ => ResumeChoice::Ask,
    }
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Run {
            config,
            resume,
            fresh,
            no_progress,
            log_level,
            no_log_file,
        } => {
            let args = RunArgs {
                config,
                resume: resume_choice(resume, fresh),
                progress: !no_progress,
                log_level,
                log_file: !no_log_file,
            };
            handle_run(&args).and_then(|summary| {
                if summary.is_success() {
                    Ok(())
                } else {
                    Err(CliError::RunFailed(summary.files_failed))
                }
            })
        }
        Commands::Init { config, force } => handle_init(&config, force),
        Commands::Status { config } => handle_status(&config).map(|_| ()),
        Commands::Reset { config, yes } => handle_reset(&config, yes).map(|_| ()),
        Commands::Count {
            file,
            format,
            encoding,
        } => handle_count(&file, format, encoding).map(|_| ()),
        Commands::Convert {
            inputs,
            output,
            format,
            encoding,
            chunk_size,
        } => {
            let args = ConvertArgs {
                inputs,
                output_dir: output,
                format,
                encoding,
                chunk_size,
            };
            handle_convert(&args).map(|_| ())
        }
        Commands::Combine {
            input_dir,
            output,
            name,
            state_dir,
            encoding,
            resume,
            fresh,
            log_level,
        } => {
            let args = CombineArgs {
                input_dir,
                output_dir: output,
                name,
                state_dir,
                encoding,
                resume: resume_choice(resume, fresh),
                log_level,
            };
            handle_combine(&args).and_then(|summary| {
                if summary.is_success() {
                    Ok(())
                } else {
                    Err(CliError::RunFailed(summary.files_failed))
                }
            })
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
