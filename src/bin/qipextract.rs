use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use qipextract::{logging, ExtractionSchema, ExtractorBuilder, ProgressEvent, QipExtractError, RunResult};

#[derive(Parser)]
#[command(
    name = "qipextract",
    version,
    about = "Extract injection-molding QC measurements from QIP workbooks."
)]
struct Args {
    /// Cavity group schema (JSON, `cavityGroups` keyed "1".."6").
    #[arg(long, value_name = "SCHEMA")]
    config: PathBuf,

    /// Input workbooks, processed in the given order.
    #[arg(required = true, value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Write the result to a file instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print one table per inspection item instead of the JSON result.
    #[arg(long)]
    export: bool,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(if args.verbose { "debug" } else { logging::DEFAULT_LEVEL });

    match run(&args) {
        Ok(result) if result.has_errors => {
            tracing::warn!(
                errors = result.errors.error_count(),
                "extraction finished with page errors"
            );
            ExitCode::SUCCESS
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunResult, QipExtractError> {
    let schema = ExtractionSchema::from_json_reader(File::open(&args.config)?)?;

    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let listener = thread::spawn(move || {
        for event in rx {
            tracing::info!(
                phase = ?event.phase,
                file = event.current_file,
                files = event.total_files,
                "{:>3}% {}",
                event.percent,
                event.message
            );
        }
    });

    let extractor = ExtractorBuilder::new()
        .with_schema(schema)
        .with_progress(tx)
        .build()?;
    let result = extractor.run_paths(&args.inputs);
    drop(extractor);
    let _ = listener.join();
    let result = result?;

    for record in result.errors.errors() {
        tracing::warn!(sheet = %record.sheet_name, kind = record.error_type.label(), "{}", record.error_message);
    }

    match &args.output {
        Some(path) => write_result(&result, args.export, BufWriter::new(File::create(path)?))?,
        None => write_result(&result, args.export, std::io::stdout().lock())?,
    }
    Ok(result)
}

fn write_result<W: Write>(result: &RunResult, export: bool, mut writer: W) -> Result<(), QipExtractError> {
    if export {
        result.render_export_markdown(&mut writer)?;
    } else {
        writeln!(writer, "{}", result.to_json_pretty()?)?;
        writer.flush()?;
    }
    Ok(())
}
