use std::fs;
use std::io::{self, BufWriter, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use prost::Message;
use prost_reflect::DynamicMessage;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use pbline::config::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_ERROR_RATIO, DEFAULT_MIN_ERRORS};
use pbline::output::{BatchWriter, ParquetBatchWriter};
use pbline::protobuf::B64LineWriter;
use pbline::{
    B64LineLoader, ProjectionSpec, RecordType, ScanOptions, TextLineSource, TupleProjector,
    TypeRegistry,
};

/// Check if an error is a broken pipe (EPIPE).
/// This happens when piping to commands like `head` that close early.
fn is_broken_pipe(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Load and project base64 line-encoded protobuf records
#[derive(Parser, Debug)]
#[command(name = "pbline", version, about)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the Arrow schema of a record type
    Schema(SchemaArgs),

    /// Decode line files into tuples or Parquet
    Scan(ScanArgs),

    /// Convert a length-delimited binary protobuf stream into base64 lines
    Encode(EncodeArgs),
}

#[derive(Args, Debug)]
struct TypeArgs {
    /// Serialized FileDescriptorSet (protoc --descriptor_set_out --include_imports)
    #[arg(short, long)]
    descriptor_set: PathBuf,

    /// Record type, fully-qualified or unique short name
    #[arg(short = 't', long = "type")]
    record_type: String,
}

impl TypeArgs {
    fn resolve(&self) -> Result<RecordType, Box<dyn std::error::Error>> {
        let data = fs::read(&self.descriptor_set)?;
        let registry = TypeRegistry::from_descriptor_set(&data)?;
        Ok(registry.resolve(&self.record_type)?)
    }
}

#[derive(Args, Debug)]
struct SchemaArgs {
    #[command(flatten)]
    types: TypeArgs,

    /// Comma-separated field paths; prints the projected schema
    #[arg(short, long, value_delimiter = ',')]
    fields: Vec<String>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    types: TypeArgs,

    /// Input line files
    #[arg(required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Comma-separated field paths (default: whole record)
    #[arg(short, long, value_delimiter = ',')]
    fields: Vec<String>,

    /// Parquet output file (default: tuples as text on stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum ratio of malformed lines per file
    #[arg(long, default_value_t = DEFAULT_MAX_ERROR_RATIO)]
    max_error_ratio: f64,

    /// Malformed lines tolerated before the ratio is enforced
    #[arg(long, default_value_t = DEFAULT_MIN_ERRORS)]
    min_errors: u64,

    /// Rows per Parquet batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

impl ScanArgs {
    fn options(&self) -> ScanOptions {
        ScanOptions::tolerant(self.max_error_ratio)
            .with_min_errors(self.min_errors)
            .with_batch_size(self.batch_size)
    }
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    types: TypeArgs,

    /// Length-delimited binary input (default: stdin)
    input: Option<PathBuf>,

    /// Output line file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn setup_logger(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = if verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            };
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy()
        }
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logger(cli.verbose);

    let result = match cli.command {
        Commands::Schema(args) => run_schema(args),
        Commands::Scan(args) => run_scan(args),
        Commands::Encode(args) => run_encode(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_broken_pipe(e.as_ref()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_schema(args: SchemaArgs) -> Result<(), Box<dyn std::error::Error>> {
    let record_type = args.types.resolve()?;
    let schema = if args.fields.is_empty() {
        pbline::translate(&record_type)?
    } else {
        let spec = ProjectionSpec::parse(&args.fields)?;
        TupleProjector::new(&record_type, &spec)?.schema()?
    };

    let mut out = io::stdout().lock();
    for field in schema.fields() {
        let nullable = if field.is_nullable() { "" } else { " not null" };
        writeln!(out, "{}: {}{}", field.name(), field.data_type(), nullable)?;
    }
    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.options();
    options.validate()?;
    let record_type = args.types.resolve()?;
    let spec = ProjectionSpec::parse(&args.fields)?;

    let mut parquet = match &args.output {
        Some(path) => {
            let projector = TupleProjector::new(&record_type, &spec)?;
            let schema = Arc::new(projector.schema()?);
            Some(Box::new(ParquetBatchWriter::create(path, schema)?))
        }
        None => None,
    };
    let mut stdout = BufWriter::new(io::stdout().lock());

    let mut total = 0u64;
    for path in &args.input {
        let source = TextLineSource::open(path, &options)?;
        let mut loader = B64LineLoader::new(record_type.clone(), source);
        loader.push_projection(spec.clone())?;

        match parquet.as_mut() {
            Some(writer) => {
                while let Some(batch) = loader.next_batch(options.batch_size)? {
                    writer.write_batch(&batch)?;
                }
            }
            None => {
                for tuple in loader.by_ref() {
                    writeln!(stdout, "{}", tuple?)?;
                }
            }
        }

        let stats = loader.stats();
        total += stats.decoded();
        info!(
            path = %path.display(),
            lines = stats.lines,
            skipped = stats.skipped,
            "scanned file"
        );
    }
    stdout.flush()?;

    if let Some(writer) = parquet {
        writer.finish()?;
    }
    info!(files = args.input.len(), records = total, "scan complete");
    Ok(())
}

fn read_input(path: Option<&Path>) -> io::Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path),
        None => {
            let mut data = Vec::new();
            io::stdin().lock().read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

fn run_encode(args: EncodeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let record_type = args.types.resolve()?;
    let data = read_input(args.input.as_deref())?;

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(fs::File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut writer = B64LineWriter::new(out, record_type.clone());

    let mut buf = data.as_slice();
    while !buf.is_empty() {
        let mut message = DynamicMessage::new(record_type.descriptor().clone());
        message.merge_length_delimited(&mut buf)?;
        writer.write(&message)?;
    }

    let written = writer.records_written();
    writer.finish()?.flush()?;
    info!(records = written, "encode complete");
    Ok(())
}
