use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eodb::config::{Config, MapBackend, DEFAULT_BATCH_SIZE};
use eodb::error::{Error, ReturnCode};
use eodb::index::{IndexName, IndexType};
use eodb::osm::ObjectId;
use eodb::pipeline::{self, OutputFormat, WriteMode};
use eodb::tools::{self, Target};
use eodb::utils::DEFAULT_DATABASE;
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "eodb")]
#[command(about = "Experimental on-disk database for OSM objects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database directory
    #[arg(short, long, global = true, default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Hide progress spinners
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import input files into a new database
    Create {
        /// Input files (`.osr` raw records or OPL, `-` for stdin)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Offset index type
        #[arg(short, long, default_value_t = IndexType::default())]
        index: IndexType,

        /// Also build a location index of this type
        #[arg(short, long)]
        location: Option<IndexType>,

        /// Build relation maps (sorted pair files or external store)
        #[arg(short, long, default_value_t = MapBackend::None)]
        maps: MapBackend,

        /// Entities per batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Append input files to an existing dense database
    Update {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Write a range of the log as raw records or OPL
    Export {
        /// Output file, `-` for stdout
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format (default: from the output file extension)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Byte offset of the first record
        #[arg(short = 'O', long, default_value_t = 0)]
        offset: u64,

        /// Number of records, 0 for all
        #[arg(short, long, default_value_t = 0)]
        count: usize,
    },
    /// Convert input files into a raw record file or OPL
    Convert {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Output format (default: from the output file extension)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Replace an existing output file
        #[arg(short = 'O', long)]
        overwrite: bool,

        /// Append to an existing output file
        #[arg(short, long)]
        append: bool,

        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Print every entry of an index or map
    Dump {
        /// Index: nodes, ways, relations, locations (n, w, r, l)
        #[arg(short, long)]
        index: Option<String>,

        /// Map: node2way, node2relation, way2relation, relation2relation (n2w, n2r, w2r, r2r)
        #[arg(short, long)]
        map: Option<String>,
    },
    /// Look up ids in an index or map
    Lookup {
        #[arg(short, long)]
        index: Option<String>,

        #[arg(short, long)]
        map: Option<String>,

        /// Print every stored value of an id, not only the last one
        #[arg(short, long)]
        all: bool,

        #[arg(required = true)]
        ids: Vec<ObjectId>,
    },
    /// Node location cache
    Locations {
        #[command(subcommand)]
        action: LocationsAction,
    },
    /// Show database statistics
    Stats,
}

#[derive(Subcommand)]
enum LocationsAction {
    /// Rebuild the cache from the log
    Create {
        /// dense or sparse
        #[arg(short = 't', long, default_value = "sparse")]
        index_type: IndexType,
    },
    /// Print every cached location
    Dump,
    /// Look up node locations
    Lookup {
        #[arg(required = true)]
        ids: Vec<ObjectId>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ReturnCode::Fatal
            } else {
                ReturnCode::Okay
            };
            std::process::exit(code.code());
        }
    };

    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            error_code(&err)
        }
    };
    std::process::exit(code.code());
}

/// `RUST_LOG` wins over `-v`
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "eodb=info",
        2 => "eodb=debug",
        _ => "eodb=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Exit code of the first library error in the chain, `Fatal` otherwise
fn error_code(err: &anyhow::Error) -> ReturnCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(Error::return_code)
        .unwrap_or(ReturnCode::Fatal)
}

fn run(cli: Cli) -> Result<ReturnCode> {
    let database = cli.database;
    let progress = !cli.quiet && io::stderr().is_terminal();
    let color = io::stdout().is_terminal();

    match cli.command {
        Commands::Create {
            inputs,
            index,
            location,
            maps,
            batch_size,
        } => {
            let config = Config::new(&database)
                .with_index_type(index)
                .with_location_type(location)
                .with_maps(maps)
                .with_batch_size(batch_size)
                .with_progress(progress);
            let meta = pipeline::run_import(&config, &inputs)
                .with_context(|| format!("Import into '{}' failed", database.display()))?;
            println!(
                "Imported {} nodes, {} ways, {} relations into {}",
                meta.counts.nodes,
                meta.counts.ways,
                meta.counts.relations,
                database.display()
            );
        }
        Commands::Update { inputs, batch_size } => {
            let config = Config::new(&database)
                .with_batch_size(batch_size)
                .with_progress(progress);
            let meta = pipeline::run_update(&config, &inputs)
                .with_context(|| format!("Update of '{}' failed", database.display()))?;
            println!(
                "Database {} now holds {} objects",
                database.display(),
                meta.counts.total()
            );
        }
        Commands::Export {
            output,
            format,
            offset,
            count,
        } => {
            let format = format.unwrap_or_else(|| OutputFormat::detect(&output));
            let written = export(&database, &output, offset, count, format)?;
            tracing::info!(records = written, "export finished");
        }
        Commands::Convert {
            inputs,
            output,
            format,
            overwrite,
            append,
            batch_size,
        } => {
            let mode = WriteMode::from_flags(overwrite, append)?;
            let format = format.unwrap_or_else(|| OutputFormat::detect(&output));
            let entities = pipeline::convert(&inputs, &output, format, mode, batch_size)
                .with_context(|| format!("Conversion to '{}' failed", output.display()))?;
            println!("Wrote {} objects to {}", entities, output.display());
        }
        Commands::Dump { index, map } => {
            let target = Target::from_names(index.as_deref(), map.as_deref())?;
            let mut out = eodb::output::stdout(color);
            tools::dump(&database, target, &mut out)?;
        }
        Commands::Lookup {
            index,
            map,
            all,
            ids,
        } => {
            let target = Target::from_names(index.as_deref(), map.as_deref())?;
            let mut out = eodb::output::stdout(color);
            return tools::lookup(&database, target, &ids, all, &mut out);
        }
        Commands::Locations { action } => {
            let target = Target::Index(IndexName::Locations);
            match action {
                LocationsAction::Create { index_type } => {
                    let nodes = pipeline::rebuild_locations(&database, index_type.is_dense(), progress)
                        .with_context(|| format!("Location cache of '{}' failed", database.display()))?;
                    println!("Cached {} node locations", nodes);
                }
                LocationsAction::Dump => {
                    let mut out = eodb::output::stdout(color);
                    tools::dump(&database, target, &mut out)?;
                }
                LocationsAction::Lookup { ids } => {
                    let mut out = eodb::output::stdout(color);
                    return tools::lookup(&database, target, &ids, false, &mut out);
                }
            }
        }
        Commands::Stats => {
            let mut out = eodb::output::stdout(color);
            tools::show_stats(&database, &mut out)?;
        }
    }

    Ok(ReturnCode::Okay)
}

fn export(database: &Path, output: &Path, offset: u64, count: usize, format: OutputFormat) -> Result<usize> {
    let mut out: Box<dyn Write> = if output == Path::new("-") {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let file = File::create(output)
            .with_context(|| format!("Failed to create output file '{}'", output.display()))?;
        Box::new(BufWriter::new(file))
    };
    let written = pipeline::export_range(database, offset, count, format, out.as_mut())
        .with_context(|| format!("Export from '{}' failed", database.display()))?;
    Ok(written)
}
