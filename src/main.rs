use anyhow::{bail, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use paper_match::config::{find_config_file, load_config, Config, ConfigFile, LOCAL_CONFIG_FILE};
use paper_match::export::{
    clean_output_directory, CsvExporter, PdfCopier, ResultExporter, SummaryCounts,
    SummaryGenerator,
};
use paper_match::matching::MatchingEngine;
use paper_match::models::MatchStats;
use paper_match::sources::{create_source, RecordFilter, RecordSource, SourceKind, SourceLocation};
use paper_match::ui::{self, Status};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Paper Match - Reconcile a folder of PDFs against bibliographic records
#[derive(Parser, Debug)]
#[command(name = "paper-match")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Match PDF files to bibliographic records by DOI and title", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

/// Where records come from
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    /// CSV file(s)
    Csv,
    /// JSON or JSON Lines document export
    Json,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Csv => SourceKind::Csv,
            SourceArg::Json => SourceKind::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match records against a PDF directory and write the result files
    #[command(alias = "r")]
    Run(RunArgs),

    /// Show how file names are classified and which keys they produce
    #[command(alias = "a")]
    Analyze {
        /// File base names (a trailing scan extension such as `.pdf` is ignored)
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a configuration file with the default settings
    Init {
        /// Where to write (default: ./paper-match.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory containing the PDF files
    #[arg(long, short = 'p')]
    pdfs_dir: PathBuf,

    /// Record source type
    #[arg(long, short, value_enum, default_value_t = SourceArg::Csv)]
    source: SourceArg,

    /// Single CSV file
    #[arg(long, conflicts_with = "csv_dir")]
    csv_file: Option<PathBuf>,

    /// Directory of CSV files (one batch per file)
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// File pattern used with --csv-dir
    #[arg(long, default_value = "*.csv")]
    csv_pattern: String,

    /// JSON or JSON Lines export file
    #[arg(long, conflicts_with = "json_dir")]
    json_file: Option<PathBuf>,

    /// Directory of JSON exports (one batch per file)
    #[arg(long)]
    json_dir: Option<PathBuf>,

    /// Field holding the title
    #[arg(long)]
    title_field: Option<String>,

    /// Field holding the DOI
    #[arg(long)]
    doi_field: Option<String>,

    /// Field holding the uuid used to name copied PDFs
    #[arg(long)]
    uuid_field: Option<String>,

    /// Only use records where FIELD equals VALUE (repeatable)
    #[arg(long, value_name = "FIELD=VALUE")]
    filter: Vec<String>,

    /// Directory for the result CSV files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Also write a timestamped log file into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Only scan the top level of the PDF directory
    #[arg(long)]
    no_recursive: bool,

    /// Copy matched PDFs into --copy-dir
    #[arg(long)]
    copy_pdfs: bool,

    /// Target directory for copied PDFs
    #[arg(long)]
    copy_dir: Option<PathBuf>,

    /// Overwrite existing copies
    #[arg(long)]
    overwrite: bool,

    /// Remove result files of a previous run first
    #[arg(long)]
    clean: bool,

    /// Skip the ALL_*.csv summaries
    #[arg(long)]
    no_summary: bool,

    /// Give up scanning the PDF directory after this many seconds
    #[arg(long, value_name = "SECS")]
    scan_timeout: Option<u64>,

    /// Evaluate records on a single thread
    #[arg(long)]
    sequential: bool,
}

impl RunArgs {
    /// Fold command-line overrides into the loaded configuration
    fn apply_to(&self, config: &mut Config) {
        if self.no_recursive {
            config.scan.recursive = false;
        }
        if let Some(secs) = self.scan_timeout {
            config.scan.timeout_seconds = secs;
        }
        if self.sequential {
            config.matching.parallel = false;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if self.no_summary {
            config.output.summary = false;
        }
        if self.copy_pdfs {
            config.copy.enabled = true;
        }
        if let Some(dir) = &self.copy_dir {
            config.copy.directory = dir.clone();
        }
        if self.overwrite {
            config.copy.overwrite = true;
        }
        if let Some(dir) = &self.log_dir {
            config.logging.directory = Some(dir.clone());
        }
        if self.title_field.is_some() {
            config.fields.title = self.title_field.clone();
        }
        if self.doi_field.is_some() {
            config.fields.doi = self.doi_field.clone();
        }
        if self.uuid_field.is_some() {
            config.fields.uuid = self.uuid_field.clone();
        }
    }

    fn location(&self) -> Result<SourceLocation> {
        let (file, dir, pattern) = match self.source {
            SourceArg::Csv => (&self.csv_file, &self.csv_dir, Some(self.csv_pattern.clone())),
            SourceArg::Json => (&self.json_file, &self.json_dir, None),
        };

        match (file, dir) {
            (Some(file), _) => Ok(SourceLocation::file(file)),
            (None, Some(dir)) => Ok(SourceLocation::dir(dir, pattern)),
            (None, None) => bail!(
                "configuration error: the {} source needs --{}-file or --{}-dir",
                SourceKind::from(self.source),
                SourceKind::from(self.source),
                SourceKind::from(self.source)
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(Commands::Run(args)) = &cli.command {
        args.apply_to(&mut config);
    }

    init_tracing(&cli, &config)?;

    match cli.command {
        Some(Commands::Run(args)) => run(&args, &config, cli.output, cli.quiet).await,
        Some(Commands::Analyze { names }) => {
            analyze(&names, &config, cli.output);
            Ok(())
        }
        Some(Commands::Config { action }) => config_command(action, &config, cli.config.as_deref()),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "paper-match",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// Console logging to stderr, plus a debug-level log file when a log
/// directory is configured.
fn init_tracing(cli: &Cli, config: &Config) -> Result<()> {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => config.logging.level.as_str(),
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let env_filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_match={}", level)),
    );

    let file_layer = match &config.logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let path = dir.join(format!(
                "match_log_{}.log",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .with(file_layer)
        .init();

    Ok(())
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if ui::is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

async fn run(args: &RunArgs, config: &Config, format: OutputFormat, quiet: bool) -> Result<()> {
    let format = resolve_format(format);
    let interactive = format == OutputFormat::Table && !quiet;

    let kind = SourceKind::from(args.source);
    let location = args.location()?;
    let filter = RecordFilter::parse(args.filter.iter().map(String::as_str))
        .context("configuration error")?;

    let mut source: Box<dyn RecordSource> =
        create_source(kind, location, Some(config.field_mapping(kind.default_mapping())))
            .context("configuration error")?;
    source.connect().context("failed to open record source")?;
    let record_sets = source
        .fetch_all(&filter)
        .context("failed to read records")?;
    source.disconnect();

    if record_sets.is_empty() {
        tracing::warn!("The record source has no inputs");
    }

    let output_dir = &config.output.directory;
    if args.clean && clean_output_directory(output_dir)? {
        tracing::info!("Cleaned previous results in {}", output_dir.display());
    }

    let engine = MatchingEngine::new()
        .with_analyzer(config.analyzer())
        .with_scanner(config.scanner())
        .parallel(config.matching.parallel);
    let exporter = CsvExporter::new(output_dir).with_bom(config.output.write_bom);

    let mut all_stats = Vec::with_capacity(record_sets.len());
    for records in &record_sets {
        let spinner = interactive.then(|| {
            ui::Spinner::new(&format!(
                "Matching {} ({} records)",
                records.source_name,
                records.len()
            ))
        });

        let batch = engine
            .match_all_with_timeout(
                &args.pdfs_dir,
                records,
                config.scan.recursive,
                config.scan_timeout(),
            )
            .await;

        if let Some(spinner) = &spinner {
            spinner.finish_with_success(&format!(
                "{}: {} matched, {} multi, {} unmatched",
                batch.source_name,
                batch.matched_count(),
                batch.multi_matched_count(),
                batch.unmatched_count()
            ));
        }

        let paths = exporter
            .export_all(&batch, &records.headers)
            .with_context(|| format!("failed to write results for {}", batch.source_name))?;
        for path in paths.written() {
            tracing::debug!("Wrote {}", path.display());
        }

        if config.copy.enabled {
            let mut copier = PdfCopier::new(&config.copy.directory);
            if interactive {
                copier = copier.with_progress(ui::copy_progress_bar());
            }
            let stats = copier
                .copy_matched(
                    &batch,
                    records.field_mapping.uuid_field(),
                    config.copy.overwrite,
                )
                .with_context(|| {
                    format!(
                        "failed to prepare copy directory {}",
                        config.copy.directory.display()
                    )
                })?;
            if interactive {
                ui::print_copy_stats(&stats);
            }
        }

        all_stats.push(batch.stats());
    }

    let summary = if config.output.summary && output_dir.is_dir() {
        Some(
            SummaryGenerator::new(output_dir)
                .with_bom(config.output.write_bom)
                .generate_all()
                .context("failed to write summary files")?,
        )
    } else {
        None
    };

    if !quiet {
        output_stats(&all_stats, summary.as_ref(), format, output_dir);
    }
    Ok(())
}

fn output_stats(
    stats: &[MatchStats],
    summary: Option<&SummaryCounts>,
    format: OutputFormat,
    output_dir: &Path,
) {
    match resolve_format(format) {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "batches": stats,
                "summary": summary,
                "output_dir": output_dir,
            });
            match serde_json::to_string_pretty(&value) {
                Ok(text) => println!("{}", text),
                Err(e) => tracing::error!("Failed to serialize results: {}", e),
            }
        }
        OutputFormat::Plain => {
            for s in stats {
                for line in ui::batch_lines(s) {
                    println!("{}", line);
                }
                println!();
            }
            if let Some(counts) = summary {
                println!(
                    "summary: matched={} unmatched={} multi_matched={}",
                    counts.matched, counts.unmatched, counts.multi_matched
                );
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            ui::print_section("Match results");
            println!("{}", ui::batch_table(stats));
            if let Some(counts) = summary {
                ui::print_summary_counts(counts);
            }
            ui::print_status(
                Status::Info,
                &format!("Results written to {}", output_dir.display()),
            );
        }
    }
}

/// `name` without a trailing `.<extension>` (case-insensitive). Dots and
/// slashes elsewhere belong to the DOI and are kept.
fn strip_scan_extension<'a>(name: &'a str, extension: &str) -> &'a str {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        return name;
    }
    let Some(split) = name.len().checked_sub(extension.len() + 1) else {
        return name;
    };
    match (name.get(..split), name.get(split..)) {
        (Some(base), Some(suffix))
            if !base.is_empty()
                && suffix.starts_with('.')
                && suffix[1..].eq_ignore_ascii_case(extension) =>
        {
            base
        }
        _ => name,
    }
}

fn analyze_names(
    names: &[String],
    config: &Config,
) -> Vec<(String, paper_match::matching::FilenameKeys)> {
    let analyzer = config.analyzer();
    names
        .iter()
        .map(|name| {
            let base = strip_scan_extension(name, &config.scan.extension);
            (base.to_string(), analyzer.analyze(base))
        })
        .collect()
}

fn analyze(names: &[String], config: &Config, format: OutputFormat) {
    let rows = analyze_names(names, config);

    match resolve_format(format) {
        OutputFormat::Json => {
            let value: Vec<serde_json::Value> = rows
                .iter()
                .map(|(name, keys)| {
                    serde_json::json!({
                        "name": name,
                        "is_doi_format": keys.is_doi_format,
                        "title_key": keys.title_key,
                        "doi_key": keys.doi_key,
                    })
                })
                .collect();
            match serde_json::to_string_pretty(&value) {
                Ok(text) => println!("{}", text),
                Err(e) => tracing::error!("Failed to serialize keys: {}", e),
            }
        }
        OutputFormat::Plain => {
            for (name, keys) in &rows {
                let kind = if keys.is_doi_format { "doi" } else { "title" };
                println!("{}\t{}\t{}\t{}", name, kind, keys.title_key, keys.doi_key);
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Format", "Title key", "DOI key"]);
            for (name, keys) in &rows {
                table.add_row(vec![
                    Cell::new(name).add_attribute(Attribute::Bold),
                    Cell::new(if keys.is_doi_format { "DOI" } else { "Title" }),
                    Cell::new(&keys.title_key),
                    Cell::new(&keys.doi_key),
                ]);
            }
            println!("{table}");
        }
    }
}

fn config_command(action: ConfigAction, config: &Config, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Init { path, force } => {
            let file = ConfigFile::new(path.unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE)));
            file.save(&Config::default(), force)?;
            ui::print_status(
                Status::Success,
                &format!("Wrote {}", file.path().display()),
            );
        }
        ConfigAction::Show => {
            match explicit.map(Path::to_path_buf).or_else(find_config_file) {
                Some(path) => eprintln!("# config file: {}", path.display()),
                None => eprintln!("# no config file found, showing defaults"),
            }
            print!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}
