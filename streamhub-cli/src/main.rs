use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use streamhub_common::Config;
use streamhub_core::{
    describe, resolve_inputs, Augmenter, FieldSchema, FilterStats, NodeRef, Outcome, Record,
    StreamFilter, StreamQuery,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "streamhub", version, about = "SQL-like filter for JSON record streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a filter and print its tree
    Check {
        filter: String,
        /// treat FILTER as a bare condition instead of a SELECT statement
        #[arg(long)] condition: bool,
    },
    /// Evaluate a filter against a single JSON record
    Eval {
        filter: String,
        #[arg(long)] record: String,
        #[arg(long)] condition: bool,
        #[arg(long)] no_augment: bool,
    },
    /// Filter NDJSON records from files or stdin, writing accepted records to stdout
    Run {
        /// defaults to [stream].filter_logic / FILTER_LOGIC
        #[arg(long)] filter: Option<String>,
        /// file, directory or glob; stdin when absent
        #[arg(long)] input: Option<String>,
        #[arg(long)] stats: bool,
        #[arg(long)] no_augment: bool,
    },
    /// Show the effective configuration
    Config { #[arg(long)] init: bool },
}

/// RUST_LOG wins over the configured level; logs go to stderr so stdout stays NDJSON
fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(level).with_context(|| format!("invalid log level filter: {level}"))?
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_tracing(&config.logging.level)?;
    match cli.command {
        Commands::Check { filter, condition } => run_check(&filter, condition, &config.fields)?,
        Commands::Eval { filter, record, condition, no_augment } => {
            run_eval(&filter, &record, condition, no_augment, &config)?
        }
        Commands::Run { filter, input, stats, no_augment } => {
            run_stream(filter, input, stats, no_augment, &config).await?
        }
        Commands::Config { init } => run_config(init, &config)?,
    }
    Ok(())
}

fn build_query(text: &str, condition: bool, schema: &FieldSchema) -> anyhow::Result<StreamQuery> {
    let query = if condition {
        StreamQuery::from_condition(text, schema)
    } else {
        StreamQuery::new(text, schema)
    };
    query.with_context(|| format!("invalid filter: {text}"))
}

fn augmenter(no_augment: bool, config: &Config) -> Augmenter {
    if no_augment {
        Augmenter::disabled()
    } else {
        Augmenter::new(&config.augment)
    }
}

fn run_check(filter: &str, condition: bool, schema: &FieldSchema) -> anyhow::Result<()> {
    let query = build_query(filter, condition, schema)?;
    println!("{:<12} {}", "condition:", query.condition());
    println!("{:<12} {}", "tree:", query.root());
    println!("{:<12} {}", "complexity:", query.complexity());
    println!();
    print!("{}", describe(NodeRef::from(query.root())));
    Ok(())
}

fn run_eval(filter: &str, record: &str, condition: bool, no_augment: bool, config: &Config) -> anyhow::Result<()> {
    let query = build_query(filter, condition, &config.fields)?;
    let record = augmenter(no_augment, config).augment(Record::from_json_str(record)?);
    let accepted = query.evaluate(&record)?;
    println!("{accepted}");
    Ok(())
}

async fn run_stream(
    filter: Option<String>,
    input: Option<String>,
    show_stats: bool,
    no_augment: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let Some(text) = filter.or_else(|| config.stream.filter_logic.clone()) else {
        anyhow::bail!("no filter given: pass --filter or set FILTER_LOGIC / [stream].filter_logic");
    };
    let query = build_query(&text, false, &config.fields)?;
    if let Some(id) = config.stream.application_id() {
        info!(application_id = %id, "stream filter starting");
    }
    let filter = StreamFilter::new(query, augmenter(no_augment, config));
    let verbose = config.stream.verbose;
    let mut stats = FilterStats::default();

    match input {
        Some(input) => {
            let paths: Vec<PathBuf> = resolve_inputs(&input)?;
            if paths.is_empty() {
                anyhow::bail!("No record files found: {input}");
            }
            for path in paths {
                debug!(path = %path.display(), "reading records");
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("cannot open {}", path.display()))?;
                filter_lines(BufReader::new(file), &filter, &mut stats, verbose).await?;
            }
        }
        None => filter_lines(BufReader::new(tokio::io::stdin()), &filter, &mut stats, verbose).await?,
    }

    info!(accepted = stats.accepted, rejected = stats.rejected, failed = stats.failed, "stream finished");
    if show_stats {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

async fn filter_lines<R>(reader: R, filter: &StreamFilter, stats: &mut FilterStats, verbose: bool) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = filter.process_line(&line);
        stats.record(&outcome);
        if let Outcome::Accept(record) = &outcome {
            let out = record.to_json_string()?;
            if verbose {
                info!(record = %out, "accepted");
            }
            println!("{out}");
        }
    }
    Ok(())
}

fn run_config(init: bool, config: &Config) -> anyhow::Result<()> {
    if init {
        let path = Config::default().save()?;
        println!("wrote default configuration to {}", path.display());
        return Ok(());
    }
    print!("{}", config.to_toml()?);
    let stream = &config.stream;
    println!();
    println!("# {:<16} {}", "input topic:", stream.input_topic().unwrap_or_else(|| "-".into()));
    println!("# {:<16} {}", "target topic:", stream.target_topic().unwrap_or_else(|| "-".into()));
    println!("# {:<16} {}", "application id:", stream.application_id().unwrap_or_else(|| "-".into()));
    let missing = stream.missing_keys();
    if !missing.is_empty() {
        println!("# {:<16} {}", "missing:", missing.join(", "));
    }
    Ok(())
}
