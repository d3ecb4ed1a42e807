use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use litwatch::config::{default_config_path, find_config_file, load_config, Config, CONFIG_FILE_NAME};
use litwatch::models::{DateRange, Paper, SearchMode, SearchOutcome, SearchRun};
use litwatch::utils::date::{FrequencyPreset, FAR_FUTURE_DATE};
use litwatch::utils::filter::{sort_by_date, validate_paper};
use litwatch::utils::stats::{author_frequencies, journal_frequencies, keyword_matches};
use litwatch::Aggregator;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// litwatch - watch PubMed and CrossRef for new publications
#[derive(Parser, Debug)]
#[command(name = "litwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Watch PubMed and CrossRef for new publications matching keywords, journals and authors", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
struct LogArgs {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search PubMed and CrossRef
    Search {
        /// What to search for
        #[arg(long, short, value_enum, default_value_t = ModeArg::Both)]
        mode: ModeArg,

        /// Window start (YYYY/MM/DD); overrides the lookup frequency
        #[arg(long)]
        from: Option<String>,

        /// Window end (YYYY/MM/DD); open-ended when omitted
        #[arg(long)]
        to: Option<String>,

        /// Look-back window such as "2 weeks"; defaults to the configured lookup_frequency
        #[arg(long, conflicts_with = "from")]
        frequency: Option<String>,

        /// Scheduler preset: daily, weekly, biweekly or monthly (window ends today)
        #[arg(long, conflicts_with_all = ["from", "to", "frequency"])]
        preset: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Auto)]
        output: OutputFormat,
    },

    /// Validate the configuration file and show what would be searched
    CheckConfig,

    /// Write a sample configuration file
    InitConfig {
        /// Where to write it (defaults to the user config directory)
        path: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Keywords,
    Authors,
    Both,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Keywords => SearchMode::Keywords,
            ModeArg::Authors => SearchMode::Authors,
            ModeArg::Both => SearchMode::Both,
        }
    }
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table if stdout is a terminal, JSON otherwise
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
}

/// Output format once `Auto` has been decided
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rendering {
    Table,
    Json,
}

impl OutputFormat {
    fn resolve(self, is_terminal: bool) -> Rendering {
        match self {
            OutputFormat::Auto if is_terminal => Rendering::Table,
            OutputFormat::Auto | OutputFormat::Json => Rendering::Json,
            OutputFormat::Table => Rendering::Table,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        log,
        config: config_arg,
        command,
    } = Cli::parse();

    match command {
        Commands::InitConfig { path } => {
            init_tracing(log, &Config::default().logging);
            init_config(path)?;
        }
        Commands::Search {
            mode,
            from,
            to,
            frequency,
            preset,
            output,
        } => {
            let (config_path, config) = load(config_arg, log)?;
            let search = config.search_config()?;
            let range = resolve_range(
                from.as_deref(),
                to.as_deref(),
                frequency.as_deref().unwrap_or(&search.lookup_frequency),
                preset.as_deref(),
            )?;
            tracing::debug!("Searching with {}", config_path.display());

            let mut run = SearchRun::new(mode.into(), range);
            let outcome = Aggregator::new(config).execute(&mut run, &search).await?;
            tracing::info!(
                status = %run.status(),
                keyword_papers = run.keyword_count,
                author_papers = run.author_count,
                "Run finished"
            );
            for paper in outcome.combined() {
                let issues = validate_paper(&paper);
                if !issues.is_empty() {
                    tracing::debug!(title = %paper.title.as_str(), ?issues, "Incomplete paper");
                }
            }
            output_outcome(
                &outcome,
                &search.topics,
                output.resolve(std::io::stdout().is_terminal()),
            )?;
        }
        Commands::CheckConfig => {
            let (config_path, config) = load(config_arg, log)?;
            let search = config.search_config()?;
            let range = DateRange::from_frequency(&search.lookup_frequency, None)?;
            println!("Configuration OK: {}", config_path.display());
            println!("  email:     {}", search.email);
            println!("  window:    {}", range);
            println!("  topics:    {}", search.topics.len());
            println!("  journals:  {}", search.journals.len());
            println!(
                "  authors:   {} ORCIDs, {} named",
                search.orcids.len(),
                search.named_authors.len()
            );
        }
    }

    Ok(())
}

/// Find and load the configuration file, then start logging
fn load(config_arg: Option<PathBuf>, log: LogArgs) -> Result<(PathBuf, Config)> {
    let config_path = config_arg.or_else(find_config_file).with_context(|| {
        format!(
            "no configuration file found (looked for ./{}); run `litwatch init-config`",
            CONFIG_FILE_NAME
        )
    })?;
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_tracing(log, &config.logging);
    tracing::info!("Using config file: {}", config_path.display());
    Ok((config_path, config))
}

fn init_tracing(log: LogArgs, logging: &litwatch::config::LoggingConfig) {
    let level = if log.quiet {
        "error"
    } else {
        match log.verbose {
            0 => logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("litwatch={}", level)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if log.log_json || logging.is_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn init_config(path: Option<PathBuf>) -> Result<()> {
    let path = path
        .or_else(default_config_path)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    Config::write_sample(&path)?;
    println!("Wrote sample configuration to {}", path.display());
    Ok(())
}

/// Pick the search window from the command-line options
fn resolve_range(
    from: Option<&str>,
    to: Option<&str>,
    frequency: &str,
    preset: Option<&str>,
) -> Result<DateRange> {
    let range = match (from, preset) {
        (Some(from), _) => DateRange::new(from, to.unwrap_or(FAR_FUTURE_DATE))?,
        (None, Some(preset)) => {
            let today = chrono::Local::now().date_naive();
            let (start, end) = FrequencyPreset::from_name(preset).range_ending(today);
            DateRange::new(start, end)?
        }
        (None, None) => DateRange::from_frequency(frequency, to)?,
    };
    Ok(range)
}

fn output_outcome(outcome: &SearchOutcome, topics: &[String], rendering: Rendering) -> Result<()> {
    match rendering {
        Rendering::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
        Rendering::Table => {
            let mut keyword_papers = outcome.keyword_papers.clone();
            sort_by_date(&mut keyword_papers, true);
            let mut author_papers = outcome.author_papers.clone();
            sort_by_date(&mut author_papers, true);

            println!("Keyword results ({})", keyword_papers.len());
            println!("{}", papers_table(&keyword_papers));
            println!("Author results ({})", author_papers.len());
            println!("{}", papers_table(&author_papers));

            let combined = outcome.combined();
            let matches = keyword_matches(&combined, topics);
            let mut frequency = comfy_table::Table::new();
            frequency.load_preset(comfy_table::presets::UTF8_FULL);
            frequency.set_header(vec!["Keyword", "Hits", "Mentions"]);
            for (keyword, hits) in &outcome.keyword_frequency {
                let mentions = matches.get(keyword).copied().unwrap_or(0);
                frequency.add_row(vec![keyword.clone(), hits.to_string(), mentions.to_string()]);
            }
            println!("{frequency}");

            println!(
                "Top authors: {}",
                top_counts(&author_frequencies(&combined), TOP_COUNTS)
            );
            println!(
                "Top journals: {}",
                top_counts(&journal_frequencies(&combined), TOP_COUNTS)
            );

            let breakdown: Vec<String> = outcome
                .source_breakdown()
                .iter()
                .map(|(source, count)| format!("{}: {}", source, count))
                .collect();
            println!("Sources: {}", breakdown.join(", "));
        }
    }
    Ok(())
}

const TOP_COUNTS: usize = 5;

/// `name (n)` for the `limit` most frequent names, ties broken by name
fn top_counts(counts: &BTreeMap<String, usize>, limit: usize) -> String {
    let mut ranked: Vec<(&String, &usize)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if ranked.is_empty() {
        return "none".to_string();
    }
    ranked
        .into_iter()
        .take(limit)
        .map(|(name, count)| format!("{} ({})", name, count))
        .collect::<Vec<_>>()
        .join(", ")
}

fn papers_table(papers: &[Paper]) -> comfy_table::Table {
    use comfy_table::{Attribute, Cell, Table};
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Title", "Authors", "Journal", "Date", "Source"]);

    for paper in papers {
        table.add_row(vec![
            Cell::new(truncate(paper.title.as_str(), 50)).add_attribute(Attribute::Bold),
            Cell::new(truncate(&paper.authors.items().join(", "), 30)),
            Cell::new(truncate(paper.journal.as_str(), 25)),
            Cell::new(&paper.date),
            Cell::new(paper.source.to_string()),
        ]);
    }
    table
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
