use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use otodata_core::{
    create_listing_table, dated_file_name, normalize, validate_snapshot_name, Archive,
    ListingDisplay, LocalArchive, SortColumn, Table,
};
use otodata_scrapers::{
    collect, discover, refresh_prices, CollectorConfig, HttpFetcher, SearchQuery,
    DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_LOCATION,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise (-v, --verbose)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect listings into a new dated CSV file
    #[command(long_about = "Discover listings from the search results, fetch every listing page concurrently, normalize the fields and write a dated CSV file.")]
    Scrape(ScrapeCommand),

    /// Update prices of a previous dataset and add new listings
    #[command(long_about = "Re-read the price of every listing in a previous dataset, keep the old price in a snapshot column, and append listings that were not there yet.")]
    Refresh(RefreshCommand),

    /// Print a dataset as a table
    Show(ShowCommand),
}

#[derive(Args)]
struct NetworkArgs {
    /// Search location path (-n, --location)
    #[arg(short = 'n', long, default_value = DEFAULT_LOCATION)]
    location: String,

    /// Number of search-result pages to walk (-c, --pages)
    #[arg(short = 'c', long, default_value_t = 1)]
    pages: u32,

    /// Listings fetched at the same time (-j, --concurrency)
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds (-t, --timeout)
    #[arg(short = 't', long, default_value_t = 10)]
    timeout: u64,

    /// Site root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

impl NetworkArgs {
    fn config(&self) -> CollectorConfig {
        CollectorConfig::default()
            .with_base_url(self.base_url.clone())
            .with_concurrency(self.concurrency)
            .with_timeout(Duration::from_secs(self.timeout))
    }
}

#[derive(Parser)]
struct ScrapeCommand {
    #[command(flatten)]
    network: NetworkArgs,

    /// Directory for the dated CSV file (-o, --output-dir)
    #[arg(short = 'o', long, default_value = ".")]
    output_dir: PathBuf,

    /// Also store the file here, moving older files to its Archive folder (-a, --archive-dir)
    #[arg(short = 'a', long)]
    archive_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct RefreshCommand {
    /// Dataset written by an earlier run (-i, --input)
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Name of the column that keeps the old prices; defaults to the input file's date
    #[arg(short = 's', long)]
    snapshot: Option<String>,

    #[command(flatten)]
    network: NetworkArgs,

    /// Directory for the dated CSV file (-o, --output-dir)
    #[arg(short = 'o', long, default_value = ".")]
    output_dir: PathBuf,

    /// Also store the file here, moving older files to its Archive folder (-a, --archive-dir)
    #[arg(short = 'a', long)]
    archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSortColumn {
    Price,
    Area,
    PricePerM2,
    Rooms,
    Floor,
    Year,
}

impl From<CliSortColumn> for SortColumn {
    fn from(value: CliSortColumn) -> Self {
        match value {
            CliSortColumn::Price => SortColumn::Price,
            CliSortColumn::Area => SortColumn::Area,
            CliSortColumn::PricePerM2 => SortColumn::PricePerM2,
            CliSortColumn::Rooms => SortColumn::Rooms,
            CliSortColumn::Floor => SortColumn::Floor,
            CliSortColumn::Year => SortColumn::YearBuilt,
        }
    }
}

#[derive(Parser)]
struct ShowCommand {
    /// Dataset to display (-i, --input)
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Maximum number of listings to display (-l, --limit)
    #[arg(short = 'l', long, default_value_t = 10)]
    limit: usize,

    /// Column to sort by (-s, --sort-by)
    #[arg(short = 's', long, value_enum, default_value_t = CliSortColumn::PricePerM2)]
    sort_by: CliSortColumn,

    /// Sort ascending instead of descending
    #[arg(long)]
    ascending: bool,

    /// Height of the price history graph in lines (-g, --graph-height)
    #[arg(short = 'g', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    graph_height: u8,

    /// Print one detailed entry per listing instead of a table
    #[arg(long, conflicts_with = "json")]
    details: bool,

    /// Print the listings as JSON
    #[arg(long)]
    json: bool,
}

fn progress_bar(message: &'static str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("=> "),
    );
    bar.set_message(message);
    Ok(bar)
}

/// `dane_2025_06_01.csv` -> `2025_06_01`; any other name is used as it is.
fn snapshot_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "previous".to_string());
    stem.strip_prefix("dane_").map(str::to_string).unwrap_or(stem)
}

async fn write_output(table: &Table, output_dir: &Path, archive_dir: Option<&Path>) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let path = output_dir.join(dated_file_name(Local::now().date_naive()));
    table
        .write_csv(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Saved {} listings to {}", table.len(), path.display());

    if let Some(dir) = archive_dir {
        let reference = LocalArchive::new(dir)
            .store(&path)
            .await
            .context("archiving dataset")?;
        println!("Stored as {}", reference);
    }
    Ok(())
}

async fn scrape(cmd: ScrapeCommand) -> Result<()> {
    let config = cmd.network.config();
    let fetcher = HttpFetcher::new(&config)?;

    let query = SearchQuery::new(cmd.network.location.clone());
    let identifiers = discover(&fetcher, &config, query, cmd.network.pages).await?;
    info!(listings = identifiers.len(), "Discovered listings");

    let bar = progress_bar("Fetching listings")?;
    let collection = collect(&fetcher, &identifiers, &config, |done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    })
    .await?;
    bar.finish_and_clear();

    let failed = collection.failed();
    let table = normalize(collection.records());
    if failed > 0 {
        println!("{} listings could not be fetched and have empty fields", failed);
    }

    write_output(&table, &cmd.output_dir, cmd.archive_dir.as_deref()).await
}

async fn refresh(cmd: RefreshCommand) -> Result<()> {
    let config = cmd.network.config();
    let fetcher = HttpFetcher::new(&config)?;

    let table = Table::read_csv(&cmd.input)
        .with_context(|| format!("reading {}", cmd.input.display()))?;
    let snapshot = cmd
        .snapshot
        .clone()
        .unwrap_or_else(|| snapshot_from_path(&cmd.input));
    validate_snapshot_name(&snapshot)?;

    let query = SearchQuery::new(cmd.network.location.clone());
    let identifiers = discover(&fetcher, &config, query, cmd.network.pages).await?;

    let bar = progress_bar("Refreshing")?;
    let (table, summary) = refresh_prices(table, &identifiers, &fetcher, &config, &snapshot, |done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    })
    .await?;
    bar.finish_and_clear();

    println!(
        "Refreshed {} prices ({} changed, {} unavailable), added {} new listings",
        summary.refreshed, summary.changed, summary.failed, summary.added
    );
    write_output(&table, &cmd.output_dir, cmd.archive_dir.as_deref()).await
}

fn show(cmd: ShowCommand) -> Result<()> {
    let mut table = Table::read_csv(&cmd.input)
        .with_context(|| format!("reading {}", cmd.input.display()))?;
    table.sort_by(cmd.sort_by.into(), !cmd.ascending);
    table.rows.truncate(cmd.limit);

    if cmd.json {
        println!("{}", table.to_json()?);
    } else if cmd.details {
        for listing in &table.rows {
            println!("{}", ListingDisplay::new(listing).format());
        }
    } else {
        println!("{}", create_listing_table(&table.rows, cmd.graph_height));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scrape(cmd) => scrape(cmd).await,
        Commands::Refresh(cmd) => refresh(cmd).await,
        Commands::Show(cmd) => show(cmd),
    }
}
