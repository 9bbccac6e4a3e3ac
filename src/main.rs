use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use watchdeck_lib::commands::{self, AppState};
use watchdeck_lib::config::{AppConfig, CliConfig, FileConfig};
use watchdeck_lib::db::SessionStore;
use watchdeck_lib::enrichment::EnrichmentProgress;
use watchdeck_lib::logging::init_logging;
use watchdeck_lib::metadata::TmdbClient;
use watchdeck_lib::models::EnrichedMovie;
use watchdeck_lib::query::{ChartDetails, ChartKind, GroupKind, PersonKind, QueryFacade};

#[derive(Parser, Debug)]
#[command(name = "watchdeck")]
#[command(about = "Import a movie-watch history, enrich it from TMDB and explore the statistics")]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the session database and logs.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TMDB API key, needed by `import`.
    #[arg(long, env = "TMDB_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Log at debug level and mirror the log to stderr.
    #[arg(long, global = true)]
    debug: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a viewing-history CSV export, replacing the stored session.
    Import { csv: PathBuf },

    /// Show the summary, or one chart category (as a table, or JSON with `--json`).
    Dashboard {
        #[arg(long, value_enum)]
        chart: Option<ChartKind>,
    },

    /// List watched movies, optionally filtered by title, director or cast.
    Movies {
        #[arg(long)]
        filter: Option<String>,
    },

    /// List directors, actors or genres by number of movies.
    People {
        #[arg(value_enum)]
        kind: GroupKind,
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show one director's or actor's statistics and filmography.
    Person {
        #[arg(value_enum)]
        kind: PersonKind,
        name: String,
    },

    /// Show one movie.
    Movie {
        title: String,
        #[arg(long)]
        year: Option<i32>,
    },

    /// Forget the stored session.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let file_config = args.config.as_deref().map(FileConfig::load).transpose()?;
    let cli_config = CliConfig {
        api_key: args.api_key.clone(),
        data_dir: args.data_dir.clone(),
        debug: args.debug,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", config.data_dir))?;
    let log_path = init_logging(&config.log_dir, config.debug)?;
    info!("Logging to {}", log_path.display());

    let store = SessionStore::new(config.db_path())
        .with_context(|| format!("Failed to open session database {:?}", config.db_path()))?;

    if let Err(e) = run(&args, &config, &store).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: &CliArgs, config: &AppConfig, store: &SessionStore) -> Result<()> {
    match &args.command {
        Command::Import { csv } => import(csv, config, store).await,
        Command::Reset => {
            commands::reset_session(store).map_err(anyhow::Error::msg)?;
            println!("Session cleared.");
            Ok(())
        }
        command => {
            let state = commands::restore_session(store)
                .context("No imported history; run `watchdeck import <csv>` first")?;
            let query = QueryFacade::new(&state, &config.image_base_url);
            let saved_at = store.saved_at().unwrap_or_default();
            show(command, &query, saved_at.as_deref(), args.json)
        }
    }
}

async fn import(csv: &Path, config: &AppConfig, store: &SessionStore) -> Result<()> {
    let client = TmdbClient::new(
        config.api_base_url.clone(),
        config.require_api_key()?,
        config.language.clone(),
        config.request_timeout,
    )?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let on_progress = |progress: &EnrichmentProgress| {
        bar.set_length(progress.total as u64);
        bar.set_position(progress.current as u64);
        bar.set_message(progress.title.clone());
    };

    let outcome = commands::import_history(csv, &client, store, on_progress).await?;
    bar.finish_and_clear();

    let total = outcome.state.movies.len();
    println!("Imported {} movies, {} matched in the catalog.", total, outcome.enriched_count);
    if !outcome.unenriched_titles.is_empty() {
        println!("Not found: {}", outcome.unenriched_titles.join(", "));
    }
    let failures = client.failures();
    if failures.searches + failures.details > 0 {
        println!(
            "{} searches and {} detail lookups failed; see the log for details.",
            failures.searches, failures.details
        );
    }
    if let Some(warning) = outcome.storage_warning {
        println!("Warning: the session was not saved ({}).", warning);
    }
    print_summary(&outcome.state);
    Ok(())
}

fn show(command: &Command, query: &QueryFacade, saved_at: Option<&str>, json: bool) -> Result<()> {
    match command {
        Command::Dashboard { chart: Some(kind) } if json => print_json(&query.chart(*kind)),
        Command::Dashboard { chart: Some(kind) } => {
            for line in chart_lines(&query.chart(*kind)) {
                println!("{}", line);
            }
            Ok(())
        }
        Command::Dashboard { chart: None } if json => print_json(query.summary()),
        Command::Dashboard { chart: None } => {
            let summary = query.summary();
            println!("Movies watched:  {}", summary.total_movies);
            println!("Average rating:  {:.2}", summary.average_rating);
            println!("Total runtime:   {} min", summary.total_runtime);
            println!("Average runtime: {:.0} min", summary.average_runtime);
            println!("Release span:    {} years", summary.year_range);
            if let Some(saved_at) = saved_at {
                println!("Imported at:     {}", saved_at);
            }
            Ok(())
        }
        Command::Movies { filter } => {
            let movies = query.list_movies(filter.as_deref());
            if json {
                return print_json(&movies);
            }
            for movie in &movies {
                print_movie_line(movie);
            }
            Ok(())
        }
        Command::People { kind, filter } => {
            let entries = query.list_group(*kind, filter.as_deref());
            if json {
                return print_json(&entries);
            }
            for entry in &entries {
                println!("{:>4}  {:.2}  {}", entry.count, entry.average_rating, entry.name);
            }
            Ok(())
        }
        Command::Person { kind, name } => {
            let Some(person) = query.person_detail(*kind, name) else {
                bail!("No {:?} named '{}'", kind, name);
            };
            if json {
                return print_json(&person);
            }
            println!("{} ({} movies, average {:.2})", person.name, person.count, person.average_rating);
            if let (Some(first), Some(last)) = (&person.first_movie, &person.last_movie) {
                println!("First watched: {} ({})", first.title, first.date_watched);
                println!("Last watched:  {} ({})", last.title, last.date_watched);
            }
            for movie in &person.filmography {
                print_movie_line(movie);
            }
            Ok(())
        }
        Command::Movie { title, year } => {
            let Some(detail) = query.movie_detail(title, *year) else {
                bail!("No watched movie titled '{}'", title);
            };
            if json {
                return print_json(&detail);
            }
            let movie = &detail.movie;
            println!("{} ({})", movie.title, movie.release_year);
            println!("Rating:   {:.1}", movie.rating);
            println!("Watched:  {}", movie.date_watched);
            println!("Director: {}", movie.director);
            println!("Genres:   {}", movie.genres.join(", "));
            println!("Runtime:  {} min", movie.runtime);
            println!("Country:  {}", movie.country);
            if let Some(url) = &detail.poster_url {
                println!("Poster:   {}", url);
            }
            if !movie.cast.is_empty() {
                println!("Cast:     {}", movie.cast.join(", "));
            }
            if !movie.overview.is_empty() {
                println!("\n{}", movie.overview);
            }
            Ok(())
        }
        Command::Import { .. } | Command::Reset => Ok(()),
    }
}

fn print_summary(state: &AppState) {
    let summary = &state.summary;
    println!(
        "{} movies, average rating {:.2}, {} directors, {} actors, {} genres.",
        summary.total_movies,
        summary.average_rating,
        state.indices.directors.len(),
        state.indices.actors.len(),
        state.indices.genres.len()
    );
}

fn print_movie_line(movie: &EnrichedMovie) {
    println!("{}", movie_line(movie));
}

fn movie_line(movie: &EnrichedMovie) -> String {
    format!(
        "{:<10}  {:.1}  {} ({}) - {}",
        movie.date_watched, movie.rating, movie.title, movie.release_year, movie.director
    )
}

fn titled(movie: &EnrichedMovie) -> String {
    format!("{} ({}, {:.1})", movie.title, movie.release_year, movie.rating)
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Plain-text rendering of a chart bundle.
fn chart_lines(details: &ChartDetails) -> Vec<String> {
    let mut lines = Vec::new();
    match details {
        ChartDetails::Summary(summary) => {
            lines.push(format!("Movies watched: {}", summary.total_movies));
            lines.push(format!("Average rating: {:.2}", summary.average_rating));
            lines.push(format!("Total runtime:  {} min", summary.total_runtime));
            if let Some(first) = &summary.first_movie {
                lines.push(format!("First watched:  {} on {}", first.title, first.date_watched));
            }
            if let Some(last) = &summary.last_movie {
                lines.push(format!("Last watched:   {} on {}", last.title, last.date_watched));
            }
            if let Some(max) = summary.max_rating {
                let titles: Vec<String> = summary.highest_rated.iter().map(|m| titled(m)).collect();
                lines.push(format!("Highest ({:.1}):  {}", max, titles.join(", ")));
            }
            if let Some(min) = summary.min_rating {
                let titles: Vec<String> = summary.lowest_rated.iter().map(|m| titled(m)).collect();
                lines.push(format!("Lowest ({:.1}):   {}", min, titles.join(", ")));
            }
        }
        ChartDetails::RatingDistribution(None) | ChartDetails::Genres(None) => {
            lines.push("No data.".to_string());
        }
        ChartDetails::RatingDistribution(Some(dist)) => {
            let modes: Vec<String> = dist.modes.iter().map(|m| format!("{:.1}", m)).collect();
            lines.push(format!(
                "Mean {:.2}, median {:.2}, std dev {:.2}, mode {}",
                dist.mean,
                dist.median,
                dist.std_dev,
                modes.join("/")
            ));
            for bucket in &dist.histogram {
                lines.push(format!("{:>4.1}  {:>4}", bucket.rating, bucket.count));
            }
            if !dist.perfect_scores.is_empty() {
                let titles: Vec<String> = dist.perfect_scores.iter().map(|m| titled(m)).collect();
                lines.push(format!("Perfect scores: {}", titles.join(", ")));
            }
        }
        ChartDetails::Directors(people) | ChartDetails::Actors(people) => {
            lines.push(format!("{} in total", people.total));
            for entry in &people.entries {
                lines.push(format!("{:>4}  {:.2}  {}", entry.count, entry.average_rating, entry.name));
            }
        }
        ChartDetails::Genres(Some(genres)) => {
            lines.push(format!("Favorite: {} ({} movies)", genres.favorite, genres.favorite_count));
            lines.push(format!("Best:     {}", titled(&genres.best_movie)));
            lines.push(format!("Worst:    {}", titled(&genres.worst_movie)));
            for entry in &genres.averages {
                lines.push(format!("{:>4}  {:.2}  {}", entry.count, entry.average_rating, entry.name));
            }
        }
        ChartDetails::RatingByYear(by_year) => {
            if let Some(best) = &by_year.best_year {
                lines.push(format!("Best year:  {} ({:.2})", best.year, best.average));
            }
            if let Some(worst) = &by_year.worst_year {
                lines.push(format!("Worst year: {} ({:.2})", worst.year, worst.average));
            }
            for row in &by_year.table {
                lines.push(format!("{}  {:.2}  {:>4}", row.year, row.average, row.count));
            }
        }
        ChartDetails::Runtime(runtime) => {
            for bucket in &runtime.buckets {
                lines.push(format!("{:<10}  {:>4}", bucket.label, bucket.count));
            }
            if let Some(average) = runtime.average_runtime {
                lines.push(format!(
                    "Average {:.0} min over {} movies",
                    average, runtime.movies_with_runtime
                ));
            }
            if let Some(longest) = &runtime.longest {
                lines.push(format!("Longest:  {} ({} min)", longest.title, longest.runtime));
            }
            if let Some(shortest) = &runtime.shortest {
                lines.push(format!("Shortest: {} ({} min)", shortest.title, shortest.runtime));
            }
        }
        ChartDetails::MoviesByMonth(counts) => {
            for (month, count) in MONTHS.iter().zip(counts) {
                lines.push(format!("{}  {:>4}", month, count));
            }
        }
        ChartDetails::RatingVsYear(points) => {
            for point in points {
                lines.push(format!("{}  {:.1}", point.year, point.rating));
            }
        }
    }
    lines
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
