use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sport_toolkit::cli::commands::{self, Context, ExportKind};
use sport_toolkit::config::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sport")]
#[command(author, version, about = "Garmin Connect and Strava sport-data toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Local Strava mirror database
    #[arg(long, global = true, env = "SPORT_DB_PATH")]
    db: Option<PathBuf>,

    /// Strava token JSON file
    #[arg(long, global = true, env = "STRAVA_TOKEN_FILE")]
    strava_token_file: Option<PathBuf>,

    /// Garmin session token file
    #[arg(long, global = true, env = "GARMIN_TOKEN_FILE")]
    garmin_token_file: Option<PathBuf>,

    /// Read tokens from the OS keyring instead of token files
    #[arg(long, global = true)]
    keyring: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current local time
    Health,
    /// Find the same workout on the other vendor
    Search {
        #[command(subcommand)]
        command: SearchCommands,
    },
    /// Query the local Strava mirror
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Export Strava activities into the local mirror
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Show the sample streams of an activity
    Streams {
        #[command(subcommand)]
        command: StreamCommands,
    },
    /// Compare Strava, Garmin and recomputed heart-rate figures
    CompareHr {
        /// Strava activity ID
        strava_id: u64,
        /// Garmin activity ID
        garmin_id: u64,
    },
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Find the Garmin activity matching a Strava activity
    MatchingGarmin {
        /// Strava activity ID
        strava_id: u64,
    },
    /// Find the Strava activity matching a Garmin activity
    MatchingStrava {
        /// Garmin activity ID
        garmin_id: u64,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Count activities, e.g. --start-date-after 2024-01-01T00:00:01+01:00 --activity-type ride
    Count {
        /// Start date lower bound, with offset
        #[arg(long)]
        start_date_after: Option<String>,
        /// Start date upper bound, with offset
        #[arg(long)]
        start_date_before: Option<String>,
        /// One of: BackcountrySki, Hike, Kayaking, NordicSki, Ride, RockClimbing,
        /// Run, Snowboard, Snowshoe, Walk, WeightTraining, Workout
        #[arg(long)]
        activity_type: Option<String>,
    },
    /// Search text in activity names and descriptions
    SearchText {
        text: String,
    },
}

#[derive(clap::Args)]
struct ExportArgs {
    /// OVERWRITE_IF_CHANGED or ONLY_MISSING
    #[arg(long)]
    strategy: String,
    /// Only activities started before, e.g. 2025-01-18T14:30:00+01:00
    #[arg(long)]
    before_ts: Option<String>,
    /// Only activities started after, e.g. 2025-01-18T14:30:00+01:00
    #[arg(long)]
    after_ts: Option<String>,
    /// Do not ask for confirmation; wait out rate limits
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Export activity summaries
    Summaries(ExportArgs),
    /// Export activity details for the activities already mirrored
    Details(ExportArgs),
}

#[derive(Subcommand)]
enum StreamCommands {
    /// Streams of a Strava activity
    Strava {
        /// Strava activity ID
        id: u64,
    },
    /// Streams of a Garmin activity
    Garmin {
        /// Garmin activity ID
        id: u64,
        /// Upper bound on samples per stream
        #[arg(long, default_value = "2000")]
        max_metrics: u32,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> sport_toolkit::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match Settings::from_env() {
        Ok(settings) => {
            let settings =
                settings.with_overrides(cli.db, cli.strava_token_file, cli.garmin_token_file);
            run(cli.command, Context::new(settings, cli.keyring)).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", sport_toolkit::error::format_user_error(&e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, ctx: Context) -> sport_toolkit::Result<()> {
    match command {
        Commands::Health => commands::health(),
        Commands::Search { command } => match command {
            SearchCommands::MatchingGarmin { strava_id } => {
                commands::matching_garmin(&ctx, strava_id).await
            }
            SearchCommands::MatchingStrava { garmin_id } => {
                commands::matching_strava(&ctx, garmin_id).await
            }
        },
        Commands::Db { command } => match command {
            DbCommands::Count {
                start_date_after,
                start_date_before,
                activity_type,
            } => commands::db_count(&ctx, start_date_after, start_date_before, activity_type),
            DbCommands::SearchText { text } => commands::db_search_text(&ctx, &text),
        },
        Commands::Export { command } => {
            let (kind, args) = match command {
                ExportCommands::Summaries(args) => (ExportKind::Summaries, args),
                ExportCommands::Details(args) => (ExportKind::Details, args),
            };
            commands::export(
                &ctx,
                kind,
                &args.strategy,
                args.before_ts,
                args.after_ts,
                args.yes,
            )
            .await
        }
        Commands::Streams { command } => match command {
            StreamCommands::Strava { id } => commands::strava_streams(&ctx, id).await,
            StreamCommands::Garmin { id, max_metrics } => {
                commands::garmin_streams(&ctx, id, max_metrics).await
            }
        },
        Commands::CompareHr {
            strava_id,
            garmin_id,
        } => commands::compare_hr(&ctx, strava_id, garmin_id).await,
    }
}
