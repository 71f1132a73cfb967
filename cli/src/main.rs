mod commands;
mod config;
mod gemini;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, fmt};

use crate::commands::{
    cmd_add, cmd_clear, cmd_delete, cmd_goals_set, cmd_goals_show, cmd_history, cmd_log,
    cmd_scan, cmd_search, cmd_show, cmd_suggest, cmd_summary,
};
use crate::config::Config;
use crate::gemini::GeminiClient;
use thryve_core::models::GoalsPatch;
use thryve_core::recognition::Recognizer;
use thryve_core::service::NutritionService;

#[derive(Parser)]
#[command(
    name = "thryve",
    version,
    about = "Track what you eat from a photo",
    long_about = "Track what you eat from a photo.\n\n\
        Set GEMINI_API_KEY to enable `thryve scan`. Logs go to stderr; use RUST_LOG=debug for detail."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize a food photo and log it
    #[command(long_about = "Recognize a food photo and log it.\n\n\
        Failed requests are retried with a growing delay. The request rate limit \
        (THRYVE_RATE_LIMIT_MAX per THRYVE_RATE_LIMIT_WINDOW_MS) is counted per process, \
        so a single `thryve scan` invocation never reaches it.")]
    Scan {
        /// Path to the image (JPEG, PNG, WebP or GIF)
        image: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the built-in food table
    Search {
        /// Search query (case-insensitive substring)
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest foods for the current meal time
    Suggest {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food from the built-in table
    Log {
        /// Food name to search for
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food by entering its values
    Add {
        /// Food name
        name: String,
        /// Calories (kcal)
        #[arg(long)]
        calories: f64,
        /// Carbohydrates (g)
        #[arg(long)]
        carbs: f64,
        /// Protein (g)
        #[arg(long)]
        protein: f64,
        /// Fat (g)
        #[arg(long)]
        fat: f64,
        /// Serving size description (default: "1 serving")
        #[arg(long)]
        serving: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show today's totals, goals and meals
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the week containing a date, and that day's entries
    History {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one logged food with its macro split
    Show {
        /// Food ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a logged food by ID
    Delete {
        /// Food ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every logged food
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage daily calorie/macro goals
    Goals {
        #[command(subcommand)]
        command: GoalsCommands,
    },
}

#[derive(Subcommand)]
enum GoalsCommands {
    /// Show the current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change one or more goals
    Set {
        /// Daily calories (kcal)
        #[arg(long)]
        calories: Option<f64>,
        /// Daily carbohydrates (g)
        #[arg(long)]
        carbs: Option<f64>,
        /// Daily protein (g)
        #[arg(long)]
        protein: Option<f64>,
        /// Daily fat (g)
        #[arg(long)]
        fat: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,reqwest=warn,hyper=warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = NutritionService::new(&config.db_path)?;

    match cli.command {
        Commands::Scan { image, json } => {
            let client = GeminiClient::new(&config.gemini_model)?;
            let recognizer = Recognizer::new(client, config.recognition);
            cmd_scan(&mut svc, &recognizer, &image, json).await
        }
        Commands::Search { query, json } => cmd_search(&svc, &query, json),
        Commands::Suggest { json } => cmd_suggest(&svc, json),
        Commands::Log { query, json } => cmd_log(&mut svc, &query, json),
        Commands::Add {
            name,
            calories,
            carbs,
            protein,
            fat,
            serving,
            json,
        } => cmd_add(&mut svc, &name, calories, carbs, protein, fat, serving, json),
        Commands::Summary { json } => cmd_summary(&svc, json),
        Commands::History { date, json } => cmd_history(&svc, date, json),
        Commands::Show { id, json } => cmd_show(&svc, &id, json),
        Commands::Delete { id, json } => cmd_delete(&mut svc, &id, json),
        Commands::Clear { json } => cmd_clear(&mut svc, json),
        Commands::Goals { command } => match command {
            GoalsCommands::Show { json } => cmd_goals_show(&svc, json),
            GoalsCommands::Set {
                calories,
                carbs,
                protein,
                fat,
                json,
            } => {
                let patch = GoalsPatch {
                    calories,
                    carbs,
                    protein,
                    fat,
                };
                cmd_goals_set(&mut svc, &patch, json)
            }
        },
    }
}
