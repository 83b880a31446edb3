// Copyright 2023 Remi Bernotavicius

use clap::Parser;
use clap::Subcommand;
use recipe_share::config::Config;
use recipe_share::database::models::{RecipeId, UserId};
use recipe_share::{catalog, database, recipes, shopping_list};
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug)]
struct Args {
    /// Path of the SQLite database. Defaults to a file in the user's data directory.
    #[arg(long, env = "RECIPE_SHARE_DATABASE")]
    database: Option<PathBuf>,

    /// How long to wait for another writer to release the database.
    #[arg(long, env = "RECIPE_SHARE_BUSY_TIMEOUT_MS")]
    busy_timeout_ms: Option<u64>,

    /// Site address used when building short links.
    #[arg(long, env = "RECIPE_SHARE_SHORT_LINK_BASE")]
    short_link_base: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the database or bring it up to date.
    Migrate,
    /// Load ingredients from a JSON list into the catalog.
    ImportIngredients { path: PathBuf },
    /// Print the summed ingredients of everything in a user's cart.
    ShoppingList {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    ShortLink { recipe: i32 },
    SearchIngredients { prefix: String },
}

fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .env()
        .init()?;

    let config = Config::new(
        args.database,
        args.busy_timeout_ms.map(Duration::from_millis),
        args.short_link_base,
    )?;
    log::debug!("using database at {}", config.database_path.display());
    let mut conn = database::establish_connection(&config.database_path, config.busy_timeout)?;

    match args.commands {
        Commands::Migrate => log::info!("database is up to date"),
        Commands::ImportIngredients { path } => {
            let report = catalog::import_json(&mut conn, path)?;
            println!("{} added, {} already present", report.inserted, report.skipped);
        }
        Commands::ShoppingList { user, output } => {
            let list = shopping_list::aggregate(&mut conn, UserId(user))?;
            let rendered = list.render();
            match output {
                Some(path) => std::fs::write(path, rendered)?,
                None => writeln!(std::io::stdout(), "{rendered}")?,
            }
        }
        Commands::ShortLink { recipe } => {
            let link = recipes::short_link(&mut conn, RecipeId(recipe), &config.short_link_base)?;
            println!("{link}");
        }
        Commands::SearchIngredients { prefix } => {
            for ingredient in catalog::search(&mut conn, &prefix)? {
                println!("{} ({})", ingredient.name, ingredient.measurement_unit);
            }
        }
    }
    Ok(())
}
