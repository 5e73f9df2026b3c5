use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use static_toml::static_toml;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::Settings;

mod api;
mod auth;
mod data;
mod import;
mod mutate;
mod report;
mod search;
mod serve;
mod settings;
mod store;

static_toml! {
    pub static CONFIG = include_toml!("config.toml");
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file with `api_url`, `public_url` and an `[auth]` table.
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web front-end.
    Serve {
        #[arg(short = 'p', long)]
        port: Option<String>,
    },

    /// List organizations with their number of contacts.
    Organizations {
        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Search organizations and contacts.
    Search {
        query: String,

        #[arg(short = 't', long = "type")]
        types: Vec<String>,
    },

    /// Print the organization type catalog.
    Types,

    /// Import organizations and contacts from the first sheet of a workbook.
    Import {
        file: PathBuf,

        /// Type given to organizations the import creates.
        #[arg(short = 't', long = "type")]
        org_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relationsales=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(2);
        }
    };

    match args.command {
        Commands::Serve { port } => serve::run(settings, port.as_deref())
            .await
            .with_context(|| "failed to run `serve`"),

        Commands::Organizations { types } => report::organizations(&settings, types)
            .await
            .with_context(|| "could not run `organizations`"),

        Commands::Search { query, types } => report::search(&settings, &query, types)
            .await
            .with_context(|| "could not run `search`"),

        Commands::Types => report::types(&settings)
            .await
            .with_context(|| "could not run `types`"),

        Commands::Import { file, org_type } => import::run(&settings, &file, org_type)
            .await
            .with_context(|| format!("could not import {:?}", file)),
    }
}
