use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf_app::summary::SummaryProvider;
use bookshelf_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "bookshelf")]
#[command(about = "Personal library catalog", long_about = None)]
#[command(version)]
struct Cli {
    /// Override the configured log level (e.g. debug, warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on instead of the configured one
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create or upgrade the database schema and exit
    Migrate,

    /// Fetch the summary Open Library has for an ISBN
    Lookup {
        /// ISBN, with or without hyphens
        isbn: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().context("failed to load Bookshelf settings")?;
    if let Some(level) = cli.log_level {
        settings.telemetry.log_level = level;
    }
    bookshelf_telemetry::init(&settings.telemetry);

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            bookshelf_app::bootstrap(settings).await?.serve().await
        }
        Commands::Migrate => {
            let app = bookshelf_app::bootstrap(settings).await?;
            println!("database ready at {}", app.settings.database.path);
            app.database.close().await;
            Ok(())
        }
        Commands::Lookup { isbn } => {
            let provider = bookshelf_app::summary::from_settings(&settings.summary)?;
            match provider.fetch_summary(&isbn).await {
                Some(summary) => println!("{}", summary),
                None => println!("no summary found for {}", isbn),
            }
            Ok(())
        }
    }
}
