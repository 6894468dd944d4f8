use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use newsai_core::{Settings, Storage};
use newsai_web::services::sessions::{issue_session, session_cookie};
use newsai_web::{create_app, AppState};
use tracing::{info, warn};

mod ingest;
mod logging;
mod seed;

const STORAGE_RETRIES: u32 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "NewsAI backend", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,
    /// Create roles, demo users, the starter taxonomy and a demo article
    Seed,
    /// Issue a session for an existing user and print its cookie
    Session {
        #[arg(long)]
        email: String,
    },
    /// Load arXiv metadata (JSON array or JSON lines) into the paper tables
    Ingest { path: PathBuf },
}

async fn open_storage(settings: &Settings) -> anyhow::Result<Arc<dyn Storage>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let created =
            newsai_storage::create_storage(&settings.storage, &settings.database_url).await;
        let result = match created {
            Ok(storage) => storage.ping().await.map(|_| storage),
            Err(e) => Err(e),
        };
        match result {
            Ok(storage) => return Ok(storage),
            Err(e @ newsai_core::Error::Config(_)) => return Err(e.into()),
            Err(e) if attempt >= STORAGE_RETRIES => {
                return Err(e).context("Storage initialization failed after all retries")
            }
            Err(e) => {
                warn!(error = %e, attempt, "Storage initialization failed, retrying");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

async fn serve(storage: Arc<dyn Storage>, settings: Settings) -> anyhow::Result<()> {
    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(
        address = %address,
        app = %settings.app_name,
        version = %settings.app_version,
        "Listening"
    );

    let app = create_app(AppState::new(storage, settings));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(&cli.settings);

    let storage = open_storage(&cli.settings).await?;
    let settings = cli.settings;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(storage, settings).await?,
        Commands::Seed => {
            let report = seed::seed(storage.as_ref()).await?;
            info!(
                roles = report.roles,
                users_created = report.users_created,
                fields = report.fields,
                articles_created = report.articles_created,
                "Seed finished"
            );
        }
        Commands::Session { email } => {
            let Some(user) = storage.user_by_email(&email).await? else {
                bail!("No user with email {}", email);
            };
            let (sid, session) = issue_session(storage.as_ref(), &settings, user.id).await?;
            println!("{}", session_cookie(&settings, &sid));
            info!(roles = ?session.roles, "Use the cookie above for authenticated requests");
        }
        Commands::Ingest { path } => {
            let records = ingest::load_records(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let report = ingest::ingest(storage.as_ref(), &records).await;
            println!(
                "{} papers, {} authors linked, {} unmapped categories, {} failed",
                report.papers.len(),
                report.authors_linked,
                report.unmapped_categories,
                report.failed
            );
            if report.failed > 0 {
                warn!(failed = report.failed, "Some records were not ingested");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::parse_from(["newsai", "--storage", "memory"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.settings.storage, "memory");
    }

    #[test]
    fn test_session_subcommand() {
        let cli = Cli::parse_from(["newsai", "session", "--email", "user@example.com"]);
        match cli.command {
            Some(Commands::Session { email }) => assert_eq!(email, "user@example.com"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_storage_rejects_unknown_backend() {
        let settings = Settings {
            storage: "qdrant".to_string(),
            ..Settings::default()
        };
        assert!(open_storage(&settings).await.is_err());
    }

    #[tokio::test]
    async fn test_open_sqlite_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            storage: "sqlite".to_string(),
            database_url: format!("sqlite://{}", dir.path().join("newsai.db").display()),
            ..Settings::default()
        };
        let storage = open_storage(&settings).await.unwrap();
        assert_eq!(storage.backend_name(), "sqlite");
    }
}
