//! Core application

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::ENV_LOG;
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::TransactionalService;
use crate::data::files::FilesystemStorage;
use crate::domain::{IdentifierRegistry, IngestService, Upload, compute_digest};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<TransactionalService>,
    pub ingest: IngestService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        let (cli_config, command) = cli::parse();
        Self::init_logging(cli_config.debug);

        tracing::debug!("Application starting");
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::Digest { path }) => return Self::print_digest(&path).await,
            Some(Commands::Ingest { path, uploader }) => {
                let app = Self::init(&cli_config).await?;
                app.shutdown.install_signal_handlers();
                let result = app.ingest_file(&path, uploader).await;
                app.shutdown.shutdown().await;
                return result;
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;

        let database = Arc::new(
            TransactionalService::init(
                config.database.transactional,
                &storage,
                config.database.postgres.as_ref(),
            )
            .await
            .context("Failed to initialize registry database")?,
        );

        let warehouse = FilesystemStorage::init(storage.warehouse_dir().to_path_buf())
            .await
            .with_context(|| {
                format!(
                    "Failed to initialize warehouse: {}",
                    storage.warehouse_dir().display()
                )
            })?;

        let ingest = IngestService::new(
            IdentifierRegistry::new(database.repository()),
            Arc::new(warehouse),
        );
        let shutdown = ShutdownService::new(Arc::clone(&database));

        tracing::debug!(
            backend = %database.backend(),
            data_dir = %storage.data_dir().display(),
            "Application initialized"
        );

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            ingest,
        })
    }

    async fn print_digest(path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let digest = tokio::task::spawn_blocking(move || compute_digest(&bytes)).await?;
        println!("{}  {}", digest, path.display());
        Ok(())
    }

    async fn ingest_file(&self, path: &Path, uploader: String) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let upload = Upload {
            bytes,
            filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            uploader,
        };

        let ingested = self
            .ingest
            .ingest(upload, &self.shutdown.cancellation_token())
            .await?;

        let status = if ingested.is_new { "stored" } else { "known" };
        println!("{}  {}", ingested.location(), status);
        Ok(())
    }

    /// `WEISS_LOG`, then `RUST_LOG`, then a default raised to debug by `--debug`
    fn init_logging(debug: bool) {
        let level = if debug { "debug" } else { "info" };
        let default_filter = format!("info,{}={level}", env!("CARGO_CRATE_NAME"));

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // before anything that can block
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.ingest.drain().await;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        tracing::debug!("Background tasks started");
    }
}
