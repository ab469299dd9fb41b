#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lucid::{
    Dispatcher, FsObjectStore, LlmRouter, LucidDb, ObjectStore, Result, Services, Settings,
    Worker,
};

#[derive(Parser)]
#[command(name = "lucid")]
#[command(about = "Lucid core - versioned AI reasoning trees backed by SQLite")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides LUCID_BIND_ADDR)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Run the job worker loop
    Worker {
        /// Process at most one job and exit
        #[arg(long)]
        once: bool,

        /// Worker identity recorded on claimed jobs (overrides LUCID_WORKER_ID)
        #[arg(long)]
        worker_id: Option<String>,
    },

    /// Apply the database schema and exit
    Migrate,

    /// List nodes stuck in running and job claims whose lease expired
    Stale {
        /// Minimum age in minutes
        #[arg(long, default_value = "30")]
        minutes: u64,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lucid=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(code = e.code(), error = %e, "lucid failed");
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;
    let db = LucidDb::new(&settings.database_url, settings.db_max_connections).await?;
    db.migrate().await?;

    match cli.command {
        Commands::Migrate => {
            println!("Database schema is up to date ({})", settings.database_url);
            Ok(())
        }

        Commands::Serve { bind } => {
            let services = build_services(db, &settings).await?;
            let addr = bind.unwrap_or(settings.bind_addr);
            lucid::api::serve(services, addr, shutdown_signal()).await
        }

        Commands::Worker { once, worker_id } => {
            let services = build_services(db.clone(), &settings).await?;
            let worker = Worker::new(
                db,
                services.executor,
                worker_id.unwrap_or(settings.worker.worker_id),
                settings.worker.poll_interval,
            )
            .with_lease(settings.worker.lease);

            if once {
                let tick = worker.run_once().await?;
                println!("{tick:?}");
                return Ok(());
            }
            let processed = worker.run(shutdown_signal()).await?;
            info!(processed, "Worker exited");
            Ok(())
        }

        Commands::Stale { minutes } => {
            let report = Dispatcher::new(db)
                .stale_report(Duration::from_secs(minutes.saturating_mul(60)))
                .await?;
            if report.is_empty() {
                println!(
                    "No nodes running longer than {minutes} minutes and no expired job claims"
                );
            }
            for node in &report.nodes {
                println!(
                    "node\t{}\t{}\t{}",
                    node.id,
                    node.project_id,
                    node.updated_at.to_rfc3339()
                );
            }
            for job in &report.jobs {
                println!(
                    "job\t{}\t{}\t{}\t{}",
                    job.id,
                    job.node_id,
                    job.worker_id.as_deref().unwrap_or("-"),
                    job.lease_expires_at.map(|at| at.to_rfc3339()).unwrap_or_default()
                );
            }
            Ok(())
        }
    }
}

async fn build_services(db: LucidDb, settings: &Settings) -> Result<Services> {
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(
        settings.storage.root.clone(),
        &settings.storage.bucket,
    )?);
    store.ensure_bucket().await?;
    let llm = LlmRouter::from_settings(&settings.llm)?;
    Ok(Services::new(db, Arc::new(llm), store, settings.execution))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
