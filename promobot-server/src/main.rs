use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use promobot_common::models::Epoch;
use promobot_core::repositories::{
    EpochRepository, PostgresEpochRepository, PostgresUserRepository,
};
use promobot_core::services::{EpochMonitor, RedemptionService, UserService};
use promobot_core::tasks::epoch_flush::spawn_epoch_flush_task;
use promobot_core::{Database, Error};

mod commands;
use commands::CommandHandler;

#[derive(Parser, Debug, Clone)]
#[command(name = "promobot")]
#[command(author, version, about = "Promo-code reward bot server")]
struct Args {
    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://promo@localhost:5432/promobot")]
    database_url: String,

    /// Seconds between periodic epoch flushes.
    #[arg(long, default_value_t = 60)]
    flush_interval_secs: u64,

    /// Deadline for the storage step of a redemption, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    storage_timeout_ms: u64,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("promobot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("Promobot starting.");

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e.into());
    }

    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run_server(args: Args) -> Result<(), Error> {
    let db = Database::new(&args.database_url).await?;
    db.migrate().await?;

    let epoch_repo = Arc::new(PostgresEpochRepository::new(db.pool().clone()));
    let user_repo = Arc::new(PostgresUserRepository::new(db.pool().clone()));

    // First run against an empty store: activate the first reward tier so
    // the monitor has something to sync.
    match epoch_repo.find_current().await {
        Ok(_) => {}
        Err(Error::NotFound(_)) => {
            let first = Epoch::activate(1)
                .ok_or_else(|| Error::Internal("empty reward table".to_string()))?;
            epoch_repo.upsert(&first).await?;
            info!("seeded first reward epoch");
        }
        Err(e) => return Err(e),
    }

    let monitor = Arc::new(EpochMonitor::new(epoch_repo));
    monitor.sync().await?;

    let user_service = Arc::new(UserService::new(user_repo.clone()));
    let redemption = Arc::new(RedemptionService::new(
        monitor.clone(),
        user_repo,
        Duration::from_millis(args.storage_timeout_ms),
    ));

    let flush_task = spawn_epoch_flush_task(
        monitor.clone(),
        Duration::from_secs(args.flush_interval_secs),
    );

    let handler = CommandHandler::new(user_service, redemption, monitor.clone());

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C signal.");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if line == "quit" || line == "exit" {
                            break;
                        }
                        let reply = handler.dispatch(line).await;
                        println!("{reply}");
                    }
                    None => break,
                }
            }
        }
    }

    // Shutdown: one final forced flush, then stop the timer.
    flush_task.abort();
    monitor.flush(true).await?;
    info!("Epoch state flushed; shutting down.");

    Ok(())
}
