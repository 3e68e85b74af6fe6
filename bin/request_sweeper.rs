use anyhow::Result;
use chrono::Utc;
use proxima::{
    Config,
    db::{DatabaseConfig, get_db_pool},
    services::matching,
    utils::init_logging,
};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

use proxima::constants::SWEEPER_INTERVAL_SECS;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("🔗 Starting Proxima Request Sweeper...");

    // Load config and connect to database
    let config = Config::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;

    run_sweeper(pool, config).await?;

    Ok(())
}

/// Periodic sweep over the request workflow's external responsibilities:
/// expire overdue requests, complete acceptance transitions interrupted by
/// a crash, and open requests for newly eligible pairs. Every step is
/// idempotent, so overlapping sweepers are harmless.
async fn run_sweeper(pool: SqlitePool, config: Config) -> Result<()> {
    let mut interval = time::interval(Duration::from_secs(SWEEPER_INTERVAL_SECS));
    let mut iter_count: usize = 0;

    loop {
        interval.tick().await;
        iter_count += 1;
        let now = Utc::now();

        info!("🔍 Sweeper iteration {}", iter_count);

        // 1. Complete acceptance transitions interrupted partway through,
        //    before the expiry pass can touch their requests
        match matching::repair_unmaterialized(&pool, now).await {
            Ok(repaired) => {
                if repaired > 0 {
                    info!("🔧 Completed {} stuck acceptance transition(s)", repaired);
                }
            }
            Err(e) => {
                error!("❌ Failed to repair stuck requests: {}", e);
            }
        }

        // 2. Expire pending requests past their deadline
        match matching::expire_overdue_requests(&pool, now).await {
            Ok(expired) => {
                if expired > 0 {
                    info!("🧹 Expired {} overdue connection request(s)", expired);
                }
            }
            Err(e) => {
                error!("❌ Failed to expire overdue requests: {}", e);
            }
        }

        // 3. Open requests for pairs that crossed the encounter threshold
        match matching::create_requests(
            &pool,
            now,
            config.encounter_window_days,
            config.min_encounter_count,
        )
        .await
        {
            Ok(creation) => {
                if creation.created > 0 {
                    info!(
                        "🎯 Created {} connection request(s) ({} pair(s) eligible)",
                        creation.created, creation.total
                    );
                } else if iter_count % 10 == 0 {
                    info!("📊 No newly eligible pairs");
                }
            }
            Err(e) => {
                error!("❌ Failed to create connection requests: {}", e);
            }
        }
    }
}
