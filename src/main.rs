use anyhow::{Context, Result, bail};
use tracing::info;

use edgestat::config::Config;
use edgestat::db::Database;
use edgestat::ingest::AggregationService;
use edgestat::purge::PurgeService;
use edgestat::stats::StatsService;

const TRIGGERED_BY: &str = "cli";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edgestat=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };

    let config = Config::load()?;
    let database = match &config.database.path {
        Some(path) => Database::connect(path).await?,
        None => Database::new().await?,
    };
    database.migrate().await?;
    let db = database.get_connection();

    match command {
        // Hourly cron entry: replay the access log into the counter store.
        "aggregate" => {
            info!("Starting log aggregation");
            let report = AggregationService::run(&db, &config.ingest).await?;
            print_json(&report)?;
        }

        "purge" => {
            let outcome = match args.get(1).map(String::as_str) {
                Some("--bucket") => {
                    let bucket = args.get(2).context("purge --bucket needs a bucket name")?;
                    PurgeService::purge_bucket(&db, &config.cache.root, bucket, TRIGGERED_BY)
                        .await?
                }
                Some("--pattern") => {
                    let pattern = args.get(2).context("purge --pattern needs a pattern")?;
                    PurgeService::purge_pattern(&db, &config.cache.root, pattern, TRIGGERED_BY)
                        .await?
                }
                Some("--all") => {
                    let confirm = args.iter().any(|a| a == "--confirm");
                    PurgeService::purge_all(&db, &config.cache.root, confirm, TRIGGERED_BY).await?
                }
                Some(path) => {
                    PurgeService::purge_path(&db, &config.cache.root, path, TRIGGERED_BY).await?
                }
                None => bail!("purge needs a path, --bucket <name>, --pattern <text>, or --all"),
            };
            print_json(&outcome)?;
        }

        "history" => {
            let limit = parse_number(args.get(1), 50)?;
            let history = PurgeService::history(&db, limit).await?;
            print_json(&history)?;
        }

        "overview" => {
            let overview = StatsService::overview(&db, &config.cache.root).await?;
            print_json(&overview)?;
        }

        "bandwidth" => {
            let days = parse_number(args.get(1), 7)?;
            let series = StatsService::bandwidth_series(&db, days as i64).await?;
            print_json(&series)?;
        }

        "top" => {
            let limit = parse_number(args.get(1), 20)?;
            let top = StatsService::top_assets(&db, limit).await?;
            print_json(&top)?;
        }

        other => {
            print_usage();
            bail!("unknown command: {}", other);
        }
    }

    Ok(())
}

fn parse_number(arg: Option<&String>, default: u64) -> Result<u64> {
    match arg {
        Some(value) => value
            .parse::<u64>()
            .with_context(|| format!("not a number: {}", value)),
        None => Ok(default),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_usage() {
    eprintln!(
        "usage: edgestat <command>

commands:
  aggregate                  replay the access log into the counter store
  purge <path>               purge one cached path
  purge --bucket <name>      purge everything under a bucket
  purge --pattern <text>     purge artifacts whose path contains <text>
  purge --all --confirm      purge the entire cache tree
  history [limit]            recent purge operations
  overview                   totals across files, cache and bandwidth
  bandwidth [days]           hourly bandwidth series
  top [limit]                top assets by downloads"
    );
}
