use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use oracle_api::{analysis, build_state, connect_state, jobs, rest, router};
use oracle_common::Config;

#[derive(Parser)]
#[command(name = "oracle")]
#[command(about = "Topic surge scoring and forecasting service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API (default)
    Serve,

    /// Replace all signals with deterministic mock data, then rebuild
    Seed {
        /// Days of history to generate
        #[arg(long, default_value_t = 120)]
        days: u32,
    },

    /// Fetch recent signals from the live sources, then rebuild
    Ingest {
        /// How far back to fetch
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Recompute stored features for every topic
    Rebuild,

    /// Recompute stored forecasts for every topic
    Forecast,

    /// Print the leaderboard
    Rank {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Render the markdown digest
    Digest {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(log_format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("oracle=info,tower_http=info"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log_format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.api_host, config.api_port);
    let state = build_state(config).await?;
    let app = router(state);

    info!("Oracle API starting on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config.log_format)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await?,

        Commands::Seed { days } => {
            let state = connect_state(config).await?;
            let events = jobs::seed_mock(&state, days, Utc::now().date_naive()).await?;
            let refresh = jobs::refresh(&state).await?;
            println!(
                "Seeded {events} events over {days} days; {} feature rows, {} forecasts",
                refresh.features.rows, refresh.forecasts.rows
            );
        }

        Commands::Ingest { days } => {
            let state = connect_state(config).await?;
            let report = jobs::run_etl(&state, days).await?;
            let refresh = jobs::refresh(&state).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!(
                "Rebuilt {} feature rows and {} forecasts",
                refresh.features.rows, refresh.forecasts.rows
            );
        }

        Commands::Rebuild => {
            let state = build_state(config).await?;
            let report = jobs::rebuild_features(
                state.store.as_ref(),
                &state.engine,
                state.config.feature_lookback_days,
            )
            .await?;
            println!(
                "Rebuilt features for {}/{} topics ({} rows, {} failed)",
                report.succeeded, report.topics, report.rows, report.failed
            );
        }

        Commands::Forecast => {
            let state = build_state(config).await?;
            let report = jobs::run_forecasts(
                state.store.as_ref(),
                &state.forecaster,
                &state.config.forecast_horizons,
                state.config.feature_lookback_days,
            )
            .await?;
            println!(
                "Forecast {}/{} topics ({} forecasts, {} failed)",
                report.succeeded, report.topics, report.rows, report.failed
            );
        }

        Commands::Rank { limit } => {
            let state = build_state(config).await?;
            let (as_of, views) = analysis::leaderboard(&state).await?;
            println!("Leaderboard as of {as_of}");
            for (i, view) in views.iter().take(limit).enumerate() {
                let surge = &view.snapshot.surge;
                println!(
                    "{:>3}. {:<36} {:>5.1}%  vg={:+.3} z={:+.2} conv={:.2}",
                    i + 1,
                    view.topic.name,
                    surge.score_pct,
                    surge.breakdown.velocity_growth,
                    surge.breakdown.z_spike,
                    surge.breakdown.convergence,
                );
            }
        }

        Commands::Digest { limit, out } => {
            let state = build_state(config).await?;
            let (as_of, views) = analysis::leaderboard(&state).await?;
            let markdown = rest::digest(&views, as_of, limit);
            match out {
                Some(path) => {
                    std::fs::write(&path, &markdown)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Digest written to {}", path.display());
                }
                None => println!("{markdown}"),
            }
        }
    }

    Ok(())
}
