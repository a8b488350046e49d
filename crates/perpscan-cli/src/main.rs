mod cli;
mod error;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perpscan_core::{
    Direction, ExchangeId, ReqwestHttpClient, ScreenerConfig, ScreenerEngine, ScreenerFilters,
};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let exchange = ExchangeId::parse(&cli.exchange)?;
    let direction = Direction::parse(&cli.direction)?;

    let mut filters = ScreenerFilters::defaults_for(exchange, direction);
    if let Some(funding_cut) = cli.funding_cut {
        filters.funding_cut = funding_cut;
    }
    if let Some(min_market_cap) = cli.min_market_cap_usd {
        filters.min_market_cap_usd = min_market_cap.max(0.0);
    }
    if let Some(min_turnover) = cli.min_turnover_24h_usd {
        filters.min_turnover_24h_usd = min_turnover.max(0.0);
    }
    if let Some(limit) = cli.limit {
        filters.limit = limit.clamp(1, 50);
    }

    let config = ScreenerConfig {
        allow_unknown_market_cap: cli.allow_unknown_market_cap,
        ..ScreenerConfig::default()
    };

    let engine = ScreenerEngine::new(config, Arc::new(ReqwestHttpClient::new()));
    let response = engine.screen(&filters).await?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{rendered}");

    Ok(())
}
