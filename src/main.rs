use crate::{
    config::Config,
    core::{
        account::{load_accounts, load_messages, load_proxies},
        pipeline::{self, RunSummary, TaskKind},
        reporter::TelegramReporter,
    },
    error::Result,
};
use log::{LevelFilter, error, info};
use std::process::ExitCode;

mod config;
mod core;
mod error;

async fn run() -> Result<RunSummary> {
    let config = Config::read_default().await?;

    let accounts = load_accounts(&config.files.accounts).await?;
    let messages = match config.is_enabled(TaskKind::Chat) {
        true => load_messages(&config.files.messages).await?,
        false => vec![],
    };
    let proxies = load_proxies(&config.files.proxies).await?;

    let summary = pipeline::run(&config, &accounts, &messages, &proxies).await;

    let api = config.endpoints.telegram.clone();
    if let Some(reporter) = TelegramReporter::from_env(api, config.report_format) {
        reporter.send(&summary).await;
    }
    Ok(summary)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let mut logger = pretty_env_logger::formatted_timed_builder();
    logger.filter_level(LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    match run().await {
        Ok(summary) => {
            info!("Run finished");
            ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            error!("Startup failed: {e}");
            error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}
