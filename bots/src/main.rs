use bots::config::Options;
use bots::connector::NetworkConnector;
use bots::experiment::{self, ExperimentContext, ExperimentRunner};
use bots::walk::SearchLimiter;
use clap::Parser;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let options = Options::parse();
    let tick_interval = options.tick_interval()?;

    match &options.naming_service {
        Some(url) => info!("Resolving game nodes through {}", url),
        None => info!("Target server: {}:{}", options.host, options.port),
    }

    let game = options.game_architecture().await?;
    let context = ExperimentContext {
        connector: Arc::new(NetworkConnector::new(game, options.network_settings())),
        walk_settings: options.walk_settings(),
        limiter: SearchLimiter::new(options.max_path_searches),
    };

    let experiment = experiment::build(options.experiment, options.experiment_params(), context)?;
    let mut runner = ExperimentRunner::new(experiment);
    runner.run(tick_interval).await?;

    Ok(())
}
