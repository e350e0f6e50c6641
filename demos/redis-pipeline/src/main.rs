mod model;

use std::sync::Arc;
use skewer::broker::RedisBroker;
use skewer::{telemetry, Config};
use tracing::{error, info};
use crate::model::{Model, Prediction};

/// `redis-pipeline worker` runs a batching worker against Redis;
/// `redis-pipeline submit [N]` pushes N synthetic images and prints what comes back.
#[tokio::main]
async fn main() -> skewer::Result<()> {
    telemetry::init();
    let config = Config::from_env()?;
    let broker = Arc::new(RedisBroker::connect(&config.redis_url).await?);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("submit") => {
            let count = args.next().and_then(|n| n.parse().ok()).unwrap_or(8);
            submit(&config, broker, count).await
        }
        _ => serve(&config, broker).await,
    }
}

async fn serve(config: &Config, broker: Arc<RedisBroker>) -> skewer::Result<()> {
    let mut handle = config.worker(broker, Model::new(2)).spawn();
    info!(queue = %config.queue_name, "serving, ctrl-c to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        outcome = handle.join() => return outcome,
    }
    info!("stopping");
    handle.stop().await
}

async fn submit(config: &Config, broker: Arc<RedisBroker>, count: usize) -> skewer::Result<()> {
    let submitter = config.submitter(broker);
    let images: Vec<Vec<f32>> = (0..count)
        .map(|i| vec![i as f32 / count.max(1) as f32; 64])
        .collect();

    let results: Vec<skewer::Result<Vec<Prediction>>> = submitter.run_many(images).await;
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(predictions) => println!("Index {} predictions {:?}", index, predictions),
            Err(e) => error!(index, error = %e, "request failed"),
        }
    }
    Ok(())
}
