#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]

use std::env;
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use brokerstat::{
    COLLECTOR_BUFFER, DELIVERY_BUFFER, SINK_BUFFER,
    collector::Collector,
    config::{self, Config},
    delivery::Delivery,
    logger,
    sinks::{display::DisplaySink, file::FileSink},
    worker::Worker,
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// One line of the newline-delimited JSON delivery feed on stdin. This is
/// the boundary where a broker client would otherwise sit.
#[derive(Debug, Deserialize)]
struct DeliveryLine {
    exchange: String,
    routing_key: String,
    #[serde(default)]
    body: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    enable_logging_subsystem(&config);

    run_pipeline(&config).await
}

fn load_config() -> Arc<Config> {
    let config_directory = env::var("BROKERSTAT_CONFIG_DIR").unwrap_or_else(|_| ".".to_string());
    match config::get_config(Path::new(&config_directory)) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error loading configuration: {e:?}");
            std::process::exit(1);
        }
    }
}

fn enable_logging_subsystem(config: &Arc<Config>) {
    let env_filter = format!("{:?}", config.log_level);
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .event_format(logger::Formatter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");
}

async fn run_pipeline(config: &Arc<Config>) -> Result<()> {
    let cancel_token = CancellationToken::new();

    let (delivery_tx, delivery_rx) = async_channel::bounded::<Delivery>(DELIVERY_BUFFER);
    let (collector_tx, collector_rx) = mpsc::channel(COLLECTOR_BUFFER);

    // display sink is always registered; the file sink only with an output path
    let mut sink_txs = Vec::new();
    let mut sink_tasks = Vec::new();

    let (display_tx, display_rx) = mpsc::channel(SINK_BUFFER);
    sink_txs.push(display_tx);
    let display_sink = DisplaySink::new(display_rx, cancel_token.clone());
    sink_tasks.push(tokio::spawn(display_sink.run()));

    if let Some(output) = &config.output {
        let (file_tx, file_rx) = mpsc::channel(SINK_BUFFER);
        sink_txs.push(file_tx);
        let file_sink = FileSink::new(
            file_rx,
            PathBuf::from(output),
            config.persist_interval(),
            cancel_token.clone(),
        );
        sink_tasks.push(tokio::spawn(file_sink.run()));
    }

    let collector = Collector::new(
        collector_rx,
        sink_txs,
        config.snapshot_interval(),
        cancel_token.clone(),
    );
    let collector_task = tokio::spawn(collector.run());

    let mut worker_tasks = JoinSet::new();
    for id in 0..config.workers {
        let worker = Worker::new(
            id,
            delivery_rx.clone(),
            collector_tx.clone(),
            config.aggregate_interval(),
            cancel_token.clone(),
        );
        worker_tasks.spawn(worker.run());
    }
    drop(collector_tx);
    drop(delivery_rx);

    let source_token = cancel_token.clone();
    let source_task = tokio::spawn(async move {
        stdin_source(delivery_tx, source_token).await;
    });

    // run until interrupted or a worker hits a fatal broker error
    let mut failure = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("Interrupt received, shutting down");
        }
        Some(result) = worker_tasks.join_next() => {
            match result {
                Ok(Ok(())) => debug!("Worker finished"),
                Ok(Err(e)) => {
                    error!("Pipeline failed: {e}");
                    failure = Some(e.to_string());
                }
                Err(e) => {
                    error!("Worker panicked: {e}");
                    failure = Some(e.to_string());
                }
            }
        }
    }

    cancel_token.cancel();
    while worker_tasks.join_next().await.is_some() {}
    let _ = source_task.await;
    let _ = collector_task.await;
    for task in sink_tasks {
        let _ = task.await;
    }

    match failure {
        Some(diagnostic) => Err(Error::new(ErrorKind::InvalidData, diagnostic)),
        None => Ok(()),
    }
}

/// Feeds deliveries from stdin into the shared worker channel until EOF or
/// cancellation. Malformed lines are skipped with a diagnostic; they carry
/// no acknowledgment state, so skipping is safe.
async fn stdin_source(delivery_tx: async_channel::Sender<Delivery>, cancel_token: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!("SOURCE | shutdown signal received");
                return;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<DeliveryLine>(&line) {
                            Ok(event) => {
                                let delivery = Delivery::new(
                                    event.exchange,
                                    event.routing_key,
                                    Bytes::from(event.body.into_bytes()),
                                );
                                if delivery_tx.send(delivery).await.is_err() {
                                    debug!("SOURCE | all workers gone, stopping");
                                    return;
                                }
                            }
                            Err(e) => debug!("SOURCE | skipping malformed line: {e}"),
                        }
                    }
                    Ok(None) => {
                        debug!("SOURCE | stdin closed");
                        return;
                    }
                    Err(e) => {
                        error!("SOURCE | read from stdin failed: {e}");
                        return;
                    }
                }
            }
        }
    }
}
