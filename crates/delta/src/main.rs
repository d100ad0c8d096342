//! Replays a JSON-lines capture of connector records through the change event
//! consumer and prints every emitted event as one JSON line on stdout.
//!
//! ```text
//! delta-replay <records.jsonl> [config.toml]
//! ```

use anyhow::{Context, Result};
use delta_cdc::{ChangeEventConsumer, EventReader, RawChangeRecord};
use delta_core::{DeltaError, Offset, QueueEmitter, SourceContext};
use delta_shared::{DeltaConfig, HealthAggregator, HealthStatus, ObservabilitySystem, SourceHealth};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let records_path = args
        .next()
        .context("usage: delta-replay <records.jsonl> [config.toml]")?;
    let config_path = args.next().unwrap_or_else(|| "delta.toml".to_string());

    let config = DeltaConfig::load_from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;
    ObservabilitySystem::init(&config.observability)?;

    info!(
        records = %records_path,
        database = %config.source.database,
        "Starting delta-replay"
    );

    let file = File::open(&records_path)
        .with_context(|| format!("failed to open {}", records_path))?;
    let records = BufReader::new(file)
        .lines()
        .filter(|line| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .map(|line| {
            let line = line.map_err(|e| DeltaError::InternalError(format!("read failed: {}", e)))?;
            RawChangeRecord::from_json_line(&line)
        });

    let health = Arc::new(SourceHealth::new(
        config.source.server_name.clone(),
        Duration::from_secs(30),
    ));
    let (emitter, queue, stop) = QueueEmitter::bounded(config.emitter.queue_capacity);
    let consumer =
        ChangeEventConsumer::new(&config.source, emitter, health.clone(), &Offset::new())?;

    let reader = EventReader::start(records, consumer);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping reader");
            stop.stop();
        }
    });

    let printer = tokio::task::spawn_blocking(move || -> Result<usize> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut printed = 0;
        while let Some(event) = queue.recv() {
            serde_json::to_writer(&mut out, &event)?;
            writeln!(out)?;
            printed += 1;
        }
        out.flush()?;
        Ok(printed)
    });

    let outcome = reader.join().await;
    let printed = printer.await??;

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            if let Err(status_error) = health.set_error(&e.to_string()) {
                warn!(error = %status_error, "Unable to record source failure");
            }
            error!(error = %e, events = printed, "Replay failed");
            return Err(e.into());
        }
    };

    let health = HealthAggregator::new().add_check(Box::new(health));
    let status = health.overall_status();
    if status != HealthStatus::Healthy {
        warn!(status = ?status, "Source health degraded");
    }

    info!(
        records = report.records,
        ddl_events = report.ddl_events,
        dml_events = report.dml_events,
        skipped = report.skipped,
        stopped = report.stopped,
        printed,
        "Replay finished"
    );
    Ok(())
}
