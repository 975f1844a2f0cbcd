use std::env;
use std::error::Error;

use backoff::retry::Retry;
use backoff::strategy::exponential::Exponential;
use kinesis_stream::{
    ActivationState, BatchPublisher, KinesisService, PublishVerdict, Record, StreamAdmin,
    StreamConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cmdline;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = cmdline::root_cli().get_matches();

    let mut config = StreamConfig::load(env::vars())?;
    if let Some(name) = matches.get_one::<String>("stream-name") {
        config.stream_name.clone_from(name);
    }
    if let Some(shard_count) = matches.get_one::<i32>("shard-count") {
        config.shard_count = *shard_count;
    }
    config.validate()?;
    let record_count = matches
        .get_one::<usize>("records")
        .copied()
        .unwrap_or(cmdline::DEFAULT_RECORD_COUNT);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, cancelling");
                shutdown.cancel();
            }
            Err(e) => error!(?e, "Failed to listen for Ctrl-C"),
        }
    });

    let service = KinesisService::connect(&config).await?;
    let admin = StreamAdmin::new(service.clone());

    let policy = &config.publish.backoff;
    let schedule = Exponential::from_millis(
        policy.initial_interval_ms,
        policy.max_interval_ms,
        policy.factor,
        policy.jitter,
    )
    .take(config.publish.max_retries as usize);
    let created = Retry::new(
        schedule,
        || admin.create(&config.stream_name, config.shard_count),
        |e: &kinesis_stream::Error| e.is_transient(),
    )
    .await;

    match created {
        Ok(descriptor) => info!(
            stream = %descriptor.name,
            shard_count = descriptor.shard_count,
            "Stream created"
        ),
        Err(kinesis_stream::Error::AlreadyExists(_)) => {
            info!(stream = %config.stream_name, "Stream already exists, reusing it");
        }
        Err(e) => return Err(e.into()),
    }

    let activation = admin
        .await_active(
            &config.stream_name,
            config.activation.max_poll_attempts,
            config.activation.poll_interval,
            &cancel,
        )
        .await?;

    match activation.state {
        ActivationState::Active => {}
        ActivationState::Cancelled => {
            warn!(stream = %config.stream_name, "Cancelled before the stream became active");
            return Ok(());
        }
        state => {
            return Err(format!(
                "Stream {} is not active ({state:?} after {} probes, last status {:?})",
                config.stream_name, activation.attempts, activation.last_status
            )
            .into());
        }
    }

    let publisher = BatchPublisher::new(
        service,
        config.stream_name.clone(),
        config.publish.clone(),
    );
    let report = publisher
        .publish(
            demo_records(record_count),
            config.publish.max_retries,
            &cancel,
        )
        .await;

    info!(
        stream = %config.stream_name,
        verdict = ?report.verdict,
        attempts = report.attempts,
        undelivered = report.rejected.len(),
        errors = ?report.errors,
        "Publish finished"
    );

    match report.verdict {
        PublishVerdict::Delivered | PublishVerdict::Cancelled => Ok(()),
        verdict => match report.failure {
            Some(failure) => Err(failure.into()),
            None => Err(format!(
                "{} of {record_count} records were not delivered ({verdict:?})",
                report.rejected.len()
            )
            .into()),
        },
    }
}

/// `n` unkeyed records with payloads `0, 4, 8, ...`.
fn demo_records(n: usize) -> Vec<Record> {
    (0..n).map(|i| Record::new((i * 4).to_string())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_workload() {
        let records = demo_records(cmdline::DEFAULT_RECORD_COUNT);
        assert_eq!(records.len(), 25);
        assert_eq!(records[0].payload.as_ref(), b"0");
        assert_eq!(records[24].payload.as_ref(), b"96");
        assert!(records.iter().all(|r| r.partition_key.is_none()));
    }
}
