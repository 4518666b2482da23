//! Wire configuration into a ready [`Session`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sentinel_config::{LedgerBackend, SentinelConfig};
use sentinel_engine::{CommitProgress, Session};
use sentinel_ledger::{
    ApprovalGate, Authorizer, ConfiguredSigner, LedgerRead, LedgerReader, LedgerWrite,
    LedgerWriter, MemoryLedger, MiningMode, SqliteLedger, default_ledger_path,
};
use sentinel_predict::{
    DEFAULT_PREDICT_URL, PredictConfig, PredictionClient, RetryConfig, RetryPolicy,
};
use tokio::sync::mpsc;

use crate::prompt::TerminalApproval;

pub(crate) fn prediction_client(config: &SentinelConfig) -> Result<PredictionClient> {
    let endpoint = config
        .prediction_endpoint()
        .unwrap_or_else(|| DEFAULT_PREDICT_URL.to_string());
    let mut predict = PredictConfig::new(&endpoint)?.with_retry(retry_policy(config));
    if let Some(timeout) = config.request_timeout() {
        predict = predict.with_request_timeout(timeout);
    }
    if let Some(timeout) = config.connect_timeout() {
        predict = predict.with_connect_timeout(timeout);
    }
    tracing::debug!(endpoint = %predict.endpoint(), "Prediction client configured");
    Ok(PredictionClient::new(predict)?)
}

fn retry_policy(config: &SentinelConfig) -> RetryPolicy {
    let Some(retry) = config.retry() else {
        return RetryPolicy::Never;
    };
    let defaults = RetryConfig::default();
    RetryPolicy::Backoff(RetryConfig {
        max_retries: retry.max_retries.unwrap_or(defaults.max_retries),
        initial_delay: retry
            .initial_delay_ms
            .map_or(defaults.initial_delay, Duration::from_millis),
        max_delay: retry
            .max_delay_ms
            .map_or(defaults.max_delay, Duration::from_millis),
        jitter_factor: defaults.jitter_factor,
    })
}

pub(crate) struct LedgerHandles {
    pub(crate) write: Arc<dyn LedgerWrite>,
    pub(crate) read: Arc<dyn LedgerRead>,
}

pub(crate) fn open_ledger(config: &SentinelConfig) -> Result<LedgerHandles> {
    match config.ledger_backend() {
        LedgerBackend::Sqlite => {
            let path = config
                .ledger_path()
                .or_else(default_ledger_path)
                .context("cannot determine ledger path; set [ledger] path in the config")?;
            let ledger = Arc::new(
                SqliteLedger::open(&path)
                    .with_context(|| format!("failed to open ledger at {}", path.display()))?,
            );
            tracing::info!(path = %path.display(), "Using SQLite ledger");
            let write: Arc<dyn LedgerWrite> = ledger.clone();
            let read: Arc<dyn LedgerRead> = ledger;
            Ok(LedgerHandles { write, read })
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using in-memory ledger; records are lost when the process exits");
            let ledger = MemoryLedger::new(MiningMode::Instant);
            let write: Arc<dyn LedgerWrite> = ledger.clone();
            let read: Arc<dyn LedgerRead> = ledger;
            Ok(LedgerHandles { write, read })
        }
    }
}

/// Reader for `sentinel records`.
///
/// An in-memory ledger lives only as long as the process that wrote it, so a
/// fresh process has nothing it could read. That is reported as an
/// unavailable reader rather than an empty ledger.
pub(crate) fn record_reader(config: &SentinelConfig) -> Result<LedgerReader> {
    match config.ledger_backend() {
        LedgerBackend::Memory => {
            tracing::warn!("In-memory ledger has no records outside the committing process");
            Ok(LedgerReader::unavailable())
        }
        LedgerBackend::Sqlite => Ok(LedgerReader::new(open_ledger(config)?.read)),
    }
}

/// `pre_approved` skips the terminal prompt even when the config asks for it.
pub(crate) fn authorizer(config: &SentinelConfig, pre_approved: bool) -> Arc<dyn Authorizer> {
    let signer = ConfiguredSigner::new(config.signer_account());
    if config.require_approval() && !pre_approved {
        Arc::new(ApprovalGate::new(signer, TerminalApproval))
    } else {
        Arc::new(signer)
    }
}

pub(crate) fn session(
    config: &SentinelConfig,
    pre_approved: bool,
) -> Result<(Session, mpsc::UnboundedReceiver<CommitProgress>)> {
    let client = prediction_client(config)?;
    let ledger = open_ledger(config)?;

    let mut writer = LedgerWriter::new(authorizer(config, pre_approved), ledger.write);
    if let Some(timeout) = config.confirmation_timeout() {
        writer = writer.with_confirmation_timeout(timeout);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let session =
        Session::new(client, writer, LedgerReader::new(ledger.read)).with_progress(tx);
    Ok((session, rx))
}
