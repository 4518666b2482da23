//! Shared fixtures: a mock prediction service and a ledger that records
//! what it was asked to write.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentinel_engine::Session;
use sentinel_ledger::{
    ConfiguredSigner, LedgerFut, LedgerRead, LedgerReader, LedgerWrite, LedgerWriter,
    MemoryLedger, MiningMode, SigningIdentity, TxOutcome,
};
use sentinel_predict::{PredictConfig, PredictionClient};
use sentinel_types::{CondensedDiagnosis, MachineId, MachineType, RawRecord, Reading, TxHash};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SIGNER: &str = "plant-7";

pub fn reading() -> Reading {
    Reading::new(MachineId::new("MACH-001").unwrap(), MachineType::HighPerformance)
}

pub fn warning_diagnosis() -> Value {
    json!({
        "machine_id": "MACH-001",
        "prediction": "Warning",
        "status": "Tool Wear Failure",
        "recommendation": "Remedy: replace tool\nRemedy: replace tool",
        "probabilities": {"Normal": 0.15, "Warning": 0.85}
    })
}

pub async fn mount_prediction(server: &MockServer, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

pub fn predict_url(server: &MockServer) -> String {
    format!("{}/predict", server.uri())
}

pub fn client(server: &MockServer) -> PredictionClient {
    PredictionClient::new(PredictConfig::new(&predict_url(server)).unwrap()).unwrap()
}

/// Ledger wrapper that remembers every submitted payload.
pub struct RecordingLedger {
    inner: Arc<MemoryLedger>,
    submitted: Mutex<Vec<(String, CondensedDiagnosis)>>,
}

impl RecordingLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryLedger::new(MiningMode::Instant),
            submitted: Mutex::new(Vec::new()),
        })
    }

    pub fn submitted(&self) -> Vec<(String, CondensedDiagnosis)> {
        self.submitted.lock().unwrap().clone()
    }
}

impl LedgerWrite for RecordingLedger {
    fn submit<'a>(
        &'a self,
        signer: &'a SigningIdentity,
        payload: &'a CondensedDiagnosis,
    ) -> LedgerFut<'a, TxHash> {
        self.submitted
            .lock()
            .unwrap()
            .push((signer.account().to_string(), payload.clone()));
        self.inner.submit(signer, payload)
    }

    fn wait<'a>(&'a self, hash: &'a TxHash) -> LedgerFut<'a, TxOutcome> {
        self.inner.wait(hash)
    }
}

impl LedgerRead for RecordingLedger {
    fn record_count(&self) -> LedgerFut<'_, u64> {
        self.inner.record_count()
    }

    fn record_at(&self, index: u64) -> LedgerFut<'_, RawRecord> {
        self.inner.record_at(index)
    }
}

pub fn session<L>(server: &MockServer, ledger: &Arc<L>, account: Option<&str>) -> Session
where
    L: LedgerWrite + LedgerRead + 'static,
{
    let writer = LedgerWriter::new(
        Arc::new(ConfiguredSigner::new(account.map(ToString::to_string))),
        ledger.clone(),
    )
    .with_confirmation_timeout(Duration::from_secs(5));
    Session::new(client(server), writer, LedgerReader::new(ledger.clone()))
}
