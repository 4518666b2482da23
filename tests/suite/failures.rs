//! Failures surface to the operator and never reach the ledger.

use std::net::TcpListener;
use std::sync::Arc;

use sentinel_engine::{Session, SessionError, SessionPhase};
use sentinel_ledger::{
    ApprovalGate, ApprovalPrompt, ConfiguredSigner, LedgerError, LedgerFut, LedgerReader,
    LedgerWriter,
};
use sentinel_predict::{PredictConfig, PredictError, PredictionClient};
use serde_json::json;
use wiremock::MockServer;

use crate::common::{
    RecordingLedger, SIGNER, client, mount_prediction, reading, session, warning_diagnosis,
};

#[tokio::test]
async fn unprocessable_reading_shows_service_detail() {
    let server = MockServer::start().await;
    mount_prediction(&server, 422, json!({"detail": "torque out of range"})).await;
    let ledger = RecordingLedger::new();
    let mut session = session(&server, &ledger, Some(SIGNER));

    let err = session.predict(&reading()).await.unwrap_err();

    assert_eq!(err.to_string(), "torque out of range");
    assert_eq!(session.phase(), SessionPhase::PredictFailed);
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn unreachable_service() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let ledger = RecordingLedger::new();
    let client = PredictionClient::new(
        PredictConfig::new(&format!("http://127.0.0.1:{port}/predict")).unwrap(),
    )
    .unwrap();
    let writer = LedgerWriter::new(
        Arc::new(ConfiguredSigner::new(Some(SIGNER.to_string()))),
        ledger.clone(),
    );
    let mut session = Session::new(client, writer, LedgerReader::new(ledger.clone()));

    let err = session.predict(&reading()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Predict(PredictError::Unreachable { .. })
    ));
}

struct Decline;

impl ApprovalPrompt for Decline {
    fn approve<'a>(&'a self, _account: &'a str) -> LedgerFut<'a, bool> {
        Box::pin(async { Ok(false) })
    }
}

#[tokio::test]
async fn operator_declining_keeps_diagnosis() {
    let server = MockServer::start().await;
    mount_prediction(&server, 200, warning_diagnosis()).await;
    let ledger = RecordingLedger::new();
    let writer = LedgerWriter::new(
        Arc::new(ApprovalGate::new(
            ConfiguredSigner::new(Some(SIGNER.to_string())),
            Decline,
        )),
        ledger.clone(),
    );
    let mut session = Session::new(client(&server), writer, LedgerReader::new(ledger.clone()));

    let ticket = session.predict(&reading()).await.unwrap();
    let err = session.commit(ticket).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Commit {
            source: LedgerError::AuthorizationDenied,
            ..
        }
    ));
    assert_eq!(session.phase(), SessionPhase::CommitFailed);
    assert_eq!(session.recommendations(), ["replace tool"]);
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn missing_signer_is_reported() {
    let server = MockServer::start().await;
    mount_prediction(&server, 200, warning_diagnosis()).await;
    let ledger = RecordingLedger::new();
    let mut session = session(&server, &ledger, None);

    let ticket = session.predict(&reading()).await.unwrap();
    let err = session.commit(ticket).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Commit {
            source: LedgerError::NoSignerAvailable,
            ..
        }
    ));
    assert!(ledger.submitted().is_empty());
}
