//! Predict, commit, list: the whole workflow against a mock service.

use std::sync::Arc;

use sentinel_engine::SessionPhase;
use sentinel_ledger::{LedgerRead, LedgerReader, SqliteLedger};
use tempfile::tempdir;
use wiremock::MockServer;

use crate::common::{RecordingLedger, SIGNER, mount_prediction, reading, session, warning_diagnosis};

#[tokio::test]
async fn warning_is_formatted_committed_and_listed() {
    let server = MockServer::start().await;
    mount_prediction(&server, 200, warning_diagnosis()).await;
    let ledger = RecordingLedger::new();
    let mut session = session(&server, &ledger, Some(SIGNER));

    let before = session.list_records().await.unwrap().len();

    let ticket = session.predict(&reading()).await.unwrap();
    assert_eq!(session.recommendations(), ["replace tool"]);

    session.commit(ticket).await.unwrap();

    let submitted = ledger.submitted();
    assert_eq!(submitted.len(), 1);
    let (signer, payload) = &submitted[0];
    assert_eq!(signer, SIGNER);
    assert_eq!(payload.machine_id(), "MACH-001");
    assert_eq!(payload.prediction(), "Warning");
    assert_eq!(payload.recommendation(), "replace tool");

    let records = session.list_records().await.unwrap();
    assert_eq!(records.len(), before + 1);
    let newest = records.last().unwrap();
    assert_eq!(newest.condition, "Warning");
    assert_eq!(newest.machine_id, "MACH-001");
    assert_eq!(session.phase(), SessionPhase::Committed);
}

#[tokio::test]
async fn long_recommendation_is_committed_as_first_500_chars() {
    let server = MockServer::start().await;
    let advice = "lubricate spindle bearings ".repeat(25);
    let advice = advice.trim_end();
    assert!(advice.chars().count() > 600);
    mount_prediction(
        &server,
        200,
        serde_json::json!({
            "machine_id": "MACH-001",
            "prediction": "Warning",
            "recommendation": advice
        }),
    )
    .await;
    let ledger = RecordingLedger::new();
    let mut session = session(&server, &ledger, Some(SIGNER));

    let ticket = session.predict(&reading()).await.unwrap();
    session.commit(ticket).await.unwrap();

    let stored = ledger.record_at(0).await.unwrap();
    assert_eq!(stored.recommendation.chars().count(), 500);
    assert!(advice.starts_with(&stored.recommendation));
}

#[tokio::test]
async fn sqlite_ledger_keeps_records_for_the_next_session() {
    let server = MockServer::start().await;
    mount_prediction(&server, 200, warning_diagnosis()).await;
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    {
        let ledger = Arc::new(SqliteLedger::open(&path).unwrap());
        let mut session = session(&server, &ledger, Some(SIGNER));
        let ticket = session.predict(&reading()).await.unwrap();
        let receipt = session.commit(ticket).await.unwrap();
        assert_eq!(receipt.index, 0);
    }

    let reopened = Arc::new(SqliteLedger::open(&path).unwrap());
    let records = LedgerReader::new(reopened).fetch_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].condition, "Warning");
    assert_eq!(records[0].recommendation, "replace tool");
}

#[tokio::test]
async fn listing_snapshot_excludes_later_commits() {
    let server = MockServer::start().await;
    mount_prediction(&server, 200, warning_diagnosis()).await;
    let ledger = RecordingLedger::new();
    let mut session = session(&server, &ledger, Some(SIGNER));

    let ticket = session.predict(&reading()).await.unwrap();
    session.commit(ticket).await.unwrap();
    let first = session.list_records().await.unwrap();

    let ticket = session.predict(&reading()).await.unwrap();
    session.commit(ticket).await.unwrap();
    let second = session.list_records().await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert_eq!(first[0], second[0]);
    assert_eq!(second[1].index, 1);
}
