//! Durable single-node ledger stored in SQLite.
//!
//! Submitted transactions sit in `pending_txs` until the first `wait` for
//! them, which mines every pending transaction in submission order inside a
//! single `IMMEDIATE` SQL transaction, so handles in separate processes
//! sharing one file serialize their mining instead of racing on the write
//! lock. Mined rows are never updated or deleted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use sentinel_types::{CondensedDiagnosis, RawRecord, TxHash};
use tokio::sync::Mutex;

use crate::backend::{compute_tx_hash, contract_violation, now_secs};
use crate::sqlite_util::open_secure_db;
use crate::{LedgerError, LedgerFut, LedgerRead, LedgerWrite, SigningIdentity, TxOutcome};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `~/.sentinel/ledger.db`, or `None` when the home directory is unknown.
#[must_use]
pub fn default_ledger_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sentinel").join("ledger.db"))
}

pub struct SqliteLedger {
    db: Mutex<Connection>,
    nonce: AtomicU64,
}

impl SqliteLedger {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS records (
            idx INTEGER PRIMARY KEY,
            machine_id TEXT NOT NULL,
            condition TEXT NOT NULL,
            recommendation TEXT NOT NULL,
            timestamp_secs INTEGER NOT NULL,
            tx_hash TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS pending_txs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            tx_hash TEXT NOT NULL UNIQUE,
            signer TEXT NOT NULL,
            machine_id TEXT NOT NULL,
            condition TEXT NOT NULL,
            recommendation TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reverted_txs (
            tx_hash TEXT PRIMARY KEY,
            reason TEXT NOT NULL
        );
    ";

    /// Open or create the ledger database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let db = open_secure_db(path)?;
        tracing::debug!(path = %path.display(), "Opened SQLite ledger");
        Self::initialize(db)
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let db = Connection::open_in_memory()
            .map_err(|e| LedgerError::storage("failed to open in-memory ledger", e))?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self, LedgerError> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .map_err(|e| LedgerError::storage("failed to set ledger pragmas", e))?;
        db.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| LedgerError::storage("failed to set ledger busy timeout", e))?;
        db.execute_batch(Self::SCHEMA)
            .map_err(|e| LedgerError::storage("failed to create ledger schema", e))?;
        Ok(Self {
            db: Mutex::new(db),
            nonce: AtomicU64::new(0),
        })
    }

    fn next_nonce(&self) -> String {
        let seq = self.nonce.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{nanos}:{seq}")
    }
}

fn lookup_outcome(db: &Connection, hash: &str) -> Result<Option<TxOutcome>, LedgerError> {
    let mined = db
        .query_row(
            "SELECT idx, timestamp_secs FROM records WHERE tx_hash = ?1",
            params![hash],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;
    if let Some((index, timestamp_secs)) = mined {
        return Ok(Some(TxOutcome::Mined {
            index: index as u64,
            timestamp_secs: timestamp_secs as u64,
        }));
    }

    let reverted = db
        .query_row(
            "SELECT reason FROM reverted_txs WHERE tx_hash = ?1",
            params![hash],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(reverted.map(|reason| TxOutcome::Reverted { reason }))
}

/// Mine every pending transaction. Returns how many were processed.
fn mine_pending(db: &mut Connection, now: u64) -> Result<usize, LedgerError> {
    let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let pending: Vec<(i64, String, String, String, String)> = {
        let mut stmt = tx.prepare(
            "SELECT seq, tx_hash, machine_id, condition, recommendation
             FROM pending_txs ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?;
        rows.collect::<Result<_, _>>()?
    };

    let mut next_index: i64 = tx.query_row(
        "SELECT COALESCE(MAX(idx) + 1, 0) FROM records",
        [],
        |row| row.get(0),
    )?;

    for (seq, hash, machine_id, condition, recommendation) in &pending {
        match contract_violation(machine_id, recommendation) {
            Some(reason) => {
                tx.execute(
                    "INSERT INTO reverted_txs (tx_hash, reason) VALUES (?1, ?2)",
                    params![hash, reason],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO records (idx, machine_id, condition, recommendation, timestamp_secs, tx_hash)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![next_index, machine_id, condition, recommendation, now as i64, hash],
                )?;
                next_index += 1;
            }
        }
        tx.execute("DELETE FROM pending_txs WHERE seq = ?1", params![seq])?;
    }

    tx.commit()?;
    Ok(pending.len())
}

impl LedgerWrite for SqliteLedger {
    fn submit<'a>(
        &'a self,
        signer: &'a SigningIdentity,
        payload: &'a CondensedDiagnosis,
    ) -> LedgerFut<'a, TxHash> {
        Box::pin(async move {
            let hash = compute_tx_hash(signer, payload, &self.next_nonce());
            let db = self.db.lock().await;
            db.execute(
                "INSERT INTO pending_txs (tx_hash, signer, machine_id, condition, recommendation)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    hash.as_str(),
                    signer.account(),
                    payload.machine_id(),
                    payload.prediction(),
                    payload.recommendation()
                ],
            )
            .map_err(|e| LedgerError::storage("failed to submit transaction", e))?;
            Ok(hash)
        })
    }

    fn wait<'a>(&'a self, hash: &'a TxHash) -> LedgerFut<'a, TxOutcome> {
        Box::pin(async move {
            let mut db = self.db.lock().await;
            if let Some(outcome) = lookup_outcome(&db, hash.as_str())? {
                return Ok(outcome);
            }

            let mined = mine_pending(&mut db, now_secs())?;
            if mined > 0 {
                tracing::debug!(mined, "SQLite ledger mined pending transactions");
            }

            lookup_outcome(&db, hash.as_str())?
                .ok_or_else(|| LedgerError::Storage(format!("unknown transaction {hash}")))
        })
    }
}

impl LedgerRead for SqliteLedger {
    fn record_count(&self) -> LedgerFut<'_, u64> {
        Box::pin(async move {
            let db = self.db.lock().await;
            let count: i64 = db.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn record_at(&self, index: u64) -> LedgerFut<'_, RawRecord> {
        Box::pin(async move {
            let db = self.db.lock().await;
            let record = db
                .query_row(
                    "SELECT machine_id, condition, recommendation, timestamp_secs
                     FROM records WHERE idx = ?1",
                    params![index as i64],
                    |row| {
                        Ok(RawRecord {
                            machine_id: row.get(0)?,
                            condition: row.get(1)?,
                            recommendation: row.get(2)?,
                            timestamp_secs: row.get::<_, i64>(3)? as u64,
                        })
                    },
                )
                .optional()?;
            record.ok_or_else(|| LedgerError::Storage(format!("no record at index {index}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sentinel_types::CondensedDiagnosis;
    use tempfile::tempdir;

    use super::SqliteLedger;
    use crate::{LedgerRead, LedgerWrite, SigningIdentity, TxOutcome};

    fn signer() -> SigningIdentity {
        SigningIdentity::new("operator")
    }

    #[tokio::test]
    async fn pending_until_first_wait() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let payload = CondensedDiagnosis::new("MACH-001", "Warning", "replace tool");

        let hash = ledger.submit(&signer(), &payload).await.unwrap();
        assert_eq!(ledger.record_count().await.unwrap(), 0);

        let outcome = ledger.wait(&hash).await.unwrap();
        assert!(matches!(outcome, TxOutcome::Mined { index: 0, .. }));
        assert_eq!(ledger.record_count().await.unwrap(), 1);

        let again = ledger.wait(&hash).await.unwrap();
        assert_eq!(outcome, again);
    }

    #[tokio::test]
    async fn mines_in_submission_order() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let a = ledger
            .submit(&signer(), &CondensedDiagnosis::new("A", "Normal", ""))
            .await
            .unwrap();
        let b = ledger
            .submit(&signer(), &CondensedDiagnosis::new("B", "Normal", ""))
            .await
            .unwrap();

        assert!(matches!(ledger.wait(&b).await.unwrap(), TxOutcome::Mined { index: 1, .. }));
        assert!(matches!(ledger.wait(&a).await.unwrap(), TxOutcome::Mined { index: 0, .. }));
        assert_eq!(ledger.record_at(0).await.unwrap().machine_id, "A");
    }

    #[tokio::test]
    async fn identical_payloads_get_distinct_hashes() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let payload = CondensedDiagnosis::new("A", "Normal", "");
        let first = ledger.submit(&signer(), &payload).await.unwrap();
        let second = ledger.submit(&signer(), &payload).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn empty_machine_id_reverts() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let hash = ledger
            .submit(&signer(), &CondensedDiagnosis::new("", "Normal", ""))
            .await
            .unwrap();
        assert!(matches!(ledger.wait(&hash).await.unwrap(), TxOutcome::Reverted { .. }));
        assert_eq!(ledger.record_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            let hash = ledger
                .submit(
                    &signer(),
                    &CondensedDiagnosis::new("MACH-001", "Warning", "replace tool"),
                )
                .await
                .unwrap();
            ledger.wait(&hash).await.unwrap();
        }

        let reopened = SqliteLedger::open(&path).unwrap();
        assert_eq!(reopened.record_count().await.unwrap(), 1);
        let record = reopened.record_at(0).await.unwrap();
        assert_eq!(record.machine_id, "MACH-001");
        assert_eq!(record.condition, "Warning");
        assert_eq!(record.recommendation, "replace tool");
    }

    #[tokio::test]
    async fn pending_transactions_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let hash = {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger
                .submit(&signer(), &CondensedDiagnosis::new("A", "Normal", ""))
                .await
                .unwrap()
        };

        let reopened = SqliteLedger::open(&path).unwrap();
        assert!(matches!(
            reopened.wait(&hash).await.unwrap(),
            TxOutcome::Mined { index: 0, .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn handles_sharing_a_file_mine_each_transaction_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let first = Arc::new(SqliteLedger::open(&path).unwrap());
        let second = Arc::new(SqliteLedger::open(&path).unwrap());

        let mut waits = Vec::new();
        for (i, ledger) in [first.clone(), second.clone()]
            .into_iter()
            .cycle()
            .take(8)
            .enumerate()
        {
            let payload = CondensedDiagnosis::new(format!("MACH-{i}"), "Warning", "replace tool");
            let hash = ledger.submit(&signer(), &payload).await.unwrap();
            waits.push(tokio::spawn(async move { ledger.wait(&hash).await }));
        }

        let mut indices = Vec::new();
        for wait in waits {
            match wait.await.unwrap().unwrap() {
                TxOutcome::Mined { index, .. } => indices.push(index),
                TxOutcome::Reverted { reason } => panic!("unexpected revert: {reason}"),
            }
        }
        indices.sort_unstable();
        assert_eq!(indices, (0..8).collect::<Vec<u64>>());
        assert_eq!(first.record_count().await.unwrap(), 8);
        assert_eq!(second.record_count().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn unknown_hash_is_an_error() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let hash = sentinel_types::TxHash::new("0xnope");
        assert!(ledger.wait(&hash).await.is_err());
    }
}
