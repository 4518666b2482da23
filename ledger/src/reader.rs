//! Enumerates every record on the ledger.

use std::fmt;
use std::sync::Arc;

use futures_util::future::try_join_all;
use sentinel_types::LedgerRecord;

use crate::{LedgerError, LedgerRead};

#[derive(Clone, Default)]
pub struct LedgerReader {
    source: Option<Arc<dyn LedgerRead>>,
}

impl fmt::Debug for LedgerReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerReader")
            .field("available", &self.is_available())
            .finish()
    }
}

impl LedgerReader {
    pub fn new(source: Arc<dyn LedgerRead>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// A reader with no read capability. Every fetch fails with
    /// [`LedgerError::ReaderUnavailable`].
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.source.is_some()
    }

    /// Read the count once, then every index below it.
    ///
    /// Records appended after the count was read are not included. Indexed
    /// reads run concurrently; the result is in index order and the first
    /// failing read fails the whole call.
    pub async fn fetch_all(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let Some(source) = &self.source else {
            return Err(LedgerError::ReaderUnavailable(
                "no ledger read capability is configured".to_string(),
            ));
        };

        let count = source.record_count().await?;
        let reads = (0..count).map(|index| async move {
            let raw = source.record_at(index).await?;
            Ok::<_, LedgerError>(LedgerRecord::from_raw(index, raw)?)
        });
        let records = try_join_all(reads).await?;

        tracing::debug!(count, "Fetched ledger records");
        Ok(records)
    }
}
