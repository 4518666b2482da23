//! Ledger access for Sentinel.
//!
//! # Architecture
//!
//! - [`Authorizer`] - obtains a [`SigningIdentity`] from the host environment
//! - [`LedgerWrite`] / [`LedgerRead`] - the adapter contract a ledger must satisfy
//! - [`LedgerWriter`] - authorize, commit, await confirmation
//! - [`LedgerReader`] - count-then-index enumeration of every stored record
//! - [`MemoryLedger`] / [`SqliteLedger`] - the two bundled adapters
//!
//! The ledger is append-only. Index `i` always names the same record once it
//! has been observed, and the record count never decreases.

mod auth;
mod backend;
mod error;
mod memory;
mod reader;
mod sqlite;
mod sqlite_util;
mod writer;

use std::future::Future;
use std::pin::Pin;

pub use auth::{ApprovalGate, ApprovalPrompt, Authorizer, ConfiguredSigner, SigningIdentity};
pub use backend::{LedgerRead, LedgerWrite, TxOutcome};
pub use error::LedgerError;
pub use memory::{MemoryLedger, MiningMode};
pub use reader::LedgerReader;
pub use sentinel_types;
pub use sqlite::{SqliteLedger, default_ledger_path};
pub use writer::{DEFAULT_CONFIRMATION_TIMEOUT, LedgerWriter};

/// Boxed future returned by the ledger and authorization seams.
pub type LedgerFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;
