//! Signing authorization.

use std::fmt;

use crate::{LedgerError, LedgerFut};

/// An account that has been granted permission to sign ledger writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigningIdentity {
    account: String,
}

impl SigningIdentity {
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }
}

impl fmt::Display for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.account)
    }
}

/// Requests a signing capability from the host environment.
///
/// Implementations may prompt a human. They fail with
/// [`LedgerError::NoSignerAvailable`] when the environment has no signer and
/// [`LedgerError::AuthorizationDenied`] when the request is refused.
pub trait Authorizer: Send + Sync {
    fn authorize(&self) -> LedgerFut<'_, SigningIdentity>;
}

/// Authorizer backed by a configured account name.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSigner {
    account: Option<String>,
}

impl ConfiguredSigner {
    /// Blank account names count as no account.
    #[must_use]
    pub fn new(account: Option<String>) -> Self {
        let account = account
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        Self { account }
    }
}

impl Authorizer for ConfiguredSigner {
    fn authorize(&self) -> LedgerFut<'_, SigningIdentity> {
        Box::pin(async move {
            match &self.account {
                Some(account) => Ok(SigningIdentity::new(account.clone())),
                None => Err(LedgerError::NoSignerAvailable),
            }
        })
    }
}

/// Asks the operator to approve a signing request.
pub trait ApprovalPrompt: Send + Sync {
    /// Resolves to `true` only on explicit approval.
    fn approve<'a>(&'a self, account: &'a str) -> LedgerFut<'a, bool>;
}

/// Wraps an [`Authorizer`] with an operator approval step.
pub struct ApprovalGate<A, P> {
    inner: A,
    prompt: P,
}

impl<A, P> ApprovalGate<A, P> {
    pub fn new(inner: A, prompt: P) -> Self {
        Self { inner, prompt }
    }
}

impl<A: Authorizer, P: ApprovalPrompt> Authorizer for ApprovalGate<A, P> {
    fn authorize(&self) -> LedgerFut<'_, SigningIdentity> {
        Box::pin(async move {
            let identity = self.inner.authorize().await?;
            if self.prompt.approve(identity.account()).await? {
                tracing::info!(account = %identity, "Signing request approved");
                Ok(identity)
            } else {
                tracing::warn!(account = %identity, "Signing request denied");
                Err(LedgerError::AuthorizationDenied)
            }
        })
    }
}
