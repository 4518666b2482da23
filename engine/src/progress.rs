use std::fmt;

use sentinel_types::TxHash;

/// Step boundary reached while committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitProgress {
    Requested,
    Connected { account: String },
    Sent { tx_hash: TxHash },
    Confirmed { tx_hash: TxHash },
    Failed { message: String },
}

impl fmt::Display for CommitProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitProgress::Requested => f.write_str("Requesting signer authorization..."),
            CommitProgress::Connected { account } => {
                write!(f, "Connected as {account}. Preparing transaction...")
            }
            CommitProgress::Sent { tx_hash } => {
                write!(f, "Transaction sent: {tx_hash}. Waiting for confirmation...")
            }
            CommitProgress::Confirmed { tx_hash } => write!(f, "Confirmed: {tx_hash}"),
            CommitProgress::Failed { message } => write!(f, "Transaction error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use sentinel_types::TxHash;

    use super::CommitProgress;

    #[test]
    fn messages() {
        let hash = TxHash::new("0xabc");
        assert_eq!(
            CommitProgress::Requested.to_string(),
            "Requesting signer authorization..."
        );
        assert_eq!(
            CommitProgress::Connected {
                account: "plant-7".to_string()
            }
            .to_string(),
            "Connected as plant-7. Preparing transaction..."
        );
        assert_eq!(
            CommitProgress::Sent {
                tx_hash: hash.clone()
            }
            .to_string(),
            "Transaction sent: 0xabc. Waiting for confirmation..."
        );
        assert_eq!(
            CommitProgress::Confirmed { tx_hash: hash }.to_string(),
            "Confirmed: 0xabc"
        );
        assert_eq!(
            CommitProgress::Failed {
                message: "denied".to_string()
            }
            .to_string(),
            "Transaction error: denied"
        );
    }
}
