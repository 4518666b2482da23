//! Terminal approval for signing requests.

use std::io::{self, Write};

use sentinel_ledger::{ApprovalPrompt, LedgerFut};

/// Asks `[y/N]` on the terminal. Anything other than `y`/`yes`, including
/// end of input, is a refusal.
pub(crate) struct TerminalApproval;

impl ApprovalPrompt for TerminalApproval {
    fn approve<'a>(&'a self, account: &'a str) -> LedgerFut<'a, bool> {
        let question = format!("Sign ledger transaction as {account}? [y/N] ");
        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || ask(&question)).await;
            match answer {
                Ok(Ok(line)) => Ok(is_yes(&line)),
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "Failed to read approval answer");
                    Ok(false)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Approval prompt task failed");
                    Ok(false)
                }
            }
        })
    }
}

fn ask(question: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(question.as_bytes())?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
