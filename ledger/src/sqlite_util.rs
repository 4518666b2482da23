//! Secure-filesystem helpers for the SQLite ledger file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::LedgerError;

/// Open a SQLite database at `path`, creating an owner-only parent
/// directory (0o700) and database file (0o600) on Unix.
pub(crate) fn open_secure_db(path: &Path) -> Result<Connection, LedgerError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_secure_dir(parent)?;
    }
    ensure_secure_db_file(path)?;

    Connection::open(path).map_err(|e| {
        LedgerError::storage(&format!("failed to open ledger at {}", path.display()), e)
    })
}

fn ensure_secure_dir(path: &Path) -> Result<(), LedgerError> {
    std::fs::create_dir_all(path).map_err(|e| {
        LedgerError::storage(&format!("failed to create directory {}", path.display()), e)
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let metadata = std::fs::metadata(path).map_err(|e| {
            LedgerError::storage(&format!("failed to read metadata of {}", path.display()), e)
        })?;

        let our_uid = unsafe { libc::getuid() };
        if metadata.uid() != our_uid {
            return Ok(());
        }

        if metadata.permissions().mode() & 0o077 != 0 {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).map_err(
                |e| {
                    LedgerError::storage(
                        &format!("failed to set permissions on {}", path.display()),
                        e,
                    )
                },
            )?;
        }
    }
    Ok(())
}

fn ensure_secure_db_file(path: &Path) -> Result<(), LedgerError> {
    if !path.exists() {
        let mut options = OpenOptions::new();
        options.create(true).truncate(false).read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.open(path).map_err(|e| {
            LedgerError::storage(&format!("failed to create {}", path.display()), e)
        })?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
            LedgerError::storage(&format!("failed to set permissions on {}", path.display()), e)
        })?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = sidecar_path(path, suffix);
            if sidecar.exists() {
                let _ = std::fs::set_permissions(&sidecar, std::fs::Permissions::from_mode(0o600));
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    match path.file_name() {
        Some(name) => path.with_file_name(format!("{}{suffix}", name.to_string_lossy())),
        None => PathBuf::from(format!("{}{suffix}", path.display())),
    }
}
