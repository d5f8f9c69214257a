pub mod db;
pub mod features;
pub mod records;
pub mod scoring;
pub mod settings;

use crate::error::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-workspace directory holding `settings.json` and `state.db`.
pub const STATE_DIR: &str = ".equityengine";

pub fn ensure_state_dir(workspace_path: &str) -> Result<PathBuf> {
    let dir = Path::new(workspace_path).join(STATE_DIR);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Creates the state directory if needed and opens the migrated database.
pub fn open_workspace(workspace_path: &str) -> Result<Connection> {
    ensure_state_dir(workspace_path)?;
    let conn = db::get_db_connection(workspace_path)?;
    log::debug!("opened workspace database under {workspace_path}");
    Ok(conn)
}

/// Starts a write transaction that takes the database write lock up front, so
/// a read-check-write sequence cannot interleave with another writer.
pub(crate) fn write_transaction(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}
