use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tally_client::{FileStorage, SessionStore, TokenStorage};

/// `$TALLY_HOME`, or `~/.tally`.
pub fn tally_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".tally"))
}

pub fn ensure_tally_home() -> Result<PathBuf> {
    let dir = tally_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn session_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("session.json"))
}

pub fn open_session() -> Result<SessionStore<FileStorage>> {
    let p = session_path()?;
    SessionStore::open(FileStorage::new(&p)).with_context(|| format!("load session from {}", p.display()))
}

/// Delete the session file without reading it.
pub fn discard_session() -> Result<()> {
    FileStorage::new(session_path()?).clear()
}
