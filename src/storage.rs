//! Disk persistence for the chain (single JSON file, rewritten wholesale).

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::error;

use crate::model::Block;

/// Name of the chain file inside the data directory.
pub const CHAIN_FILE: &str = "blockchain.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whole-chain file store. Every save rewrites the full sequence, which is
/// O(chain length) per accepted claim; fine at a 100x100 grid's scale
/// (at most 10 000 claim blocks) but a ceiling for anything larger.
#[derive(Debug, Clone)]
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    /// Store rooted at `dir`; the chain lives in `dir/blockchain.json`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        ChainStore {
            path: dir.as_ref().join(CHAIN_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted chain if present. Stored hashes are trusted here;
    /// `Ledger::validate` is what re-checks them later. Returns `None` when
    /// the file is missing or unreadable — an unreadable file is loudly
    /// logged since falling back to genesis discards history.
    pub fn load(&self) -> Option<Vec<Block>> {
        if !self.path.exists() {
            return None;
        }
        let mut buf = String::new();
        if let Err(err) = File::open(&self.path).and_then(|mut f| f.read_to_string(&mut buf)) {
            error!(path = %self.path.display(), %err, "chain file unreadable, starting from genesis");
            return None;
        }
        match serde_json::from_str::<Vec<Block>>(&buf) {
            Ok(chain) => Some(chain),
            Err(err) => {
                error!(path = %self.path.display(), %err, "chain file corrupt, starting from genesis");
                None
            }
        }
    }

    /// Serialize and overwrite the full chain (pretty-printed).
    pub fn save(&self, chain: &[Block]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(chain)?;
        let mut f = File::create(&self.path)?;
        f.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Ensure that the given directory exists (create recursively if needed).
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
