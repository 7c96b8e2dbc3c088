//! Data model: hash-linked blocks and the in-memory ledger with its derived views.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::storage::{ChainStore, StorageError};

/// Payload text of the genesis block.
pub const GENESIS_LABEL: &str = "Bloc de Genèse — Terra Incognita";

/// Grid side length; valid coordinates are `0..GRID_SIZE`.
pub const GRID_SIZE: u32 = 100;

/// Closed palette: hex color -> terrain label. `terrain` on a claim is always
/// derived from this table, never accepted from the client.
pub const PALETTE: [(&str, &str); 4] = [
    ("#8B6040", "terre"),
    ("#6BAADD", "eau"),
    ("#4CAF50", "végétation"),
    ("#E53935", "ville"),
];

/// Look up the terrain label bound to a palette color.
pub fn terrain_for_color(color: &str) -> Option<&'static str> {
    PALETTE
        .iter()
        .find(|(c, _)| *c == color)
        .map(|(_, terrain)| *terrain)
}

/// One accepted cell claim. Field order is canonical: the block hash commits
/// to the compact JSON of this struct in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimPayload {
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub terrain: String,
    pub owner: String,
}

/// Block payload: the genesis marker text or one accepted claim.
///
/// Serialized untagged so the persisted layout keeps the original file format
/// (genesis data is a bare string, claim data an object).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Genesis(String),
    Claim(ClaimPayload),
}

impl BlockData {
    /// Compact JSON used as the canonical form inside the block hash.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("block data json")
    }

    /// The claim payload, if this is not the genesis marker.
    pub fn as_claim(&self) -> Option<&ClaimPayload> {
        match self {
            BlockData::Genesis(_) => None,
            BlockData::Claim(payload) => Some(payload),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// 0-indexed position in the chain (0 = genesis).
    pub index: u64,
    /// RFC3339 creation time; opaque, never used for ordering.
    pub timestamp: String,
    pub data: BlockData,
    /// Hash of the preceding block; `"0"` for genesis.
    #[serde(rename = "previousHash")]
    pub previous_hash: String,
    /// SHA-256 hex of (index || previousHash || timestamp || canonical(data)).
    pub hash: String,
}

impl Block {
    /// Build a block and fix its hash at creation time. The stored hash is
    /// never recomputed afterwards; validation re-derives and compares.
    pub fn new(index: u64, timestamp: String, data: BlockData, previous_hash: String) -> Self {
        let mut block = Block {
            index,
            timestamp,
            data,
            previous_hash,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The fixed first entry, created once when no persisted chain is found.
    pub fn genesis() -> Self {
        Block::new(
            0,
            now_timestamp(),
            BlockData::Genesis(GENESIS_LABEL.to_string()),
            "0".to_string(),
        )
    }

    /// Recompute the digest from the block's own fields. Pure and
    /// deterministic: same fields, same digest.
    pub fn compute_hash(&self) -> String {
        hash_concat(&[
            self.index.to_string().as_bytes(),
            self.previous_hash.as_bytes(),
            self.timestamp.as_bytes(),
            self.data.canonical_json().as_bytes(),
        ])
    }
}

/// Hash inputs (concatenate as bytes, SHA-256) and return lowercase hex.
pub fn hash_concat(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    hex::encode(hasher.finalize())
}

/// Current time as an RFC3339 string.
pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("rfc3339 timestamp")
}

/// State of one owned cell in the derived grid view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellState {
    pub color: String,
    pub owner: String,
    pub timestamp: String,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub count: u64,
}

/// Summary counters reported at startup and by `stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub total_blocks: u64,
    pub is_valid: bool,
}

/// The append-only, hash-linked block sequence; sole source of truth for
/// ownership history. All read views are recomputed from the chain on demand,
/// so there is no cached state that could desynchronize.
#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    store: ChainStore,
}

impl Ledger {
    /// Load the persisted chain through the store, falling back to a fresh
    /// genesis chain when nothing (readable) is on disk.
    pub fn open(store: ChainStore) -> Self {
        let chain = store.load().unwrap_or_else(|| vec![Block::genesis()]);
        Ledger { chain, store }
    }

    /// Full block sequence, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Most recently appended block. The genesis block guarantees the chain
    /// is never empty.
    pub fn latest(&self) -> &Block {
        self.chain.last().expect("chain contains genesis")
    }

    /// True iff some non-genesis block already claims `(x, y)`. Scans the
    /// full history; this is the uniqueness oracle the claim protocol
    /// consults.
    pub fn is_cell_owned(&self, x: u32, y: u32) -> bool {
        self.chain
            .iter()
            .filter_map(|b| b.data.as_claim())
            .any(|claim| claim.x == x && claim.y == y)
    }

    /// Link, hash and push a new claim block, then rewrite the persisted
    /// chain. On a persistence failure the in-memory push is rolled back so
    /// memory and disk never diverge.
    pub fn append(&mut self, payload: ClaimPayload) -> Result<Block, StorageError> {
        let block = Block::new(
            self.chain.len() as u64,
            now_timestamp(),
            BlockData::Claim(payload),
            self.latest().hash.clone(),
        );
        self.chain.push(block.clone());
        if let Err(err) = self.store.save(&self.chain) {
            self.chain.pop();
            return Err(err);
        }
        Ok(block)
    }

    /// Walk the chain from index 1 and check every block's stored hash
    /// against its recomputed digest and its linkage to the predecessor.
    pub fn validate(&self) -> bool {
        for i in 1..self.chain.len() {
            let current = &self.chain[i];
            let previous = &self.chain[i - 1];
            if current.hash != current.compute_hash() {
                return false;
            }
            if current.previous_hash != previous.hash {
                return false;
            }
        }
        true
    }

    /// Current grid, folded over all non-genesis blocks in index order. The
    /// uniqueness invariant makes every key appear at most once.
    pub fn grid_state(&self) -> BTreeMap<String, CellState> {
        let mut grid = BTreeMap::new();
        for block in &self.chain {
            if let Some(claim) = block.data.as_claim() {
                grid.insert(
                    format!("{},{}", claim.x, claim.y),
                    CellState {
                        color: claim.color.clone(),
                        owner: claim.owner.clone(),
                        timestamp: block.timestamp.clone(),
                    },
                );
            }
        }
        grid
    }

    /// Owners ranked by claimed-cell count, descending; ties keep first-seen
    /// order (stable sort over the insertion-ordered tally).
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut tally: Vec<LeaderboardEntry> = Vec::new();
        for block in &self.chain {
            if let Some(claim) = block.data.as_claim() {
                match tally.iter_mut().find(|e| e.name == claim.owner) {
                    Some(entry) => entry.count += 1,
                    None => tally.push(LeaderboardEntry {
                        name: claim.owner.clone(),
                        count: 1,
                    }),
                }
            }
        }
        tally.sort_by(|a, b| b.count.cmp(&a.count));
        tally.truncate(limit);
        tally
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            total_blocks: self.chain.len() as u64,
            is_valid: self.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn claim(x: u32, y: u32, owner: &str) -> ClaimPayload {
        ClaimPayload {
            x,
            y,
            color: "#4CAF50".to_string(),
            terrain: "végétation".to_string(),
            owner: owner.to_string(),
        }
    }

    #[test]
    fn fresh_ledger_starts_at_genesis() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(ChainStore::new(dir.path()));
        assert_eq!(ledger.blocks().len(), 1);
        let genesis = ledger.latest();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.data, BlockData::Genesis(GENESIS_LABEL.to_string()));
        assert!(ledger.validate());
    }

    #[test]
    fn compute_hash_is_deterministic_and_field_sensitive() {
        let block = Block::new(
            1,
            "2026-01-01T00:00:00Z".to_string(),
            BlockData::Claim(claim(3, 4, "0xAAAA000000")),
            "abc".to_string(),
        );
        assert_eq!(block.compute_hash(), block.compute_hash());

        let mut tampered = block.clone();
        tampered.timestamp = "2026-01-01T00:00:01Z".to_string();
        assert_ne!(block.compute_hash(), tampered.compute_hash());

        let mut tampered = block.clone();
        tampered.previous_hash = "abd".to_string();
        assert_ne!(block.compute_hash(), tampered.compute_hash());

        let mut tampered = block.clone();
        tampered.data = BlockData::Claim(claim(3, 5, "0xAAAA000000"));
        assert_ne!(block.compute_hash(), tampered.compute_hash());
    }

    #[test]
    fn canonical_json_matches_wire_shape() {
        let data = BlockData::Claim(claim(5, 5, "0xDEADBEEF00"));
        assert_eq!(
            data.canonical_json(),
            r##"{"x":5,"y":5,"color":"#4CAF50","terrain":"végétation","owner":"0xDEADBEEF00"}"##
        );
        let genesis = BlockData::Genesis("bloc".to_string());
        assert_eq!(genesis.canonical_json(), "\"bloc\"");
    }

    #[test]
    fn append_links_blocks_and_keeps_chain_valid() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        let first = ledger.append(claim(1, 2, "0xAAAA000000")).unwrap();
        let second = ledger.append(claim(2, 2, "0xAAAA000000")).unwrap();

        assert_eq!(first.index, 1);
        assert_eq!(second.index, 2);
        assert_eq!(second.previous_hash, first.hash);
        assert!(ledger.validate());
    }

    #[test]
    fn validate_rejects_tampered_payload() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        ledger.append(claim(1, 1, "0xAAAA000000")).unwrap();
        ledger.append(claim(2, 1, "0xAAAA000000")).unwrap();
        assert!(ledger.validate());

        ledger.chain[1].data = BlockData::Claim(claim(9, 9, "0xEEEE000000"));
        assert!(!ledger.validate());
    }

    #[test]
    fn validate_rejects_broken_linkage() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        ledger.append(claim(1, 1, "0xAAAA000000")).unwrap();
        ledger.append(claim(2, 1, "0xAAAA000000")).unwrap();

        // Re-hash block 1 consistently; block 2 now points at a stale hash.
        ledger.chain[1].timestamp = "1999-01-01T00:00:00Z".to_string();
        ledger.chain[1].hash = ledger.chain[1].compute_hash();
        assert!(!ledger.validate());
    }

    #[test]
    fn cell_ownership_ignores_genesis_and_matches_claims() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        assert!(!ledger.is_cell_owned(0, 0));
        ledger.append(claim(7, 8, "0xAAAA000000")).unwrap();
        assert!(ledger.is_cell_owned(7, 8));
        assert!(!ledger.is_cell_owned(8, 7));
    }

    #[test]
    fn grid_state_maps_cells_to_owner_and_color() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        ledger.append(claim(7, 8, "0xAAAA000000")).unwrap();
        let grid = ledger.grid_state();
        assert_eq!(grid.len(), 1);
        let cell = &grid["7,8"];
        assert_eq!(cell.color, "#4CAF50");
        assert_eq!(cell.owner, "0xAAAA000000");
    }

    #[test]
    fn leaderboard_sorts_by_count_then_first_seen() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        for (i, owner) in ["A", "A", "B", "A", "C"].iter().enumerate() {
            ledger.append(claim(i as u32, 0, owner)).unwrap();
        }

        let board = ledger.leaderboard(10);
        assert_eq!(
            board,
            vec![
                LeaderboardEntry { name: "A".to_string(), count: 3 },
                LeaderboardEntry { name: "B".to_string(), count: 1 },
                LeaderboardEntry { name: "C".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn leaderboard_truncates_to_limit() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        for i in 0..5 {
            ledger.append(claim(i, 1, &format!("owner-{i}"))).unwrap();
        }
        assert_eq!(ledger.leaderboard(3).len(), 3);
    }

    #[test]
    fn stats_reports_length_and_integrity() {
        let dir = tempdir().unwrap();
        let mut ledger = Ledger::open(ChainStore::new(dir.path()));
        ledger.append(claim(1, 1, "0xAAAA000000")).unwrap();
        let stats = ledger.stats();
        assert_eq!(stats.total_blocks, 2);
        assert!(stats.is_valid);
    }

    #[test]
    fn palette_lookup() {
        assert_eq!(terrain_for_color("#4CAF50"), Some("végétation"));
        assert_eq!(terrain_for_color("#8B6040"), Some("terre"));
        assert_eq!(terrain_for_color("#123456"), None);
    }
}
