// Durable checkpoint persistence.
//
// A `Checkpoint` is a full snapshot of a build session — phase, progress,
// agent state, and the blueprint itself — sufficient to reconstruct a
// resumable session from the newest one alone. Checkpoints are immutable
// once written and strictly append-ordered per session.
//
// `CheckpointStore` owns a directory holding one JSON file per checkpoint,
// named `{session_id}_checkpoint_{n}.json`, plus an `index.json` manifest
// mapping session id to checkpoint count and last-known phase. The manifest
// is authoritative for discovery and listing — filenames are for humans and
// are never globbed, so session ids sharing a prefix cannot be confused.
//
// Writes are durable: serialized to a temp file, flushed to disk, then
// atomically renamed into place. A crash immediately after `save` returns
// can never lose that checkpoint, and a crash mid-write can never corrupt
// an existing one.
//
// See also: `session.rs` for checkpoint creation/restore, `manager.rs` for
// session listing and resume.

use crate::blueprint::Blueprint;
use crate::error::CheckpointError;
use crate::session::{BuildProgress, Phase};
use crate::types::{BlockPos, ItemStack, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Full snapshot of a build session at one instant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Driver-time instant (see `schedule::Clock`).
    pub timestamp_ms: u64,
    /// Wall-clock creation time, RFC 3339, for humans browsing the store.
    pub created_at: String,
    pub session_id: SessionId,
    pub phase: Phase,
    pub progress: BuildProgress,
    /// Best-effort: `None` if the position query faulted at save time.
    pub agent_position: Option<BlockPos>,
    /// Best-effort inventory snapshot.
    pub inventory: Vec<ItemStack>,
    pub description: String,
    pub blueprint: Blueprint,
}

/// One row of the session listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub checkpoints: u32,
    pub last_phase: Phase,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct IndexEntry {
    checkpoints: u32,
    last_phase: Phase,
    updated_at: String,
}

/// The `index.json` manifest. Session ids map to their entry; `BTreeMap`
/// keeps the serialized form and the listing in deterministic order.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreIndex {
    sessions: BTreeMap<String, IndexEntry>,
}

/// Directory-backed checkpoint store.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn checkpoint_path(&self, id: &SessionId, ordinal: u32) -> PathBuf {
        self.root
            .join(format!("{}_checkpoint_{ordinal:04}.json", id.as_str()))
    }

    fn read_index(&self) -> Result<StoreIndex, CheckpointError> {
        match fs::read_to_string(self.index_path()) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreIndex::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a checkpoint for its session. Returns the ordinal assigned
    /// (0-based, strictly increasing per session). The write is flushed
    /// before this returns.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<u32, CheckpointError> {
        fs::create_dir_all(&self.root)?;
        let mut index = self.read_index()?;
        let entry = index
            .sessions
            .entry(checkpoint.session_id.as_str().to_string())
            .or_insert(IndexEntry {
                checkpoints: 0,
                last_phase: checkpoint.phase,
                updated_at: checkpoint.created_at.clone(),
            });
        let ordinal = entry.checkpoints;
        entry.checkpoints = ordinal + 1;
        entry.last_phase = checkpoint.phase;
        entry.updated_at = checkpoint.created_at.clone();

        let path = self.checkpoint_path(&checkpoint.session_id, ordinal);
        write_durable(&path, &serde_json::to_vec_pretty(checkpoint)?)?;
        write_durable(&self.index_path(), &serde_json::to_vec_pretty(&index)?)?;
        Ok(ordinal)
    }

    /// The newest checkpoint for a session, or `None` if the manifest has
    /// no such session (including when the store directory is absent).
    pub fn latest(&self, id: &SessionId) -> Result<Option<Checkpoint>, CheckpointError> {
        let index = self.read_index()?;
        let Some(entry) = index.sessions.get(id.as_str()) else {
            return Ok(None);
        };
        if entry.checkpoints == 0 {
            return Ok(None);
        }
        let path = self.checkpoint_path(id, entry.checkpoints - 1);
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// All known sessions with their checkpoint counts, in id order.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, CheckpointError> {
        let index = self.read_index()?;
        Ok(index
            .sessions
            .into_iter()
            .map(|(id, entry)| SessionSummary {
                session_id: SessionId::from_string(id),
                checkpoints: entry.checkpoints,
                last_phase: entry.last_phase,
                updated_at: entry.updated_at,
            })
            .collect())
    }
}

/// Write bytes to `path` via a flushed temp file and atomic rename.
fn write_durable(path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
