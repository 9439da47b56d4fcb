//! Whole-database snapshot persistence.
//!
//! A snapshot file is a concatenation of frames, each `u64` little-endian
//! compressed length followed by that many bytes of LZ4 block payload; the
//! payload decompresses to one canonical object serialization
//! ([`crate::object::codec`]). End-of-file or a zero length terminates the
//! stream. There is no file-level header or checksum.
//!
//! Objects are written cold end first so that a sequential reload rebuilds
//! the same sequence order.

pub mod autosnap;

use crate::config::EXPANSION_BOUND;
use crate::object::codec::{deserialize, serialize, CodecError};
use crate::store::Store;
use crate::verbosity;
use lz4_flex::block::{compress, decompress};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshot persistence failures.
#[derive(Debug)]
pub enum SnapshotError {
    /// Writing the snapshot file failed.
    Save(io::Error),
    /// Reading the snapshot file failed.
    Load(io::Error),
    /// A frame or object does not fit the remaining store capacity.
    SpaceLimit,
    /// An object could not be serialized.
    Codec(CodecError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Save(e) => write!(f, "snapshot save failed: {e}"),
            SnapshotError::Load(e) => write!(f, "snapshot load failed: {e}"),
            SnapshotError::SpaceLimit => write!(f, "snapshot exceeds db space limit"),
            SnapshotError::Codec(e) => write!(f, "snapshot object codec failure: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Maps a snapshot write error, aborting the process on disk exhaustion.
fn save_error(e: io::Error) -> SnapshotError {
    if e.kind() == io::ErrorKind::StorageFull {
        verbosity::fatal("out of disk while writing snapshot");
    }
    SnapshotError::Save(e)
}

// ─────────────────────────────────────────────────────────────────────────────
// Save
// ─────────────────────────────────────────────────────────────────────────────

/// Writes every object of `store` to `path`, truncating any previous
/// snapshot, and flushes the result to stable storage.
pub fn save(path: &Path, store: &Store) -> Result<(), SnapshotError> {
    let file = File::create(path).map_err(save_error)?;
    let mut w = BufWriter::new(file);

    for obj in store.iter() {
        let raw = serialize(obj).map_err(SnapshotError::Codec)?;
        let payload = compress(&raw);
        w.write_all(&(payload.len() as u64).to_le_bytes())
            .map_err(save_error)?;
        w.write_all(&payload).map_err(save_error)?;
    }

    w.flush().map_err(save_error)?;
    w.get_ref().sync_all().map_err(save_error)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Load
// ─────────────────────────────────────────────────────────────────────────────

/// Reads frames from `path` into `store` and returns the number of objects
/// loaded.
///
/// A frame whose worst-case decompressed size (`len * 255`) exceeds the
/// remaining capacity is a hard error, as is an object the budget cannot
/// admit. Truncated or undecodable frames stop the load quietly, keeping
/// whatever was read so far.
pub fn load(path: &Path, store: &mut Store) -> Result<usize, SnapshotError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(SnapshotError::Load(e)),
    };
    let mut r = BufReader::new(file);
    let mut count = 0usize;

    loop {
        let mut len_bytes = [0u8; 8];
        match r.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(SnapshotError::Load(e)),
        }
        let len = u64::from_le_bytes(len_bytes);
        if len == 0 {
            break;
        }

        let worst_case = len
            .checked_mul(EXPANSION_BOUND)
            .ok_or(SnapshotError::SpaceLimit)?;
        if worst_case > store.cap_remaining() {
            return Err(SnapshotError::SpaceLimit);
        }

        let mut payload = vec![0u8; len as usize];
        if r.read_exact(&mut payload).is_err() {
            break;
        }
        let raw = match decompress(&payload, worst_case as usize) {
            Ok(raw) => raw,
            Err(_) => break,
        };
        let obj = match deserialize(&raw) {
            Ok(obj) => obj,
            Err(_) => break,
        };

        store
            .insert_object(obj)
            .map_err(|_| SnapshotError::SpaceLimit)?;
        count += 1;
    }

    Ok(count)
}
