use std::{
    fs::File,
    io::{self, Seek, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{error::CheckpointError, fingerprint::Fingerprint, tracker::RecordId};

/// Persisted state of a single tracked file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub id: RecordId,
    pub fingerprint: Fingerprint,
    pub offset: u64,
    pub missed_cycles: u32,
}

/// Structure used to store state of `FileTracker` across restarts. See `FileTracker::checkpoint` and
/// `FileTracker::restore`.
///
/// Encoded with bincode, which prefixes every fingerprint with its length, so entries can be decoded without any
/// delimiter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identity that will be given to the next discovered file
    pub next_id: u64,
    pub entries: Vec<CheckpointEntry>,
}

impl Checkpoint {
    pub fn load(file: &mut File) -> Result<Self, CheckpointError> {
        file.rewind()?;
        let checkpoint = bincode::deserialize_from(file)?;
        Ok(checkpoint)
    }

    /// Overwrite `file` with this checkpoint.
    pub fn persist(&self, file: &mut File) -> Result<(), CheckpointError> {
        file.rewind()?;
        file.set_len(0)?;
        bincode::serialize_into(&mut *file, self)?;
        file.flush()?;
        Ok(())
    }

    /// Load a checkpoint from `path`. A missing file means there is no prior state, which is not an error.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Option<Self>, CheckpointError> {
        let mut file = match File::options().read(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Self::load(&mut file)?))
    }

    /// Persist into `path`, creating the file if needed.
    pub fn persist_to_path(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        self.persist(&mut file)
    }
}
