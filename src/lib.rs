//! # Fingertrack
//!
//! Fingertrack identifies log files by their content rather than by name or inode, so a log tailer can follow files
//! across renames, copy-truncate rotation and truncation in place, emitting each record once.
//! It provides the identity layer only: discovering files, reading lines and shipping them is left to the user.
//!
//! * `Fingerprint` holding leading bytes of a file, compared by prefix
//!
//! ```rust
//! # use fingertrack::Fingerprint;
//! let earlier = Fingerprint::from_bytes("2023-10-01 started");
//! let later = Fingerprint::from_bytes("2023-10-01 started\n2023-10-01 listening");
//! // same file, it only grew
//! assert!(later.starts_with(&earlier));
//! assert!(earlier.matches(&later));
//! ```
//!
//! * `Fingerprinter` that reads fingerprints of a configured size through positional reads, leaving the cursor of
//! a handle that is being read sequentially elsewhere untouched
//!
//! ```rust no_run
//! # use std::fs::File;
//! # use fingertrack::{FingerprintConfig, Fingerprinter};
//! let fingerprinter = Fingerprinter::new(&FingerprintConfig::default())?;
//! let file = File::open("/var/log/mail.log")?;
//! let fingerprint = fingerprinter.new_fingerprint(&file)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! * `FileTracker` that reconciles files found in each poll cycle with those found before and tells where to resume
//! reading each of them. Its state can be saved as a `Checkpoint` and restored after a restart.
//!
//! ```rust no_run
//! # use std::{fs::File, path::PathBuf};
//! # use fingertrack::{Checkpoint, FileTracker, FingerprintConfig};
//! # fn discover() -> Vec<PathBuf> { vec![] }
//! # fn read_lines_from(path: &PathBuf, offset: u64) -> u64 { offset }
//! let mut tracker = FileTracker::new(&FingerprintConfig::default())?;
//! if let Some(checkpoint) = Checkpoint::load_from_path("registry")? {
//!     tracker.restore(checkpoint);
//! }
//! let paths = discover();
//! let report = tracker.poll_sources(paths.iter().map(|path| (path.clone(), File::open(path))));
//! for assignment in &report.assignments {
//!     let path = &paths[assignment.index];
//!     let offset = read_lines_from(path, assignment.offset);
//!     tracker.set_offset(assignment.record, offset);
//! }
//! tracker.checkpoint().persist_to_path("registry")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!

mod checkpoint;
mod config;
mod error;
mod fingerprint;
mod fingerprinter;
pub mod read_at;
mod tracker;

pub use checkpoint::{Checkpoint, CheckpointEntry};
pub use config::{
    FingerprintConfig, StartAt, DEFAULT_FINGERPRINT_SIZE, DEFAULT_GRACE_PERIOD, MIN_FINGERPRINT_SIZE,
};
pub use error::{CheckpointError, ConfigError};
pub use fingerprint::Fingerprint;
pub use fingerprinter::{Fingerprinter, Observation};
pub use read_at::{ReadAt, Rewinding};
pub use tracker::{
    Assignment, CycleReport, Disposition, FileTracker, RecordId, SkipReason, Skipped, TrackedRecord,
};
