use std::{cmp::Ordering, fmt, io};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    checkpoint::{Checkpoint, CheckpointEntry},
    config::{FingerprintConfig, StartAt},
    error::ConfigError,
    fingerprint::Fingerprint,
    fingerprinter::{Fingerprinter, Observation},
    read_at::ReadAt,
};

/// Stable identity of a logical file, assigned by the tracker when the file is first discovered
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-logical-file state kept between poll cycles
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedRecord<T> {
    id: RecordId,
    fingerprint: Fingerprint,
    offset: u64,
    tag: Option<T>,
    missed_cycles: u32,
}

impl<T> TrackedRecord<T> {
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Fingerprint taken in the last cycle this file was seen
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Read offset owned by the caller, carried across cycles
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Tag of the file this record was last matched to. Absent for records restored from a checkpoint until they
    /// are seen again.
    pub fn tag(&self) -> Option<&T> {
        self.tag.as_ref()
    }

    /// Consecutive cycles in which this record had no matching file
    pub fn missed_cycles(&self) -> u32 {
        self.missed_cycles
    }
}

/// How a file seen in the current cycle relates to what was tracked before
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Same logical file as a tracked record, unchanged or grown. Offset carried forward.
    Continued,
    /// Same logical file, but shorter than before. Offset was reset to zero.
    Truncated,
    /// No tracked record matched. A new record was created.
    Discovered,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    /// Position of the file in the input of the cycle
    pub index: usize,
    pub record: RecordId,
    pub disposition: Disposition,
    /// Offset to resume reading from
    pub offset: u64,
}

#[derive(Debug)]
pub enum SkipReason {
    /// Nothing to identify the file by yet
    Empty,
    /// Prefix-related to a file already accounted for in this cycle, most likely a copy of it
    Duplicate(RecordId),
    /// Fingerprinting failed. The file is retried next cycle.
    Failed(io::Error),
}

#[derive(Debug)]
pub struct Skipped<T> {
    pub index: usize,
    pub tag: T,
    pub reason: SkipReason,
}

/// Outcome of one poll cycle
#[derive(Debug)]
pub struct CycleReport<T> {
    /// One entry per accepted file, in input order
    pub assignments: Vec<Assignment>,
    pub skipped: Vec<Skipped<T>>,
    /// Records with no file this cycle that are still within their grace period
    pub missing: Vec<RecordId>,
    /// Records dropped in this cycle after exceeding their grace period
    pub forgotten: Vec<TrackedRecord<T>>,
}

impl<T> CycleReport<T> {
    fn new() -> Self {
        Self {
            assignments: vec![],
            skipped: vec![],
            missing: vec![],
            forgotten: vec![],
        }
    }

    /// Assignment made for the file at input position `index`, if it was accepted.
    pub fn assignment(&self, index: usize) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.index == index)
    }
}

/// A possible pairing of a new file with a tracked record
struct Pairing {
    /// shared prefix length
    score: usize,
    /// fingerprint length of the file
    len: usize,
    size: u64,
    offset: u64,
    record: usize,
    candidate: usize,
}

impl Pairing {
    /// Longest shared prefix first, then the most complete file (longer fingerprint, then larger size), then the
    /// record that has read less, then the older record, then the earlier file.
    fn priority(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then(other.len.cmp(&self.len))
            .then(other.size.cmp(&self.size))
            .then(self.offset.cmp(&other.offset))
            .then(self.record.cmp(&other.record))
            .then(self.candidate.cmp(&other.candidate))
    }
}

/// Reconciles the files seen in each poll cycle with the files seen before, using content fingerprints.
///
/// ## Usage
///
/// On each cycle hand the tracker every candidate file, either already fingerprinted (`poll`) or as open sources
/// (`poll_sources`). Read each assigned file from the offset reported in the cycle report and record progress with
/// `set_offset`.
///
/// ```rust
/// # use fingertrack::{Disposition, FileTracker, FingerprintConfig};
/// let mut tracker = FileTracker::new(&FingerprintConfig::default())?;
///
/// let report = tracker.poll_sources(vec![("app.log", Ok(b"first line\n".to_vec()))]);
/// let assignment = report.assignments[0];
/// assert_eq!(assignment.disposition, Disposition::Discovered);
/// tracker.set_offset(assignment.record, 11);
///
/// // renamed and a new file took its place
/// let report = tracker.poll_sources(vec![
///     ("app.log", Ok(b"another start\n".to_vec())),
///     ("app.log.1", Ok(b"first line\nsecond line\n".to_vec())),
/// ]);
/// let rotated = report.assignment(1).unwrap();
/// assert_eq!(rotated.record, assignment.record);
/// assert_eq!(rotated.offset, 11);
/// assert_eq!(report.assignment(0).unwrap().disposition, Disposition::Discovered);
/// # Ok::<(), fingertrack::ConfigError>(())
/// ```
///
/// ## Matching
///
/// A file and a record match when one fingerprint is a prefix of the other. All matching pairs are ranked by
/// shared prefix length (longest first), then by the file's fingerprint length and size (largest first, so a stale
/// copy never wins over the live file it was taken from), then by record offset (lowest first), then by record age
/// (oldest first), then by position of the file in the input. Pairs are assigned greedily so every record and every
/// file is used at most once. The outcome only depends on the input order, never on hashing or timing.
///
/// A matched file shorter than the record's fingerprint, or shorter than the record's offset, was truncated in
/// place and restarts at offset zero. Unmatched files start new records at offset zero. Unmatched records are kept
/// for `grace_period` cycles and forgotten afterwards; a file reappearing after that is read again from the start.
///
/// ## Limitations
///
/// * Two distinct files whose content is identical up to the shorter of their lengths cannot be told apart. The
/// second one seen in a cycle is skipped as a duplicate until its content diverges, then read from the start.
/// * A file truncated and rewritten with the same leading bytes past its old offset is indistinguishable from growth.
pub struct FileTracker<T> {
    records: Vec<TrackedRecord<T>>,
    fingerprinter: Fingerprinter,
    grace_period: u32,
    start_at: StartAt,
    next_id: u64,
    first_cycle: bool,
}

impl<T> FileTracker<T> {
    pub fn new(config: &FingerprintConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            records: vec![],
            fingerprinter: Fingerprinter::new(config)?,
            grace_period: config.grace_period,
            start_at: config.start_at,
            next_id: 0,
            first_cycle: true,
        })
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Tracked records, oldest first
    pub fn records(&self) -> &[TrackedRecord<T>] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&TrackedRecord<T>> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store read progress for a record. Returns false if no such record is tracked.
    pub fn set_offset(&mut self, id: RecordId, offset: u64) -> bool {
        match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.offset = offset;
                true
            }
            None => false,
        }
    }

    /// Stop tracking a record right away, regardless of its grace period.
    pub fn forget(&mut self, id: RecordId) -> Option<TrackedRecord<T>> {
        let position = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(position))
    }

    /// Fingerprint every source and reconcile the results with tracked records.
    ///
    /// Sources that failed to open or could not be fingerprinted are reported as skipped and do not affect the
    /// rest of the cycle. Their records, if any, count as unseen for this cycle.
    pub fn poll_sources<S, I>(&mut self, sources: I) -> CycleReport<T>
    where
        S: ReadAt,
        I: IntoIterator<Item = (T, io::Result<S>)>,
    {
        let mut observations = vec![];
        let mut failed = vec![];
        for (index, (tag, source)) in sources.into_iter().enumerate() {
            let observed = source.and_then(|source| self.fingerprinter.measure(&source));
            match observed {
                Ok((fingerprint, size)) => observations.push((
                    index,
                    Observation {
                        tag,
                        fingerprint,
                        size,
                    },
                )),
                Err(error) => {
                    warn!(index, %error, "failed to fingerprint file, skipping it this cycle");
                    failed.push(Skipped {
                        index,
                        tag,
                        reason: SkipReason::Failed(error),
                    });
                }
            }
        }

        let mut report = self.reconcile(observations);
        report.skipped.extend(failed);
        report.skipped.sort_by_key(|skipped| skipped.index);
        report
    }

    /// Reconcile already fingerprinted files with tracked records.
    pub fn poll(&mut self, observations: impl IntoIterator<Item = Observation<T>>) -> CycleReport<T> {
        self.reconcile(observations.into_iter().enumerate())
    }

    fn reconcile(
        &mut self,
        observations: impl IntoIterator<Item = (usize, Observation<T>)>,
    ) -> CycleReport<T> {
        let mut report = CycleReport::new();

        let mut candidates = vec![];
        for (index, observation) in observations {
            if observation.fingerprint.is_empty() {
                debug!(index, "file is empty, nothing to identify it by yet");
                report.skipped.push(Skipped {
                    index,
                    tag: observation.tag,
                    reason: SkipReason::Empty,
                });
            } else {
                candidates.push((index, observation));
            }
        }

        let matched = self.pair_up(&candidates);
        let known = self.records.len();
        let mut seen = vec![false; known];
        // records claimed by a file in this cycle, matched or newly created
        let mut claimed = vec![];
        let mut unmatched = vec![];

        for (candidate, (index, observation)) in candidates.into_iter().enumerate() {
            let Some(position) = matched[candidate] else {
                unmatched.push((index, observation));
                continue;
            };
            seen[position] = true;
            claimed.push(position);
            let assignment = self.carry_forward(position, index, observation);
            report.assignments.push(assignment);
        }

        for (index, observation) in unmatched {
            let duplicate_of = claimed
                .iter()
                .map(|&position| &self.records[position])
                .find(|record| record.fingerprint.matches(&observation.fingerprint))
                .map(|record| record.id);
            if let Some(id) = duplicate_of {
                debug!(index, record = %id, "file duplicates one already tracked in this cycle, skipping");
                report.skipped.push(Skipped {
                    index,
                    tag: observation.tag,
                    reason: SkipReason::Duplicate(id),
                });
                continue;
            }

            let offset = match self.start_at {
                StartAt::End if self.first_cycle => observation.size,
                _ => 0,
            };
            let id = RecordId(self.next_id);
            self.next_id = self.next_id.saturating_add(1);
            debug!(index, record = %id, offset, len = observation.fingerprint.len(), "discovered new file");
            claimed.push(self.records.len());
            self.records.push(TrackedRecord {
                id,
                fingerprint: observation.fingerprint,
                offset,
                tag: Some(observation.tag),
                missed_cycles: 0,
            });
            report.assignments.push(Assignment {
                index,
                record: id,
                disposition: Disposition::Discovered,
                offset,
            });
        }
        report.assignments.sort_by_key(|assignment| assignment.index);

        self.age_unseen(&seen, &mut report);
        self.first_cycle = false;
        report
    }

    /// Pick at most one record for each candidate. Returns record position per candidate.
    fn pair_up(&self, candidates: &[(usize, Observation<T>)]) -> Vec<Option<usize>> {
        let mut pairings = vec![];
        for (candidate, (_, observation)) in candidates.iter().enumerate() {
            for (record, tracked) in self.records.iter().enumerate() {
                if !observation.fingerprint.matches(&tracked.fingerprint) {
                    continue;
                }
                let score = observation.fingerprint.len().min(tracked.fingerprint.len());
                // an empty stored fingerprint relates to everything and identifies nothing
                if score == 0 {
                    continue;
                }
                pairings.push(Pairing {
                    score,
                    len: observation.fingerprint.len(),
                    size: observation.size,
                    offset: tracked.offset,
                    record,
                    candidate,
                });
            }
        }
        pairings.sort_by(Pairing::priority);

        let mut record_taken = vec![false; self.records.len()];
        let mut matched = vec![None; candidates.len()];
        for pairing in pairings {
            if record_taken[pairing.record] || matched[pairing.candidate].is_some() {
                continue;
            }
            record_taken[pairing.record] = true;
            matched[pairing.candidate] = Some(pairing.record);
        }
        matched
    }

    fn carry_forward(&mut self, position: usize, index: usize, observation: Observation<T>) -> Assignment {
        let record = &mut self.records[position];
        // a file once fingerprinted at some length can only hold fewer bytes than that if it was truncated
        let shrunk = observation.size < record.fingerprint.len() as u64;
        let disposition = if shrunk || observation.size < record.offset {
            info!(
                record = %record.id,
                previous_offset = record.offset,
                size = observation.size,
                "file was truncated, reading it again from the start"
            );
            record.offset = 0;
            Disposition::Truncated
        } else {
            debug!(index, record = %record.id, offset = record.offset, "file continues tracked record");
            Disposition::Continued
        };
        record.fingerprint = observation.fingerprint;
        record.tag = Some(observation.tag);
        record.missed_cycles = 0;

        Assignment {
            index,
            record: record.id,
            disposition,
            offset: record.offset,
        }
    }

    /// Count a miss for every previously known record nobody matched and drop those past their grace period.
    fn age_unseen(&mut self, seen: &[bool], report: &mut CycleReport<T>) {
        let records = std::mem::take(&mut self.records);
        for (position, mut record) in records.into_iter().enumerate() {
            // records created in this cycle sit past the end of `seen`
            if seen.get(position).copied().unwrap_or(true) {
                self.records.push(record);
                continue;
            }
            record.missed_cycles += 1;
            if record.missed_cycles > self.grace_period {
                info!(
                    record = %record.id,
                    offset = record.offset,
                    missed_cycles = record.missed_cycles,
                    "file not seen for longer than grace period, forgetting it"
                );
                report.forgotten.push(record);
            } else {
                debug!(record = %record.id, missed_cycles = record.missed_cycles, "tracked file not seen");
                report.missing.push(record.id);
                self.records.push(record);
            }
        }
    }

    /// Snapshot of all records suitable for persisting. Tags are not part of it.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            next_id: self.next_id,
            entries: self
                .records
                .iter()
                .map(|record| CheckpointEntry {
                    id: record.id,
                    fingerprint: record.fingerprint.clone(),
                    offset: record.offset,
                    missed_cycles: record.missed_cycles,
                })
                .collect(),
        }
    }

    /// Replace tracked records with those from a checkpoint.
    ///
    /// Restored state counts as prior knowledge: `StartAt::End` no longer applies to files found in the next cycle.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        let highest = checkpoint
            .entries
            .iter()
            .map(|entry| entry.id.0.saturating_add(1))
            .max();
        self.next_id = checkpoint.next_id.max(highest.unwrap_or_default());
        self.records = checkpoint
            .entries
            .into_iter()
            .map(|entry| TrackedRecord {
                id: entry.id,
                fingerprint: entry.fingerprint,
                offset: entry.offset,
                tag: None,
                missed_cycles: entry.missed_cycles,
            })
            .collect();
        debug!(records = self.records.len(), "restored tracker state from checkpoint");
        self.first_cycle = false;
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use rstest::{fixture, rstest};

    use super::{Disposition, FileTracker, RecordId, SkipReason};
    use crate::{
        checkpoint::{Checkpoint, CheckpointEntry},
        config::{FingerprintConfig, StartAt},
        fingerprint::Fingerprint,
        fingerprinter::Observation,
    };

    type Tracker = FileTracker<&'static str>;

    fn observe(tag: &'static str, content: &str) -> Observation<&'static str> {
        Observation {
            tag,
            fingerprint: Fingerprint::from_bytes(content),
            size: content.len() as u64,
        }
    }

    /// Observation as the 16 byte fingerprinter of `small_tracker` would make it
    fn capped(tag: &'static str, content: &str) -> Observation<&'static str> {
        let mut observation = observe(tag, content);
        observation.fingerprint = Fingerprint::from_bytes(&content.as_bytes()[..content.len().min(16)]);
        observation
    }

    fn tracker_with(config: FingerprintConfig) -> Tracker {
        FileTracker::new(&config).unwrap()
    }

    fn small_tracker() -> Tracker {
        tracker_with(FingerprintConfig::default().with_fingerprint_size(16))
    }

    #[fixture]
    fn tracker() -> Tracker {
        small_tracker()
    }

    /// Tracker that already knows one file, read up to `offset`
    fn tracking(content: &str, offset: u64) -> (Tracker, RecordId) {
        let mut tracker = small_tracker();
        let report = tracker.poll(vec![observe("app.log", content)]);
        let id = report.assignments[0].record;
        tracker.set_offset(id, offset);
        (tracker, id)
    }

    #[rstest]
    fn new_file_starts_at_zero(mut tracker: Tracker) {
        let report = tracker.poll(vec![observe("app.log", "hello")]);

        assert_eq!(report.assignments.len(), 1);
        let assignment = report.assignments[0];
        assert_eq!(assignment.disposition, Disposition::Discovered);
        assert_eq!(assignment.offset, 0);
        assert_eq!(tracker.record(assignment.record).unwrap().tag(), Some(&"app.log"));
    }

    #[test]
    fn growing_file_continues() {
        let (mut tracker, id) = tracking("hello", 5);

        let report = tracker.poll(vec![observe("app.log", "hello world")]);
        let assignment = report.assignments[0];
        assert_eq!(assignment.record, id);
        assert_eq!(assignment.disposition, Disposition::Continued);
        assert_eq!(assignment.offset, 5);
        assert_eq!(tracker.record(id).unwrap().fingerprint().bytes(), b"hello world");
    }

    #[test]
    fn unchanged_file_continues() {
        let (mut tracker, id) = tracking("hello", 5);

        let report = tracker.poll(vec![observe("app.log", "hello")]);
        assert_eq!(report.assignments[0].record, id);
        assert_eq!(report.assignments[0].disposition, Disposition::Continued);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn size_below_fingerprint_means_truncation() {
        let (mut tracker, id) = tracking("0123456789abcdefghij", 20);

        let report = tracker.poll(vec![observe("app.log", "0123456")]);
        let assignment = report.assignments[0];
        assert_eq!(assignment.record, id);
        assert_eq!(assignment.disposition, Disposition::Truncated);
        assert_eq!(assignment.offset, 0);
        assert_eq!(tracker.record(id).unwrap().offset(), 0);
        assert_eq!(tracker.record(id).unwrap().fingerprint().bytes(), b"0123456");
    }

    #[test]
    fn size_below_offset_means_truncation() {
        let (mut tracker, id) = tracking("0123456789abcdefghij", 500);

        let mut observation = observe("app.log", "0123456789abcdef");
        observation.size = 100;
        let report = tracker.poll(vec![observation]);
        assert_eq!(report.assignments[0].record, id);
        assert_eq!(report.assignments[0].disposition, Disposition::Truncated);
        assert_eq!(report.assignments[0].offset, 0);
    }

    #[test]
    fn renamed_file_keeps_identity_and_new_file_starts_fresh() {
        let (mut tracker, id) = tracking("first line\n", 11);

        let report = tracker.poll(vec![
            observe("app.log", "brand new\n"),
            observe("app.log.1", "first line\nsecond line\n"),
        ]);

        let fresh = report.assignment(0).unwrap();
        assert_eq!(fresh.disposition, Disposition::Discovered);
        assert_eq!(fresh.offset, 0);
        assert_ne!(fresh.record, id);

        let rotated = report.assignment(1).unwrap();
        assert_eq!(rotated.record, id);
        assert_eq!(rotated.offset, 11);
        assert_eq!(tracker.record(id).unwrap().tag(), Some(&"app.log.1"));
    }

    #[rstest]
    #[case::longer_first(vec!["shared header, then more", "shared header"])]
    #[case::shorter_first(vec!["shared header", "shared header, then more"])]
    fn longest_shared_prefix_wins(#[case] contents: Vec<&'static str>) {
        let (mut tracker, id) = tracking("shared header, then", 3);

        let report = tracker.poll(contents.iter().map(|content| observe("file", content)));

        let winner = contents
            .iter()
            .position(|content| content.len() > "shared header".len())
            .unwrap();
        let assignment = report.assignment(winner).unwrap();
        assert_eq!(assignment.record, id);
        assert_eq!(assignment.disposition, Disposition::Continued);
        // the other one is a prefix of the winner, so it is treated as a copy
        assert!(matches!(report.skipped[0].reason, SkipReason::Duplicate(dup) if dup == id));
    }

    /// Tracker restored with one record per `(fingerprint, offset)`, ids in order
    fn restored(entries: &[(&str, u64)]) -> Tracker {
        let mut tracker = small_tracker();
        tracker.restore(Checkpoint {
            next_id: entries.len() as u64,
            entries: entries
                .iter()
                .enumerate()
                .map(|(id, &(content, offset))| CheckpointEntry {
                    id: RecordId(id as u64),
                    fingerprint: Fingerprint::from_bytes(content),
                    offset,
                    missed_cycles: 0,
                })
                .collect(),
        });
        tracker
    }

    #[test]
    fn candidate_goes_to_record_with_longest_prefix() {
        let mut tracker = restored(&[("abc", 0), ("abcdefgh", 0)]);

        let report = tracker.poll(vec![observe("c", "abcdefghij")]);
        assert_eq!(report.assignments[0].record, RecordId(1));
        assert_eq!(report.missing, vec![RecordId(0)]);
    }

    #[rstest]
    #[case::lower_offset_wins((10, 5), RecordId(1))]
    #[case::lower_offset_wins_reversed((5, 10), RecordId(0))]
    #[case::older_record_wins_on_equal_offset((7, 7), RecordId(0))]
    fn ties_are_broken_deterministically(#[case] offsets: (u64, u64), #[case] expected: RecordId) {
        let mut tracker = restored(&[("twin content", offsets.0), ("twin content", offsets.1)]);

        let report = tracker.poll(vec![observe("twin", "twin content and more")]);
        assert_eq!(report.assignments[0].record, expected);
    }

    #[rstest]
    #[case::copy_listed_first(0)]
    #[case::copy_listed_last(1)]
    fn live_file_wins_over_stale_copy(#[case] copy_position: usize) {
        let (mut tracker, id) = tracking("line one\n", 9);

        let mut live = String::from("line one\n");
        for line in ["line two\n", "line three\n", "line four\n"] {
            live.push_str(line);
            let mut files = vec![capped("app.log", &live)];
            files.insert(copy_position, capped("a.bak", "line one\n"));
            let report = tracker.poll(files);

            let live_position = 1 - copy_position;
            let assignment = report.assignment(live_position).unwrap();
            assert_eq!(assignment.record, id);
            assert_eq!(assignment.disposition, Disposition::Continued);
            assert_eq!(assignment.offset, 9);
            assert_eq!(report.skipped.len(), 1);
            assert_eq!(report.skipped[0].tag, "a.bak");
            assert!(matches!(report.skipped[0].reason, SkipReason::Duplicate(dup) if dup == id));
            assert_eq!(tracker.record(id).unwrap().tag(), Some(&"app.log"));
        }
    }

    #[test]
    fn larger_file_wins_when_fingerprints_are_equal() {
        let (mut tracker, id) = tracking("0123456789abcdef", 16);

        let mut stale = observe("a.bak", "0123456789abcdef");
        stale.size = 20;
        let mut live = observe("app.log", "0123456789abcdef");
        live.size = 80;
        let report = tracker.poll(vec![stale, live]);

        assert_eq!(report.assignment(1).unwrap().record, id);
        assert!(report.assignment(0).is_none());
        assert!(matches!(report.skipped[0].reason, SkipReason::Duplicate(dup) if dup == id));
    }

    #[test]
    fn smaller_fingerprint_size_after_restore_continues() {
        let content = "0123456789abcdef0123456789ABCDEF and all the rest";
        assert_eq!(content.len(), 49);
        // checkpoint written while fingerprints were 32 bytes, restored with 16
        let mut tracker = restored(&[(&content[..32], 49)]);

        let report = tracker.poll(vec![capped("app.log", content)]);

        let assignment = report.assignments[0];
        assert_eq!(assignment.record, RecordId(0));
        assert_eq!(assignment.disposition, Disposition::Continued);
        assert_eq!(assignment.offset, 49);
        assert_eq!(tracker.record(RecordId(0)).unwrap().fingerprint().len(), 16);
    }

    #[test]
    fn identical_new_files_are_tracked_once() {
        let mut tracker = tracker();
        let report = tracker.poll(vec![observe("a", "same content"), observe("b", "same content")]);

        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].index, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].tag, "b");
        assert!(
            matches!(report.skipped[0].reason, SkipReason::Duplicate(id) if id == report.assignments[0].record)
        );
        assert_eq!(tracker.len(), 1);
    }

    #[rstest]
    fn empty_file_is_skipped(mut tracker: Tracker) {
        let report = tracker.poll(vec![observe("empty", ""), observe("full", "content")]);

        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].index, 1);
        assert!(matches!(report.skipped[0].reason, SkipReason::Empty));
        assert_eq!(report.skipped[0].index, 0);
    }

    #[test]
    fn empty_file_does_not_claim_copy_truncated_record() {
        let (mut tracker, id) = tracking("log content\n", 12);

        // app.log copied to app.log.1 then truncated
        let report = tracker.poll(vec![
            observe("app.log", ""),
            observe("app.log.1", "log content\n"),
        ]);
        assert_eq!(report.assignment(1).unwrap().record, id);
        assert_eq!(report.assignment(1).unwrap().offset, 12);
        assert!(report.assignment(0).is_none());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    fn unseen_record_is_kept_for_grace_period(#[case] grace_period: u32) {
        let config = FingerprintConfig::default()
            .with_fingerprint_size(16)
            .with_grace_period(grace_period);
        let mut tracker = tracker_with(config);
        let id = tracker.poll(vec![observe("app.log", "content")]).assignments[0].record;

        for cycle in 1..=grace_period {
            let report = tracker.poll(vec![]);
            assert_eq!(report.missing, vec![id]);
            assert_eq!(tracker.record(id).unwrap().missed_cycles(), cycle);
        }

        let report = tracker.poll(vec![]);
        assert!(report.missing.is_empty());
        assert_eq!(report.forgotten.len(), 1);
        assert_eq!(report.forgotten[0].id(), id);
        assert!(tracker.is_empty());
    }

    #[test]
    fn reappearing_file_within_grace_period_resumes() {
        let (mut tracker, id) = tracking("content", 7);

        tracker.poll(vec![]);
        let report = tracker.poll(vec![observe("app.log.1", "content and more")]);

        let assignment = report.assignments[0];
        assert_eq!(assignment.record, id);
        assert_eq!(assignment.offset, 7);
        assert_eq!(tracker.record(id).unwrap().missed_cycles(), 0);
    }

    #[test]
    fn forgotten_file_is_read_again_from_start() {
        let config = FingerprintConfig::default()
            .with_fingerprint_size(16)
            .with_grace_period(0);
        let mut tracker = tracker_with(config);
        let first = tracker.poll(vec![observe("app.log", "content")]).assignments[0];
        tracker.set_offset(first.record, 7);

        tracker.poll(vec![]);
        let report = tracker.poll(vec![observe("app.log", "content")]);
        assert_eq!(report.assignments[0].disposition, Disposition::Discovered);
        assert_eq!(report.assignments[0].offset, 0);
        assert_ne!(report.assignments[0].record, first.record);
    }

    #[test]
    fn start_at_end_only_applies_to_first_cycle() {
        let config = FingerprintConfig::default()
            .with_fingerprint_size(16)
            .with_start_at(StartAt::End);
        let mut tracker = tracker_with(config);

        let report = tracker.poll(vec![observe("old.log", "existing content")]);
        assert_eq!(report.assignments[0].offset, 16);

        let report = tracker.poll(vec![
            observe("old.log", "existing content"),
            observe("new.log", "fresh content"),
        ]);
        assert_eq!(report.assignment(0).unwrap().offset, 16);
        assert_eq!(report.assignment(1).unwrap().offset, 0);
    }

    #[rstest]
    fn failures_are_isolated_per_file(mut tracker: Tracker) {
        let report = tracker.poll_sources(vec![
            ("gone.log", Err(io::Error::from(io::ErrorKind::NotFound))),
            ("app.log", Ok(b"content".to_vec())),
        ]);

        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].index, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].tag, "gone.log");
        assert!(
            matches!(&report.skipped[0].reason, SkipReason::Failed(e) if e.kind() == io::ErrorKind::NotFound)
        );
    }

    #[test]
    fn failing_file_counts_as_unseen() {
        let (mut tracker, id) = tracking("content", 7);

        let report = tracker.poll_sources(vec![(
            "app.log",
            Err::<Vec<u8>, _>(io::Error::from(io::ErrorKind::PermissionDenied)),
        )]);
        assert_eq!(report.missing, vec![id]);
        assert_eq!(tracker.record(id).unwrap().offset(), 7);
    }

    #[rstest]
    fn poll_sources_caps_fingerprint(mut tracker: Tracker) {
        tracker.poll_sources(vec![("app.log", Ok(b"0123456789abcdefghijklmnop".to_vec()))]);
        assert_eq!(tracker.records()[0].fingerprint().len(), 16);
    }

    #[test]
    fn offsets_for_unknown_records_are_refused() {
        let (mut tracker, id) = tracking("content", 0);
        assert!(tracker.set_offset(id, 3));
        assert!(!tracker.set_offset(RecordId(42), 3));
        assert!(tracker.forget(id).is_some());
        assert!(!tracker.set_offset(id, 3));
    }

    #[test]
    fn checkpoint_restores_identity_and_offsets() {
        let (mut tracker, id) = tracking("content", 7);
        tracker.poll(vec![observe("app.log", "content"), observe("other.log", "other")]);
        let checkpoint = tracker.checkpoint();

        let mut restored = small_tracker();
        restored.restore(checkpoint);
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.record(id).unwrap().tag(), None);

        let report = restored.poll(vec![observe("app.log", "content grew")]);
        assert_eq!(report.assignments[0].record, id);
        assert_eq!(report.assignments[0].offset, 7);

        let report = restored.poll(vec![observe("third.log", "third")]);
        assert_eq!(report.assignments[0].record, RecordId(2));
    }

    #[test]
    fn restoring_highest_possible_id_does_not_overflow() {
        let mut tracker = small_tracker();
        tracker.restore(Checkpoint {
            next_id: 0,
            entries: vec![CheckpointEntry {
                id: RecordId(u64::MAX),
                fingerprint: Fingerprint::from_bytes("content"),
                offset: 7,
                missed_cycles: 0,
            }],
        });
        assert_eq!(tracker.checkpoint().next_id, u64::MAX);

        let report = tracker.poll(vec![observe("app.log", "content")]);
        assert_eq!(report.assignments[0].record, RecordId(u64::MAX));
        assert_eq!(report.assignments[0].offset, 7);
    }
}
