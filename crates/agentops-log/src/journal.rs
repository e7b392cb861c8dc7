//! JSON-lines journal backing a durable log.
//!
//! One record per line. Every mutation is written (and flushed) before the
//! in-memory state changes, so a reopened log never holds less than what
//! callers were told succeeded.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use agentops_core::{LogPosition, RunEvent};

use crate::error::LogError;

/// A single journaled mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum JournalRecord {
    Append { position: LogPosition, event: RunEvent },
    CreateGroup { group: String, start: LogPosition },
    Ack { group: String, position: LogPosition },
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalLine {
    at: DateTime<Utc>,
    #[serde(flatten)]
    record: JournalRecord,
}

/// Append handle on a journal file.
#[derive(Debug)]
pub(crate) struct Journal {
    path: PathBuf,
    file: File,
    /// Set when a failed write could not be rolled back.
    poisoned: bool,
}

impl Journal {
    /// Open (or create) a journal and return the records already in it.
    ///
    /// A torn final line, left by a crash mid-write, is dropped and truncated
    /// away. A bad line anywhere else is reported as corruption.
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<JournalRecord>), LogError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        // Bytes, not a String: a torn tail may end inside a UTF-8 sequence.
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let mut records = Vec::new();
        let mut valid_len = 0usize;
        let lines: Vec<&[u8]> = contents.split_inclusive(|b| *b == b'\n').collect();
        let line_count = lines.len();

        for (index, raw) in lines.into_iter().enumerate() {
            let complete = raw.ends_with(b"\n");
            let line = trim_line(raw);

            if line.is_empty() && complete {
                valid_len += raw.len();
                continue;
            }

            match serde_json::from_slice::<JournalLine>(line) {
                Ok(parsed) if complete => {
                    records.push(parsed.record);
                    valid_len += raw.len();
                }
                _ if index + 1 == line_count => {
                    warn!(
                        path = %path.display(),
                        line = index + 1,
                        "Dropping torn journal tail"
                    );
                    file.set_len(valid_len as u64)?;
                    break;
                }
                Ok(_) => {
                    return Err(LogError::Corrupt {
                        line: index + 1,
                        message: "missing line terminator".to_string(),
                    });
                }
                Err(e) => {
                    return Err(LogError::Corrupt {
                        line: index + 1,
                        message: e.to_string(),
                    });
                }
            }
        }

        debug!(path = %path.display(), records = records.len(), "Journal opened");
        Ok((
            Self {
                path,
                file,
                poisoned: false,
            },
            records,
        ))
    }

    /// Write one record and flush it.
    ///
    /// Runs with the log's lock held and blocks the calling thread for the
    /// duration of one flushed line. A failed write is truncated away so a
    /// later record never lands behind a torn one.
    pub(crate) fn write(&mut self, record: &JournalRecord) -> Result<(), LogError> {
        if self.poisoned {
            return Err(LogError::Unavailable(format!(
                "journal {} needs repair after a failed write",
                self.path.display()
            )));
        }

        let line = JournalLine {
            at: Utc::now(),
            record: record.clone(),
        };
        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');

        let len = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(&bytes)
            .and_then(|()| self.file.flush());
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "Journal write failed");
            self.rollback(len);
            return Err(LogError::Io(e));
        }
        Ok(())
    }

    /// Cut the file back to `len` bytes, poisoning the journal if that fails.
    fn rollback(&mut self, len: u64) {
        if let Err(e) = self.file.set_len(len) {
            warn!(path = %self.path.display(), error = %e, "Journal rollback failed");
            self.poisoned = true;
        }
    }
}

/// A raw line without its terminator.
fn trim_line(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentops_core::RunId;

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let records = vec![
            JournalRecord::CreateGroup {
                group: "workers".to_string(),
                start: LogPosition::GENESIS,
            },
            JournalRecord::Append {
                position: LogPosition::new(1),
                event: RunEvent::run_started(RunId::new("r-1"), "hello"),
            },
            JournalRecord::Ack {
                group: "workers".to_string(),
                position: LogPosition::new(1),
            },
        ];

        {
            let (mut journal, existing) = Journal::open(&path).unwrap();
            assert!(existing.is_empty());
            for record in &records {
                journal.write(record).unwrap();
            }
        }

        let (_, reopened) = Journal::open(&path).unwrap();
        assert_eq!(reopened, records);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        {
            let (mut journal, _) = Journal::open(&path).unwrap();
            journal
                .write(&JournalRecord::CreateGroup {
                    group: "workers".to_string(),
                    start: LogPosition::GENESIS,
                })
                .unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"op\":\"app").unwrap();
        drop(file);

        let (mut journal, records) = Journal::open(&path).unwrap();
        assert_eq!(records.len(), 1);
        journal
            .write(&JournalRecord::Ack {
                group: "workers".to_string(),
                position: LogPosition::new(1),
            })
            .unwrap();
        drop(journal);

        let (_, records) = Journal::open(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_tail_torn_inside_multibyte_character_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        {
            let (mut journal, _) = Journal::open(&path).unwrap();
            journal
                .write(&JournalRecord::CreateGroup {
                    group: "workers".to_string(),
                    start: LogPosition::GENESIS,
                })
                .unwrap();
        }

        let full = serde_json::to_vec(&JournalLine {
            at: Utc::now(),
            record: JournalRecord::Append {
                position: LogPosition::new(1),
                event: RunEvent::final_output(
                    RunId::new("r-1"),
                    "We\u{2019}ve initiated the refund",
                ),
            },
        })
        .unwrap();
        let cut = full
            .windows(3)
            .position(|w| w == "\u{2019}".as_bytes())
            .unwrap()
            + 1;
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&full[..cut]).unwrap();
        drop(file);

        let (_, records) = Journal::open(&path).unwrap();
        assert_eq!(records.len(), 1);
        let len = std::fs::metadata(&path).unwrap().len();
        let (_, records) = Journal::open(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
    }

    #[test]
    fn test_partial_write_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let group = JournalRecord::CreateGroup {
            group: "workers".to_string(),
            start: LogPosition::GENESIS,
        };
        let ack = JournalRecord::Ack {
            group: "workers".to_string(),
            position: LogPosition::new(1),
        };

        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.write(&group).unwrap();

        let len = journal.file.metadata().unwrap().len();
        journal.file.write_all(b"{\"at\":\"2026-").unwrap();
        journal.rollback(len);
        journal.write(&ack).unwrap();
        drop(journal);

        let (_, records) = Journal::open(&path).unwrap();
        assert_eq!(records, vec![group, ack]);
    }

    #[test]
    fn test_unrecoverable_write_poisons_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let group = JournalRecord::CreateGroup {
            group: "workers".to_string(),
            start: LogPosition::GENESIS,
        };

        let (mut journal, _) = Journal::open(&path).unwrap();
        journal.write(&group).unwrap();

        // A read-only handle fails both the write and the rollback.
        journal.file = File::open(&path).unwrap();
        let err = journal.write(&group).unwrap_err();
        assert!(matches!(err, LogError::Io(_)));
        assert!(journal.poisoned);

        let err = journal.write(&group).unwrap_err();
        assert!(matches!(err, LogError::Unavailable(_)));
        drop(journal);

        let (_, records) = Journal::open(&path).unwrap();
        assert_eq!(records, vec![group]);
    }

    #[test]
    fn test_corrupt_middle_line_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "not json\n{}\n").unwrap();

        let err = Journal::open(&path).unwrap_err();
        assert!(matches!(err, LogError::Corrupt { line: 1, .. }));
    }
}
