//! Durable, append-only, globally ordered audit log
//!
//! One log instance per run, keyed by `(correlation_id, pid)`. Each event
//! kind gets its own line-delimited-JSON stream file under the run
//! directory; lines are appended and never rewritten.
//!
//! Two write paths:
//! - synchronous: serialize, append, flush; blocks on I/O, no ordering
//!   metadata attached;
//! - asynchronous: draw the next global sequence number from the single
//!   shared counter (the only synchronized critical section), stamp it into
//!   the envelope, hand the line to the background writer. The caller never
//!   blocks on I/O, and total order is carried by the stamped number, not by
//!   write-completion order.
//!
//! A failed write is terminal for that one event: it is logged to the side
//! channel and its sequence number is never reused, so monotonicity holds
//! through failures.

pub mod events;

pub use events::{
    ConfigEvent, DecisionEvent, EngineErrorEvent, EventEnvelope, EventKind, HealthEvent,
    LifecycleEvent, RateLookupEvent,
};

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::Result;

enum WriteJob {
    Line { kind: EventKind, line: String },
    Flush(oneshot::Sender<()>),
}

/// Append-only multi-stream audit log for one run.
pub struct DomainEventLog {
    dir: PathBuf,
    correlation_id: String,
    pid: u32,
    /// Global sequence counter shared across all event kinds of this
    /// instance. Owned here exclusively; never shared across processes.
    seq: AtomicU64,
    sync_writers: Mutex<HashMap<EventKind, File>>,
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl DomainEventLog {
    /// Open (creating if needed) the per-run directory and start the
    /// background writer. Must be called within a tokio runtime.
    pub fn open(base: impl AsRef<Path>, correlation_id: impl Into<String>) -> Result<Self> {
        let correlation_id = correlation_id.into();
        let pid = std::process::id();
        let dir = base.as_ref().join(format!("{correlation_id}-{pid}"));
        std::fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(dir.clone(), rx));

        debug!(dir = %dir.display(), "opened audit log");
        Ok(Self {
            dir,
            correlation_id,
            pid,
            seq: AtomicU64::new(0),
            sync_writers: Mutex::new(HashMap::new()),
            tx,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Last sequence number issued on the async path (0 before the first).
    pub fn sequence(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    fn envelope<T: Serialize>(
        &self,
        ts: i64,
        kind: EventKind,
        order: Option<u64>,
        payload: &T,
    ) -> serde_json::Result<String> {
        let envelope = EventEnvelope {
            ts,
            captured_at: Utc::now(),
            correlation_id: self.correlation_id.clone(),
            pid: self.pid,
            order,
            kind,
            payload: serde_json::to_value(payload)?,
        };
        serde_json::to_string(&envelope)
    }

    /// Synchronous append: blocks on the write and flush. Failures are
    /// logged to the side channel and swallowed; persistence trouble never
    /// propagates past the logging call site.
    pub fn append<T: Serialize>(&self, ts: i64, kind: EventKind, payload: &T) {
        let line = match self.envelope(ts, kind, None, payload) {
            Ok(line) => line,
            Err(e) => {
                error!(%kind, "failed to serialize event: {e}");
                return;
            }
        };
        let mut writers = match self.sync_writers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let file = match writers.entry(kind) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => {
                match OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.stream_path(kind))
                {
                    Ok(file) => v.insert(file),
                    Err(e) => {
                        error!(%kind, "failed to open stream: {e}");
                        return;
                    }
                }
            }
        };
        if let Err(e) = writeln!(file, "{line}") {
            error!(%kind, "failed to append event: {e}");
        } else if let Err(e) = file.flush() {
            error!(%kind, "failed to flush event: {e}");
        }
    }

    /// Asynchronous append: stamps the next global sequence number into the
    /// envelope and hands the write off without blocking. Returns the
    /// sequence number issued; it is consumed even if the write later
    /// fails.
    pub fn append_async<T: Serialize>(&self, ts: i64, kind: EventKind, payload: &T) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        match self.envelope(ts, kind, Some(seq), payload) {
            Ok(line) => {
                if self.tx.send(WriteJob::Line { kind, line }).is_err() {
                    error!(%kind, seq, "audit writer task is gone, event dropped");
                }
            }
            Err(e) => {
                error!(%kind, seq, "failed to serialize event: {e}");
            }
        }
        seq
    }

    /// Wait until every write handed off so far has been attempted.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteJob::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    fn stream_path(&self, kind: EventKind) -> PathBuf {
        self.dir.join(format!("{}.jsonl", kind.stream_name()))
    }

    /// Full replay of one stream, independent of every other stream.
    pub fn read_stream(&self, kind: EventKind) -> Result<Vec<EventEnvelope>> {
        let path = self.stream_path(kind);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    /// Most recent event of one stream, if any.
    pub fn tail_latest(&self, kind: EventKind) -> Result<Option<EventEnvelope>> {
        Ok(self.read_stream(kind)?.into_iter().last())
    }
}

/// Background writer: owns the append handles for the async path. Writes
/// are applied in hand-off order per stream, but cross-stream ordering is
/// intentionally unspecified; replay sorts by the stamped sequence.
async fn write_loop(dir: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteJob>) {
    use tokio::io::AsyncWriteExt;

    let mut files: HashMap<EventKind, tokio::fs::File> = HashMap::new();
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Line { kind, line } => {
                if !files.contains_key(&kind) {
                    let path = dir.join(format!("{}.jsonl", kind.stream_name()));
                    match tokio::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .await
                    {
                        Ok(file) => {
                            files.insert(kind, file);
                        }
                        Err(e) => {
                            error!(%kind, "failed to open stream: {e}");
                            continue;
                        }
                    }
                }
                let Some(file) = files.get_mut(&kind) else {
                    continue;
                };
                let mut buf = line.into_bytes();
                buf.push(b'\n');
                let result = async {
                    file.write_all(&buf).await?;
                    file.flush().await
                }
                .await;
                if let Err(e) = result {
                    // Terminal for this event: no retry, the sequence number
                    // stays consumed.
                    error!(%kind, "failed to append event: {e}");
                }
            }
            WriteJob::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
