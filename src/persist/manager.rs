//! Snapshot lifecycle: restore at startup, flush after commits.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{FlushMode, PersistenceConfig};
use crate::error::{DedupError, DedupResult};
use crate::persist::backend::PersistenceBackend;
use crate::persist::snapshot::Snapshot;
use crate::store::RecordStore;
use crate::vector::{SimilarityIndex, VectorDimension};

/// Owns the persistence backend and the configured flush cadence.
///
/// Each flushed snapshot is the full committed state stamped with a
/// lock-ordered sequence, so retry is newest-state-wins: a failed write
/// is logged and superseded by the next flush rather than replayed, and
/// a write that arrives late can never regress the blob to older state.
pub struct PersistenceManager {
    writer: Arc<SnapshotWriter>,
    flusher: Option<Flusher>,
}

/// Serializes blob writes and refuses sequence regressions.
///
/// Once the commit lock is released, flushes race: two sync-mode
/// writers can reach the backend in either order, and the deferred
/// queue drains behind direct administrative writes. Taking this mutex
/// across the write and comparing sequences makes the blob's content a
/// monotone function of committed state no matter how those races
/// schedule.
struct SnapshotWriter {
    backend: Arc<dyn PersistenceBackend>,
    last_written: Mutex<u64>,
}

impl SnapshotWriter {
    fn write(&self, snapshot: &Snapshot) -> DedupResult<()> {
        let mut last_written = self.last_written.lock();
        if snapshot.sequence() <= *last_written {
            debug!(
                sequence = snapshot.sequence(),
                last_written = *last_written,
                "skipping stale snapshot"
            );
            return Ok(());
        }

        let bytes = snapshot.encode().map_err(|e| DedupError::PersistenceFailure {
            reason: e.to_string(),
        })?;
        self.backend
            .write_blob(&bytes)
            .map_err(|e| DedupError::PersistenceFailure {
                reason: e.to_string(),
            })?;
        *last_written = snapshot.sequence();

        debug!(
            entries = snapshot.entry_count(),
            bytes = bytes.len(),
            "snapshot written"
        );
        Ok(())
    }
}

/// Background flusher for deferred mode.
struct Flusher {
    tx: Sender<Snapshot>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceManager {
    /// Creates a manager, spawning the background flusher in deferred mode.
    #[must_use]
    pub fn new(backend: Arc<dyn PersistenceBackend>, config: &PersistenceConfig) -> Self {
        let writer = Arc::new(SnapshotWriter {
            backend,
            last_written: Mutex::new(0),
        });

        let flusher = match config.flush_mode {
            FlushMode::Sync => None,
            FlushMode::Deferred => {
                let (tx, rx) = crossbeam_channel::unbounded();
                let max_delay = Duration::from_millis(config.max_delay_ms);
                let thread_writer = Arc::clone(&writer);
                let handle = std::thread::Builder::new()
                    .name("maildex-flusher".to_string())
                    .spawn(move || run_flusher(rx, thread_writer, max_delay))
                    .expect("failed to spawn flusher thread");
                Some(Flusher {
                    tx,
                    handle: Some(handle),
                })
            }
        };

        Self { writer, flusher }
    }

    /// Loads the persisted pair, or an empty one on cold start.
    ///
    /// A missing or unreadable blob is a cold start. A blob that parses
    /// but violates its header or the pairing invariant raises
    /// `IndexCorruption`; the caller decides to fall back to empty,
    /// never to a truncated load.
    pub fn restore(
        &self,
        expected_dimension: VectorDimension,
    ) -> DedupResult<(SimilarityIndex, RecordStore)> {
        let blob = match self.writer.backend.read_blob() {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                info!("no snapshot found, starting with an empty index");
                return Ok(empty_state(expected_dimension));
            }
            Err(e) => {
                warn!("snapshot unreadable ({e}), starting with an empty index");
                return Ok(empty_state(expected_dimension));
            }
        };

        let snapshot = Snapshot::decode(&blob).map_err(|e| DedupError::IndexCorruption {
            reason: e.to_string(),
        })?;

        if snapshot.dimension() != expected_dimension {
            return Err(DedupError::IndexCorruption {
                reason: format!(
                    "snapshot dimension {} does not match configured dimension {}",
                    snapshot.dimension().get(),
                    expected_dimension.get()
                ),
            });
        }

        let (index, store) = snapshot
            .into_state()
            .map_err(|e| DedupError::IndexCorruption {
                reason: e.to_string(),
            })?;

        info!(entries = index.len(), "restored snapshot");
        Ok((index, store))
    }

    /// Flushes a frozen snapshot according to the configured cadence.
    ///
    /// Never fails the caller: in sync mode a write error is logged as a
    /// warning and the in-memory state stays authoritative; in deferred
    /// mode the snapshot is queued for the background flusher.
    pub fn flush(&self, snapshot: Snapshot) {
        match &self.flusher {
            None => {
                if let Err(e) = self.writer.write(&snapshot) {
                    warn!("{e}; in-memory state remains authoritative, will retry on next flush");
                }
            }
            Some(flusher) => {
                // Disconnected only during shutdown, when the final drain
                // already covers this snapshot's predecessors
                if flusher.tx.send(snapshot).is_err() {
                    warn!("flusher thread gone; snapshot dropped");
                }
            }
        }
    }

    /// Writes a snapshot immediately, bypassing the cadence.
    ///
    /// Used by administrative operations that must observe the write
    /// result, like persisting the empty state after a clear. Goes
    /// through the same sequence-guarded writer, so a stale snapshot
    /// still queued in the deferred flusher can never clobber this
    /// write afterward.
    pub fn flush_now(&self, snapshot: &Snapshot) -> DedupResult<()> {
        self.writer.write(snapshot)
    }
}

impl Drop for PersistenceManager {
    fn drop(&mut self) {
        if let Some(mut flusher) = self.flusher.take() {
            // Disconnect the channel; the thread drains its pending
            // snapshot and exits
            drop(flusher.tx);
            if let Some(handle) = flusher.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn empty_state(dimension: VectorDimension) -> (SimilarityIndex, RecordStore) {
    (SimilarityIndex::new(dimension), RecordStore::new())
}

/// Deferred-mode flush loop.
///
/// Coalesces bursts: the highest-sequence snapshot supersedes queued
/// ones (channel sends happen off-lock, so arrival order is not commit
/// order), and the deadline is anchored to the first unwritten snapshot
/// so no commit waits longer than `max_delay` even under sustained
/// traffic.
fn run_flusher(rx: Receiver<Snapshot>, writer: Arc<SnapshotWriter>, max_delay: Duration) {
    let mut pending: Option<Snapshot> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let snapshot = match deadline {
            Some(at) => match rx.recv_deadline(at) {
                Ok(snapshot) => snapshot,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(snapshot) = pending.take()
                        && let Err(e) = writer.write(&snapshot)
                    {
                        warn!("{e}; will retry with the next snapshot");
                    }
                    deadline = None;
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(snapshot) => snapshot,
                Err(_) => break,
            },
        };

        if deadline.is_none() {
            deadline = Some(Instant::now() + max_delay);
        }
        if pending
            .as_ref()
            .is_none_or(|kept| kept.sequence() < snapshot.sequence())
        {
            pending = Some(snapshot);
        }
    }

    // Final drain on shutdown
    if let Some(snapshot) = pending
        && let Err(e) = writer.write(&snapshot)
    {
        warn!("{e}; final snapshot lost");
    }
}
