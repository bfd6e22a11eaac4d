//! The fixed-capacity source table shared between a source-emitting plugin
//! and the realtime mesh driver.
//!
//! Rather than a raw shared array of atomics, updates are carried over a
//! bounded, preallocated, wait-free MPSC channel (`thingbuf`, the same
//! crate the teacher library uses for realtime settings handoff in
//! `fundsp::setting::Listen`) — the "cleaner alternative" the design notes
//! explicitly sanction, provided the realtime-thread read stays wait-free.

use thingbuf::mpsc::blocking::{channel, Receiver, Sender};

/// Maximum number of simultaneously tracked sources. Compile-time constant,
/// matching the spec's fixed-capacity `SourceTable`.
pub const MAX_SOURCES: usize = 32;

/// Number of samples in one audio block. Matches the per-block sample
/// buffer each `SourceRecord` carries.
pub const BLOCK: usize = 512;

/// One source's position and per-block mono sample buffer.
#[derive(Debug, Clone, Copy)]
pub struct SourceRecord {
    pub px: f32,
    pub py: f32,
    pub pz: f32,
    pub active: bool,
    pub buf: [f32; BLOCK],
}

impl Default for SourceRecord {
    fn default() -> Self {
        Self {
            px: 0.0,
            py: 0.0,
            pz: 0.0,
            active: false,
            buf: [0.0; BLOCK],
        }
    }
}

/// A single source update message, as sent by a [`SourceWriter`] and
/// drained by a [`SourceTable`].
#[derive(Debug, Clone, Copy)]
struct SourceUpdate {
    index: usize,
    px: f32,
    py: f32,
    pz: f32,
    buf: [f32; BLOCK],
}

impl Default for SourceUpdate {
    fn default() -> Self {
        Self {
            index: 0,
            px: 0.0,
            py: 0.0,
            pz: 0.0,
            buf: [0.0; BLOCK],
        }
    }
}

/// Producer-side handle: written by the upstream source-emitting
/// collaborator, once per audio block.
#[derive(Clone)]
pub struct SourceWriter {
    tx: Sender<SourceUpdate>,
}

impl SourceWriter {
    /// Write one source's position and de-interleaved channel-0 samples.
    ///
    /// `index` is clamped into `[0, MAX_SOURCES - 1]`. `interleaved_buf`
    /// must contain at least `BLOCK * stride` samples; only channel 0 is
    /// read. Never blocks: if the channel to the realtime reader is
    /// momentarily full, the update is dropped and will simply be retried
    /// on the next block by the caller (the source appears with at most
    /// one extra block of latency, matching the liveness bound in the
    /// concurrency model).
    pub fn write_source(&self, index: usize, px: f32, py: f32, pz: f32, interleaved_buf: &[f32], stride: usize) {
        let index = index.min(MAX_SOURCES - 1);
        let stride = stride.max(1);
        let mut buf = [0.0f32; BLOCK];
        for (n, sample) in buf.iter_mut().enumerate() {
            let offset = n * stride;
            *sample = interleaved_buf.get(offset).copied().unwrap_or(0.0);
        }
        let update = SourceUpdate { index, px, py, pz, buf };
        if self.tx.try_send(update).is_err() {
            log::debug!("source update for index {index} dropped: realtime channel full");
        }
    }
}

/// Consumer-side source table, exclusively owned by the realtime driver.
///
/// Holds one [`SourceRecord`] per source slot. `drain_updates` applies all
/// pending writes at the start of a block; the per-sample loop then reads
/// this privately owned array with no further synchronization.
pub struct SourceTable {
    rx: Receiver<SourceUpdate>,
    records: [SourceRecord; MAX_SOURCES],
}

impl SourceTable {
    fn new(rx: Receiver<SourceUpdate>) -> Self {
        Self {
            rx,
            records: [SourceRecord::default(); MAX_SOURCES],
        }
    }

    /// Apply every update queued since the last call, marking each updated
    /// source active. Wait-free: never blocks even if the channel is empty.
    pub fn drain_updates(&mut self) {
        while let Ok(update) = self.rx.try_recv() {
            let record = &mut self.records[update.index];
            record.px = update.px;
            record.py = update.py;
            record.pz = update.pz;
            record.buf = update.buf;
            record.active = true;
        }
    }

    /// The source records, indexed `0..MAX_SOURCES`.
    pub fn records(&self) -> &[SourceRecord; MAX_SOURCES] {
        &self.records
    }

    /// Take sample `n` from every active source's buffer and zero it in
    /// place so a re-read of the same block never double-injects.
    #[inline]
    pub fn take_sample(&mut self, source: usize, n: usize) -> Option<f32> {
        let record = &mut self.records[source];
        if !record.active {
            return None;
        }
        let sample = record.buf[n];
        record.buf[n] = 0.0;
        Some(sample)
    }

    /// Clear every `active` flag. Called once at the end of a block: a
    /// source must be re-written every block to keep contributing
    /// ("require-refresh" policy, see DESIGN.md).
    pub fn clear_active(&mut self) {
        for record in self.records.iter_mut() {
            record.active = false;
        }
    }
}

/// Create a connected `(SourceWriter, SourceTable)` pair with a channel
/// capacity generous enough to absorb a full block's worth of updates
/// across every source slot without blocking the producer.
pub fn source_channel() -> (SourceWriter, SourceTable) {
    let (tx, rx) = channel(MAX_SOURCES * 2);
    (SourceWriter { tx }, SourceTable::new(rx))
}

lazy_static::lazy_static! {
    /// Process-wide source channel, shared between a source-emitting
    /// plugin instance and the simulation plugin instance that owns the
    /// mesh (§3: "the table is process-wide state with lifecycle =
    /// process"). `take_global_reader` hands out the single-consumer
    /// receiver exactly once.
    static ref GLOBAL_SOURCE_WRITER: SourceWriter = {
        let (tx, rx) = channel(MAX_SOURCES * 2);
        if let Ok(mut slot) = GLOBAL_SOURCE_READER.lock() {
            slot.replace(SourceTable::new(rx));
        }
        SourceWriter { tx }
    };
    static ref GLOBAL_SOURCE_READER: std::sync::Mutex<Option<SourceTable>> = std::sync::Mutex::new(None);
}

/// The process-wide writer handle, cloneable and usable from any thread
/// that hosts a "source" plugin instance.
pub fn global_writer() -> SourceWriter {
    GLOBAL_SOURCE_WRITER.clone()
}

/// Claim the process-wide reader. Returns `None` if it has already been
/// claimed by another realtime driver in this process, or if the lock is
/// poisoned by a panic elsewhere in the process.
pub fn take_global_reader() -> Option<SourceTable> {
    // Force initialization of the writer (and therefore the reader slot)
    // before attempting to take it.
    let _ = &*GLOBAL_SOURCE_WRITER;
    GLOBAL_SOURCE_READER.lock().ok()?.take()
}
