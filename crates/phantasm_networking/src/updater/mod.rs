//! # Hologram Updater
//!
//! **Producers enqueue, one worker renders.**
//!
//! Any thread may call [`HologramUpdater::update`] or
//! [`HologramUpdater::update_pos`]; both snapshot what they need and return
//! without touching the network.
//!
//! ## Architecture
//!
//! ```text
//!   Thread 1 ──┐                 ┌──► [render queue] ──┐
//!   Thread 2 ──┼──> snapshot ────┤                     ├──> [Update Worker] ──> Scheduler
//!   Thread N ──┘                 └──► [move queue] ────┘     (single thread)
//! ```
//!
//! Each worker cycle drains the render queue, then the move queue, then
//! waits for more work. Requests are FIFO within a queue; the two queues
//! are not ordered relative to each other.
//!
//! ## Failure Isolation
//!
//! A failing request is logged and dropped. A panic from a host
//! collaborator is caught per request and again per cycle. Nothing stops
//! the worker except [`HologramUpdater::shutdown`].

mod compiler;
mod entries;
mod render;

pub use compiler::PacketCompiler;
pub use entries::{Anchor, Delivery, MoveEntry, UpdateEntry};
pub use render::Renderer;

use crossbeam_channel::{unbounded, Receiver, Select, Sender, TryRecvError};
use phantasm_core::{CallType, GridFormatter, IdentitySequence, PlayerEntry, PlayerId, Vec3};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::UpdaterConfig;
use crate::dispatch::{BatchDispatcher, DispatchOutcome};
use crate::error::{UpdateError, UpdateResult};
use crate::hologram::{EntityEntry, Hologram};
use crate::integration::{HologramHost, PacketSink, Scheduler};

/// Collaborators the updater is built from.
#[derive(Clone)]
pub struct UpdaterServices {
    /// Identity source for new proxies.
    pub identities: Arc<dyn IdentitySequence>,
    /// Languages and placeholder values.
    pub host: Arc<dyn HologramHost>,
    /// Grid layout.
    pub formatter: Arc<dyn GridFormatter>,
    /// Authoritative thread.
    pub scheduler: Arc<dyn Scheduler>,
    /// Socket writes.
    pub sink: Arc<dyn PacketSink>,
}

/// Live worker counters.
#[derive(Debug, Default)]
pub struct UpdaterStats {
    cycles: AtomicU64,
    updates: AtomicU64,
    skipped: AtomicU64,
    moves: AtomicU64,
    failures: AtomicU64,
    batches_sent: AtomicU64,
    batches_dropped: AtomicU64,
}

/// Point-in-time copy of [`UpdaterStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Drain cycles started.
    pub cycles: u64,
    /// Render requests that produced packets.
    pub updates: u64,
    /// Render requests that produced nothing to send.
    pub skipped: u64,
    /// Move requests processed without error.
    pub moves: u64,
    /// Requests that failed or panicked.
    pub failures: u64,
    /// Deliveries handed to the scheduler.
    pub batches_sent: u64,
    /// Deliveries dropped while batching.
    pub batches_dropped: u64,
}

impl UpdaterStats {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            moves: self.moves.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Producer handle. Owns the worker thread when started with
/// [`HologramUpdater::start`].
pub struct HologramUpdater {
    render_tx: Option<Sender<UpdateEntry>>,
    move_tx: Option<Sender<MoveEntry>>,
    identities: Arc<dyn IdentitySequence>,
    host: Arc<dyn HologramHost>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<UpdaterStats>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for HologramUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HologramUpdater")
            .field("stats", &self.stats.snapshot())
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl HologramUpdater {
    /// Creates the producer handle and its worker without starting a thread.
    ///
    /// The caller drives the worker with [`UpdateWorker::run`] or
    /// [`UpdateWorker::run_cycle`].
    #[must_use]
    pub fn new(config: &UpdaterConfig, services: UpdaterServices) -> (Self, UpdateWorker) {
        let (render_tx, render_rx) = unbounded();
        let (move_tx, move_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(UpdaterStats::default());

        let worker = UpdateWorker {
            render_rx,
            move_rx,
            renderer: Renderer::new(PacketCompiler::new(config.line_gap), services.formatter),
            dispatcher: BatchDispatcher::new(config, services.scheduler, services.sink),
            shutdown: Arc::clone(&shutdown),
            stats: Arc::clone(&stats),
            idle: config.idle_interval(),
            closed: false,
        };

        let updater = Self {
            render_tx: Some(render_tx),
            move_tx: Some(move_tx),
            identities: services.identities,
            host: services.host,
            shutdown,
            stats,
            worker: None,
        };

        (updater, worker)
    }

    /// Creates the updater and spawns its worker thread.
    pub fn start(config: UpdaterConfig, services: UpdaterServices) -> UpdateResult<Self> {
        let (mut updater, worker) = Self::new(&config, services);
        let handle = thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || worker.run())?;
        updater.worker = Some(handle);
        Ok(updater)
    }

    /// Enqueues a render of `hologram` on `entries`.
    ///
    /// With no `players`, renders to every current viewer of the hologram.
    /// `old_lines` are the lines last sent per variant; matching output is
    /// not resent. Returns `false` when there was nothing to enqueue.
    pub fn update(
        &self,
        hologram: &Hologram,
        old_lines: Option<Vec<Vec<String>>>,
        entries: &[Arc<EntityEntry>],
        spawn: bool,
        players: &[PlayerId],
    ) -> UpdateResult<bool> {
        let players = if players.is_empty() {
            hologram.viewers()
        } else {
            let mut seen = HashSet::new();
            players.iter().copied().filter(|p| seen.insert(*p)).collect()
        };
        if players.is_empty() || entries.is_empty() {
            return Ok(false);
        }
        if hologram.translations.is_empty() && !hologram.grid.has_source() {
            return Ok(false);
        }

        let sender = self.render_tx.as_ref().ok_or(UpdateError::QueueClosed)?;
        let grid = hologram.grid.clone();
        let expected = hologram.expected_line_count();

        let caches: Vec<_> = entries.iter().map(|e| e.render_cache()).collect();
        let recompile = caches.iter().any(|c| !c.fits(expected, grid.layout_revision));
        if recompile {
            tracing::debug!(
                "Allocating {} identities for hologram {} ({} lines x {} anchors)",
                expected * entries.len(),
                hologram.name,
                expected,
                entries.len()
            );
        }

        let anchors = entries
            .iter()
            .zip(&caches)
            .map(|(entry, cache)| Anchor {
                entry: Arc::clone(entry),
                position: entry.position(),
                identities: if recompile {
                    self.identities.next_block(expected)
                } else {
                    cache.identities()
                },
            })
            .collect();

        if let Some(source) = &grid.source {
            if source.call_type() == CallType::Sync {
                source.load();
            }
        }

        let viewers = players
            .iter()
            .map(|&p| PlayerEntry::new(p, self.host.language_of(p)))
            .collect();

        let entry = UpdateEntry {
            hologram: hologram.name.clone(),
            visitor_sensitive: hologram.visitor_sensitive,
            spawn: spawn || recompile,
            recache: recompile,
            grid,
            old_lines,
            translations: hologram.translations.clone(),
            anchors,
            players: viewers,
            placeholders: self.host.global_placeholders(hologram),
            player_placeholders: self.host.player_placeholders(hologram, &players),
            matched: hologram.matched.clone(),
        };

        sender.send(entry).map_err(|_| UpdateError::QueueClosed)?;
        Ok(true)
    }

    /// Moves `entry` to `position` and enqueues move packets for its current
    /// viewers.
    pub fn update_pos(&self, entry: &Arc<EntityEntry>, position: Vec3) -> UpdateResult<()> {
        let sender = self.move_tx.as_ref().ok_or(UpdateError::QueueClosed)?;
        entry.set_position(position);

        let request = MoveEntry {
            entry: Arc::clone(entry),
            position,
            players: entry.viewers(),
        };
        sender.send(request).map_err(|_| UpdateError::QueueClosed)
    }

    /// Current worker counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Requests waiting in the (render, move) queues.
    #[must_use]
    pub fn pending(&self) -> (usize, usize) {
        (
            self.render_tx.as_ref().map_or(0, Sender::len),
            self.move_tx.as_ref().map_or(0, Sender::len),
        )
    }

    /// Stops the worker. Queued requests are discarded; later calls to
    /// `update` fail with [`UpdateError::QueueClosed`].
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Closing the queues wakes an idle worker.
        self.render_tx.take();
        self.move_tx.take();

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Hologram updater worker terminated abnormally");
            }
        }
    }
}

impl Drop for HologramUpdater {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The single consumer of both queues.
pub struct UpdateWorker {
    render_rx: Receiver<UpdateEntry>,
    move_rx: Receiver<MoveEntry>,
    renderer: Renderer,
    dispatcher: BatchDispatcher,
    shutdown: Arc<AtomicBool>,
    stats: Arc<UpdaterStats>,
    idle: Duration,
    closed: bool,
}

impl std::fmt::Debug for UpdateWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateWorker")
            .field("pending_updates", &self.render_rx.len())
            .field("pending_moves", &self.move_rx.len())
            .field("idle", &self.idle)
            .finish_non_exhaustive()
    }
}

impl UpdateWorker {
    /// Runs drain cycles until shutdown or until the producer is gone.
    pub fn run(mut self) {
        tracing::debug!("Hologram updater started");

        while !self.shutdown.load(Ordering::Acquire) && !self.closed {
            let drained = match catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(drained) => drained,
                Err(panic) => {
                    tracing::error!(
                        "Error occurred during updating holograms: {}",
                        panic_message(panic.as_ref())
                    );
                    0
                }
            };

            if drained == 0 && !self.closed {
                self.wait_for_work();
            }
        }

        tracing::debug!("Hologram updater stopped");
    }

    /// Drains the render queue, then the move queue. Returns how many
    /// requests were taken.
    pub fn run_cycle(&mut self) -> usize {
        UpdaterStats::bump(&self.stats.cycles);
        let mut drained = 0;

        loop {
            match self.render_rx.try_recv() {
                Ok(entry) => {
                    drained += 1;
                    self.process_update(&entry);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }

        loop {
            match self.move_rx.try_recv() {
                Ok(entry) => {
                    drained += 1;
                    self.process_move(&entry);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }

        if drained > 0 {
            tracing::trace!("Hologram updater drained {} requests", drained);
        }
        drained
    }

    /// Counters shared with the producer handle.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn wait_for_work(&self) {
        let mut select = Select::new();
        select.recv(&self.render_rx);
        select.recv(&self.move_rx);
        // Timeout is the normal idle path.
        let _ = select.ready_timeout(self.idle);
    }

    fn process_update(&mut self, entry: &UpdateEntry) {
        let result = catch_unwind(AssertUnwindSafe(|| -> UpdateResult<bool> {
            let deliveries = self.renderer.render(entry)?;
            let produced = !deliveries.is_empty();
            for delivery in deliveries {
                self.dispatch(delivery);
            }
            Ok(produced)
        }));

        match result {
            Ok(Ok(true)) => UpdaterStats::bump(&self.stats.updates),
            Ok(Ok(false)) => UpdaterStats::bump(&self.stats.skipped),
            Ok(Err(e)) => {
                UpdaterStats::bump(&self.stats.failures);
                tracing::error!("Failed to update hologram {}: {}", entry.hologram, e);
            }
            Err(panic) => {
                UpdaterStats::bump(&self.stats.failures);
                tracing::error!(
                    "Panic while updating hologram {}: {}",
                    entry.hologram,
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    fn process_move(&mut self, entry: &MoveEntry) {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let delivery = self.renderer.reposition(entry);
            self.dispatch(delivery);
        }));

        match result {
            Ok(()) => UpdaterStats::bump(&self.stats.moves),
            Err(panic) => {
                UpdaterStats::bump(&self.stats.failures);
                tracing::error!(
                    "Panic while moving hologram anchor: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    fn dispatch(&mut self, delivery: Delivery) {
        match self.dispatcher.send(delivery) {
            DispatchOutcome::Scheduled => UpdaterStats::bump(&self.stats.batches_sent),
            DispatchOutcome::Dropped => UpdaterStats::bump(&self.stats.batches_dropped),
            DispatchOutcome::Skipped => {}
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
